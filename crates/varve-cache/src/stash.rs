//! The write path: ingesting resolved records after a query completes.
//!
//! Stashing is best-effort memoization. Nothing here may fail the
//! caller: errors are logged and the record is dropped.

use crate::backend::{Backend, ReadTxn};
use crate::entry::{self, EntryFlags, EntryHeader};
use crate::key::{self, KeyBuf};
use crate::query::{Request, State};
use crate::rank::Rank;
use crate::{Cache, CacheError, Result};
use tracing::{debug, trace};
use varve_proto::name::MAX_LF_LENGTH;
use varve_proto::{Message, RecordClass, RecordType, RrSet};

/// Decides whether an already-present entry beats the incoming one:
/// strictly higher rank wins outright, an equal rank wins on longer
/// remaining life.
fn existing_better(eh: &EntryHeader, rank: Rank, new_ttl: u32, now: u32) -> bool {
    let residual = i64::from(eh.ttl) - i64::from(now.saturating_sub(eh.time));
    match eh.rank.order().cmp(&rank.order()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => residual > i64::from(new_ttl),
        std::cmp::Ordering::Less => false,
    }
}

fn bundle_index(rtype: RecordType) -> usize {
    entry::BUNDLE_ORDER
        .iter()
        .position(|&t| t == rtype)
        .unwrap_or(usize::MAX)
}

impl<B: Backend> Cache<B> {
    /// Ingests the packet's resolved records; called by the iterator once
    /// a sub-query finishes. Never fails the caller.
    pub fn stash(&self, req: &mut Request, pkt: &Message) -> State {
        let state = req.state;
        // Note: stashing happens even on failure states; a BOGUS answer
        // still goes to the packet cache for CD requests.
        let Some(qtype) = pkt.question().and_then(|q| q.qtype.as_known()) else {
            return state;
        };
        if req.qry.flags.cached
            || !key::is_cacheable(qtype)
            || req.qry.sclass != RecordClass::IN
        {
            return state;
        }
        // Do not cache truncated answers.
        if pkt.is_truncated() {
            return state;
        }

        let uid = req.qry.uid;
        let now = req.qry.timestamp;
        let mut unauth_cnt = 0u32;

        // Uncached entries gravitate to the end of the selection.
        for i in (0..req.selected.len()).rev() {
            if req.selected[i].cached || req.selected[i].qry_uid != uid {
                continue;
            }
            let base_type = req.selected[i].rrset.rtype();
            if base_type == RecordType::RRSIG {
                // Signatures ride along with the set they cover.
                continue;
            }
            let section = req.selected[i].section;
            let owner = req.selected[i].rrset.owner().clone();
            let sig_idx = req.selected.iter().position(|e| {
                e.qry_uid == uid
                    && !e.cached
                    && e.section == section
                    && e.rrset.rtype() == RecordType::RRSIG
                    && *e.rrset.owner() == owner
                    && e.rrset
                        .rdatas()
                        .first()
                        .and_then(|rd| rd.as_rrsig())
                        .is_some_and(|sig| sig.covers(base_type))
            });
            let rrset = req.selected[i].rrset.clone();
            let sigs = sig_idx.map(|j| req.selected[j].rrset.clone());
            let rank = req.selected[i].rank;

            match self.stash_rrset(&rrset, sigs.as_ref(), rank, now) {
                Ok(written) if written > 0 => {
                    req.selected[i].cached = true;
                    if let Some(j) = sig_idx {
                        req.selected[j].cached = true;
                    }
                    if !rank.is_auth() && base_type != RecordType::NS {
                        unauth_cnt += 1;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "stashing RRs errored out");
                }
            }
        }

        self.stash_pkt(req, pkt, qtype);

        if unauth_cnt > 0 {
            debug!(count = unauth_cnt, "stashed nonauth RR-sets");
        }
        self.sync_quiet();
        state
    }

    /// Direct record insert bypassing the packet flow, used by prefetch.
    pub fn insert_rr(
        &self,
        rr: &RrSet,
        sigs: Option<&RrSet>,
        rank: Rank,
        timestamp: u32,
    ) -> Result<()> {
        self.stash_rrset(rr, sigs, rank, timestamp).map(|_| ())
    }

    /// Stores one RR-set (plus signatures), returning the bytes written;
    /// zero means the record was skipped on purpose.
    fn stash_rrset(
        &self,
        rr: &RrSet,
        sigs: Option<&RrSet>,
        rank: Rank,
        timestamp: u32,
    ) -> Result<usize> {
        if rr.rclass() != RecordClass::IN || rr.is_empty() {
            return Ok(0);
        }
        // Only packet entries may carry a BOGUS rank.
        if rank.is_bogus() {
            trace!(owner = %rr.owner(), "skipping bogus RR-set");
            return Ok(0);
        }
        if !key::is_cacheable(rr.rtype()) || rr.rtype() == RecordType::NSEC3 {
            trace!(rtype = %rr.rtype(), "skipping RR type");
            return Ok(0);
        }
        if key::check_name(rr.owner()).is_err() {
            trace!(owner = %rr.owner(), "skipping zero-containing name");
            return Ok(0);
        }

        // A signature's label count exposes wildcard expansion: the key
        // name is the source of synthesis, not the expanded owner.
        let first_sig = sigs.and_then(|s| s.rdatas().first()).and_then(|rd| rd.as_rrsig());
        let wild_labels = match first_sig {
            Some(sig) => rr.owner().label_count() as i32 - i32::from(sig.labels()),
            None => 0,
        };
        if wild_labels < 0 {
            trace!(owner = %rr.owner(), "RRSIG labels exceed the owner's, skipping");
            return Ok(0);
        }
        let wild_labels = wild_labels as usize;
        let encloser = rr
            .owner()
            .strip_labels(wild_labels)
            .ok_or(CacheError::Unsupported)?;
        let wild = wild_labels > 0;

        let mut k = KeyBuf::new();
        let (key_bytes, key_type, new_type) = if rr.rtype() == RecordType::NSEC {
            // Only validated, signed NSECs are worth keeping; the signer
            // name pins the zone the interval belongs to.
            if !rank.is_secure() {
                trace!(owner = %rr.owner(), "skipping unvalidated NSEC");
                return Ok(0);
            }
            let Some(sig) = first_sig else {
                trace!(owner = %rr.owner(), "skipping NSEC without RRSIG");
                return Ok(0);
            };
            k.set_name_wild(&encloser, wild)?;
            let mut zbuf = [0u8; MAX_LF_LENGTH];
            let zlen = sig
                .signer()
                .to_lf(&mut zbuf)
                .map_err(|_| CacheError::Unsupported)?;
            if !k.lf().starts_with(&zbuf[..zlen]) {
                trace!(owner = %rr.owner(), signer = %sig.signer(), "NSEC signer does not cover owner");
                return Ok(0);
            }
            k.set_zlf_len(zlen);
            (k.nsec1_key()?.to_vec(), RecordType::NSEC, RecordType::NSEC)
        } else {
            k.set_name_wild(&encloser, wild)?;
            let kb = k.exact_key(rr.rtype())?.to_vec();
            (kb, k.ktype(), rr.rtype())
        };

        let raw_ttl = sigs.map_or(rr.ttl(), |s| rr.ttl().min(s.ttl()));
        let new_ttl = raw_ttl.clamp(self.ttl_min, self.ttl_max);

        let written = self.splice_write(
            &key_bytes,
            key_type,
            new_type,
            rank,
            new_ttl,
            timestamp,
            &|out, flags| entry::write_sub_entry(out, timestamp, rank, flags, rr, sigs),
        )?;

        if written > 0 {
            let encl = format!("{}{}", if wild { "*." } else { "" }, encloser);
            trace!(
                rank = %rank,
                rtype = %rr.rtype(),
                encloser = %encl,
                bytes = written,
                sigs = sigs.map_or(0, RrSet::len),
                "stashed"
            );
        }
        Ok(written)
    }

    /// Stores a whole wire packet for aggregate negative answers and for
    /// BOGUS results, which have no per-RR representation in the cache.
    fn stash_pkt(&self, req: &Request, pkt: &Message, qtype: RecordType) {
        let qry = &req.qry;
        let rcode = pkt.rcode();
        let bogus = qry.flags.dnssec_bogus;
        let nodata = rcode == varve_proto::ResponseCode::NoError
            && pkt.answers().is_empty()
            && pkt
                .authority()
                .iter()
                .any(|r| r.record_type() == Some(RecordType::SOA));
        let negative = rcode == varve_proto::ResponseCode::NXDomain || nodata;
        if !bogus && !negative {
            return;
        }
        let has_nsec = pkt
            .authority()
            .iter()
            .any(|r| r.record_type() == Some(RecordType::NSEC));
        let has_nsec3 = pkt
            .authority()
            .iter()
            .any(|r| r.record_type() == Some(RecordType::NSEC3));
        if !bogus && has_nsec && !has_nsec3 {
            // The record-level NSEC cache can re-prove this by itself.
            return;
        }

        let Some(question) = pkt.question() else { return };
        let qname = question.qname.clone();
        if key::check_name(&qname).is_err() {
            return;
        }
        let rank = if bogus {
            Rank::BOGUS | Rank::AUTH
        } else if qry.flags.dnssec_insecure {
            Rank::INSECURE | Rank::AUTH
        } else if qry.flags.dnssec_want {
            Rank::SECURE | Rank::AUTH
        } else {
            Rank::INITIAL | Rank::AUTH
        };
        let raw_ttl = pkt.min_ttl().unwrap_or(self.ttl_min);
        let new_ttl = raw_ttl.clamp(self.ttl_min, self.ttl_max);

        let Ok(wire) = pkt.to_wire() else { return };
        if wire.len() > usize::from(u16::MAX) {
            return;
        }
        let mut k = KeyBuf::new();
        if k.set_name(&qname).is_err() {
            return;
        }
        let key_bytes = match k.exact_key(qtype) {
            Ok(kb) => kb.to_vec(),
            Err(_) => return,
        };
        let has_optout = EntryFlags::empty(); // NSEC3 opt-out detection is deferred

        let result = self.splice_write(
            &key_bytes,
            k.ktype(),
            qtype,
            rank,
            new_ttl,
            qry.timestamp,
            &|out, flags| {
                let at = out.len();
                EntryHeader {
                    time: qry.timestamp,
                    ttl: 0,
                    rank,
                    flags: flags | EntryFlags::IS_PACKET | has_optout,
                }
                .write_to(out);
                out.extend_from_slice(&(wire.len() as u16).to_le_bytes());
                out.extend_from_slice(&wire);
                at
            },
        );
        match result {
            Ok(written) if written > 0 => {
                debug!(%qname, %qtype, %rcode, %rank, bytes = written, "stashed whole packet");
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "packet stash failed");
            }
        }
    }

    /// Reads the current entry under `key`, decides whether the new
    /// sub-entry may replace its slot, merges the surviving bundle
    /// pieces, and writes the result.
    ///
    /// The new sub-entry is assembled with a zero TTL which is patched in
    /// as the very last step, so a write torn mid-way reads back expired.
    #[allow(clippy::too_many_arguments)]
    fn splice_write(
        &self,
        key: &[u8],
        key_type: RecordType,
        new_type: RecordType,
        rank: Rank,
        new_ttl: u32,
        now: u32,
        write_new: &dyn Fn(&mut Vec<u8>, EntryFlags) -> usize,
    ) -> Result<usize> {
        let fresh_flags = if key_type == RecordType::NS {
            EntryFlags::slot(new_type)
        } else {
            EntryFlags::empty()
        };

        let plan = {
            let txn = self.backend.begin_read()?;
            match txn.read(key)? {
                None => (Vec::new(), Vec::new(), fresh_flags),
                Some(existing) if key_type != RecordType::NS => {
                    if let Ok(eh) = entry::entry_consistent(existing) {
                        if existing_better(&eh, rank, new_ttl, now) {
                            trace!(rank = %eh.rank, "existing entry is better, skipping");
                            return Ok(0);
                        }
                    }
                    (Vec::new(), Vec::new(), fresh_flags)
                }
                Some(existing) => match entry::bundle_parts(existing) {
                    // A corrupt bundle is simply overwritten.
                    Err(_) => (Vec::new(), Vec::new(), fresh_flags),
                    Ok(parts) => {
                        let mut before = Vec::new();
                        let mut after = Vec::new();
                        let mut flags = fresh_flags;
                        for (slot, sub) in parts {
                            if slot == new_type {
                                if let Ok(eh) = entry::entry_consistent(sub) {
                                    if existing_better(&eh, rank, new_ttl, now) {
                                        trace!(rank = %eh.rank, "existing entry is better, skipping");
                                        return Ok(0);
                                    }
                                }
                                continue;
                            }
                            flags |= EntryFlags::slot(slot);
                            if bundle_index(slot) < bundle_index(new_type) {
                                before.extend_from_slice(sub);
                            } else {
                                after.extend_from_slice(sub);
                            }
                        }
                        (before, after, flags)
                    }
                },
            }
        };
        let (before, after, flags) = plan;

        let mut value = before;
        let at = write_new(&mut value, flags);
        value.extend_from_slice(&after);
        if key_type == RecordType::NS {
            entry::patch_bundle_flags(&mut value, flags)?;
        }
        entry::patch_ttl(&mut value, at, new_ttl);

        self.backend.write(key, &value)?;
        self.stats().record_insert();
        Ok(value.len())
    }
}
