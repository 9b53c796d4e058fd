//! The read/serve path driven by the iterator's *produce* phase.

use crate::answer::{self, Answer, AnswerRcode};
use crate::backend::{Backend, ReadTxn};
use crate::entry::{self, EntryFlags, EntryHeader, BUNDLE_ORDER, EXPIRING_TTL};
use crate::key::{self, KeyBuf};
use crate::nsec1::{CoverTrack, Encloser, Synth};
use crate::query::{Query, Request, State};
use crate::rank::{get_new_ttl, lowest_rank, Rank};
use crate::{Cache, CacheError, Result};
use tracing::{debug, trace};
use varve_proto::{Message, Name, RecordClass, RecordType, Type};

/// A low-level exact-entry view, for introspection by non-core consumers.
///
/// Packet entries are never exposed this way.
#[derive(Debug, Clone)]
pub struct CachePeek {
    /// Insertion wall-clock, seconds.
    pub time: u32,
    /// Clamped TTL at insertion.
    pub ttl: u32,
    /// Validation rank.
    pub rank: Rank,
    /// The raw sub-entry bytes, header included.
    pub raw: Vec<u8>,
}

/// A fit sub-entry found by the closest-NS scan.
struct CutHit<'t> {
    sub: &'t [u8],
    rtype: RecordType,
}

impl<B: Backend> Cache<B> {
    /// Serves the iterator's *produce* phase from cache if possible.
    ///
    /// May fill `pkt` with a complete answer and return [`State::Done`];
    /// in every other situation, including internal errors, the caller's
    /// prior state comes back unchanged.
    pub fn peek(&self, req: &mut Request, pkt: &mut Message) -> State {
        let state = req.state;
        if matches!(state, State::Done | State::Fail)
            || req.qry.flags.no_cache
            || (req.qry.flags.cache_tried && req.qry.stale_cb.is_none())
            || !key::is_cacheable(req.qry.stype)
            || req.qry.sclass != RecordClass::IN
        {
            return state;
        }
        let out = match self.peek_real(req, pkt) {
            Ok(st) => st,
            Err(err) => {
                if !err.is_miss() {
                    debug!(error = %err, "peek degraded to a miss");
                }
                state
            }
        };
        self.sync_quiet();
        if out == State::Done {
            self.stats().record_hit();
        } else {
            self.stats().record_miss();
        }
        out
    }

    fn peek_real(&self, req: &mut Request, pkt: &mut Message) -> Result<State> {
        let state = req.state;
        // The cache only peeks for the current sname; repeating the whole
        // dance on every iteration would be useless.
        req.qry.flags.cache_tried = true;

        if req.qry.stype == RecordType::NSEC {
            trace!("skipping stype NSEC");
            return Ok(state);
        }
        let sname = req.qry.sname.clone();
        let stype = req.qry.stype;
        let now = req.qry.timestamp;

        let mut k = KeyBuf::new();
        if k.set_name(&sname).is_err() {
            trace!(name = %sname, "skipping zero-containing name");
            return Ok(state);
        }
        let floor = lowest_rank(req, &req.qry);
        let txn = self.backend.begin_read()?;

        // 1a. Exact name+type match (which may be a stored packet).
        let exact = {
            let kb = k.exact_key(stype)?;
            txn.read(kb)?
        };
        if let Some(value) = exact {
            match self.found_exact_hit(req, pkt, value, k.ktype(), floor) {
                Ok(st) => return Ok(st),
                Err(err) if err.is_miss() => {}
                Err(err) => return Err(err),
            }
        }

        // 1b. Longest-prefix NS/xNAME entry with acceptable time and rank.
        let cut = self.closest_ns(&txn, &mut k, &req.qry, stype)?;
        match &cut {
            Some(hit) if hit.rtype == RecordType::CNAME => {
                let eh = entry::entry_consistent(hit.sub)?;
                let new_ttl = get_new_ttl(&eh, &req.qry, Some(&sname), RecordType::CNAME, now);
                if new_ttl < 0 {
                    return Ok(state);
                }
                return self.answer_simple_hit(
                    req,
                    pkt,
                    RecordType::CNAME,
                    hit.sub,
                    &eh,
                    new_ttl as u32,
                );
            }
            Some(hit) if hit.rtype == RecordType::DNAME => {
                trace!("DNAME not supported yet");
                return Ok(state);
            }
            Some(_) => {
                let zname = Name::from_lf(&k.lf()[..k.zlf_len()])?;
                trace!(zone = %zname, "trying zone");
            }
            None => {
                trace!("not even root NS in cache, but let's try NSEC");
            }
        }

        // 2. Closest provable encloser from the zone's NSEC chain.
        let mut ans = Answer::new();
        let mut cover: Option<CoverTrack> = None;
        let encl = self.nsec1_encloser(&txn, &mut k, &mut ans, &req.qry, &sname, stype, &mut cover)?;

        match encl {
            Encloser::Nothing => {
                trace!("cache miss");
                return Ok(state);
            }
            Encloser::Match => {
                // The name exists; NODATA is proven outright.
            }
            Encloser::Cover { clencl_labels } => {
                let clencl = sname
                    .strip_labels(sname.label_count() - clencl_labels)
                    .unwrap_or_else(Name::root);
                let cover = cover.as_ref().ok_or(CacheError::Corrupt)?;

                // 3a. What does the chain say about *.clencl?
                let synth =
                    self.nsec1_src_synth(&txn, &mut k, &mut ans, &req.qry, &clencl, stype, cover)?;

                // 3b. Without a full proof, look for wildcarded data.
                if matches!(synth, Synth::Continue) {
                    let mut expanded = false;
                    let types = [stype, RecordType::CNAME];
                    let tries: &[RecordType] = if stype == RecordType::CNAME {
                        &types[..1]
                    } else {
                        &types
                    };
                    for &t in tries {
                        if self.try_wild(&txn, &mut k, &mut ans, &clencl, &sname, t, floor, &req.qry)? {
                            expanded = true;
                            break;
                        }
                    }
                    if !expanded {
                        trace!("neither wildcard attempt succeeded");
                        return Ok(state);
                    }
                }
            }
        }

        // 4. Attach the zone SOA unless a positive wildcard answer stands.
        if ans.rcode != AnswerRcode::NoError {
            let soa = {
                let kb = k.exact_key_at(k.zlf_len(), RecordType::SOA)?;
                txn.read(kb)?
            };
            let Some(value) = soa else {
                trace!("SOA missed");
                return Ok(state);
            };
            let sub = entry::seek(value, RecordType::SOA, RecordType::SOA)?;
            let eh = entry::entry_consistent(sub)?;
            let zname = Name::from_lf(&k.lf()[..k.zlf_len()])?;
            let new_ttl = get_new_ttl(&eh, &req.qry, Some(&zname), RecordType::SOA, now);
            if new_ttl < 0 || !eh.rank.acceptable(floor) || eh.is_packet() {
                trace!(rank = %eh.rank, new_ttl, "SOA unfit");
                return Ok(state);
            }
            ans.soa = Some(answer::entry_to_answer(
                sub,
                &eh,
                &zname,
                RecordType::SOA,
                new_ttl as u32,
            )?);
        }

        match answer::write_answer(&ans, pkt, &sname, stype, &mut req.qry.flags) {
            Some(rcode) => {
                debug!(%sname, %stype, %rcode, "answer synthesized from cache");
                Ok(State::Done)
            }
            None => {
                trace!("cache miss");
                Ok(state)
            }
        }
    }

    /// Tests an exact-key entry and materializes it into the packet.
    fn found_exact_hit(
        &self,
        req: &mut Request,
        pkt: &mut Message,
        value: &[u8],
        key_type: RecordType,
        floor: Rank,
    ) -> Result<State> {
        let stype = req.qry.stype;
        let sub = entry::seek(value, key_type, stype)?;
        let eh = entry::entry_consistent(sub)?;
        let new_ttl = get_new_ttl(
            &eh,
            &req.qry,
            Some(&req.qry.sname),
            stype,
            req.qry.timestamp,
        );
        if new_ttl < 0 || !eh.rank.acceptable(floor) {
            trace!(
                kind = if eh.is_packet() { "packet" } else { "RR" },
                rank = %eh.rank,
                new_ttl,
                "skipping unfit exact entry"
            );
            return Err(CacheError::NotFound);
        }
        // Answers that failed validation are only for requests that asked
        // not to validate.
        if eh.rank.is_bogus() && !(req.checking_disabled || req.qry.flags.stub) {
            trace!("skipping bogus entry for a validating request");
            return Err(CacheError::NotFound);
        }
        if eh.is_packet() {
            self.answer_from_pkt(req, pkt, sub, &eh, new_ttl as u32)
        } else {
            self.answer_simple_hit(req, pkt, stype, sub, &eh, new_ttl as u32)
        }
    }

    /// Builds the answer packet for a plain RR (or CNAME) hit.
    fn answer_simple_hit(
        &self,
        req: &mut Request,
        pkt: &mut Message,
        rtype: RecordType,
        sub: &[u8],
        eh: &EntryHeader,
        new_ttl: u32,
    ) -> Result<State> {
        let sname = req.qry.sname.clone();
        let aset = answer::entry_to_answer(sub, eh, &sname, rtype, new_ttl)?;

        pkt.renew(sname, Type::Known(req.qry.stype));
        answer::append_set(pkt, &aset, false);

        let flags = &mut req.qry.flags;
        flags.expiring = aset.expiring;
        flags.cached = true;
        flags.no_minimize = true;
        flags.dnssec_insecure = eh.rank.is_insecure();
        if flags.dnssec_insecure {
            flags.dnssec_want = false;
        }
        debug!(rank = %eh.rank, new_ttl, "satisfied by exact RR or CNAME");
        Ok(State::Done)
    }

    /// Replays a stored wire packet, with TTLs aged by the entry's age.
    fn answer_from_pkt(
        &self,
        req: &mut Request,
        pkt: &mut Message,
        sub: &[u8],
        eh: &EntryHeader,
        new_ttl: u32,
    ) -> Result<State> {
        let wire = entry::packet_payload(sub)?;
        let mut msg = Message::parse(wire).map_err(|_| CacheError::Corrupt)?;
        msg.age_ttls(eh.ttl.saturating_sub(new_ttl));
        msg.set_id(pkt.id());
        let rcode = msg.rcode();
        *pkt = msg;

        let flags = &mut req.qry.flags;
        flags.expiring = new_ttl <= EXPIRING_TTL;
        flags.cached = true;
        flags.no_minimize = true;
        if eh.rank.is_bogus() {
            flags.dnssec_bogus = true;
        }
        debug!(rank = %eh.rank, new_ttl, %rcode, "satisfied by cached packet");
        Ok(State::Done)
    }

    /// Walks from the query name towards the root, one label at a time,
    /// looking for the closest NS-keyed entry that fits.
    ///
    /// CNAME is only of interest at the exact name (but even for DS
    /// queries); DNAME only above it; NS at the exact name is skipped for
    /// DS queries, whose answer lives in the parent zone. NS entries are
    /// accepted at any rank, the tunneled types need at least
    /// INSECURE+AUTH. Records the zone-cut LF length in `k`.
    fn closest_ns<'t>(
        &self,
        txn: &'t B::Txn<'_>,
        k: &mut KeyBuf,
        qry: &Query,
        stype: RecordType,
    ) -> Result<Option<CutHit<'t>>> {
        let full = k.lf_len();
        let bounds = k.label_boundaries();
        let tunneled_floor = Rank::INSECURE | Rank::AUTH;

        for &len in bounds.iter().rev() {
            let exact_match = len == full;
            let value = {
                let kb = k.exact_key_at(len, RecordType::NS)?;
                txn.read(kb)?
            };
            let Some(value) = value else { continue };
            let Ok(first) = entry::entry_consistent(value) else {
                continue;
            };

            for want in BUNDLE_ORDER {
                let fits = match want {
                    RecordType::NS => {
                        first.flags.contains(EntryFlags::HAS_NS)
                            // On a zone cut the DS lives in the parent.
                            && !(exact_match && stype == RecordType::DS)
                    }
                    RecordType::CNAME => {
                        first.flags.contains(EntryFlags::HAS_CNAME) && exact_match
                    }
                    _ => first.flags.contains(EntryFlags::HAS_DNAME) && !exact_match,
                };
                if !fits {
                    continue;
                }
                let Ok(sub) = entry::seek(value, RecordType::NS, want) else {
                    continue;
                };
                let Ok(eh) = entry::entry_consistent(sub) else {
                    continue;
                };
                let zname = Name::from_lf(&k.lf()[..len]).map_err(|_| CacheError::Corrupt)?;
                let new_ttl = get_new_ttl(&eh, qry, Some(&zname), want, qry.timestamp);
                if new_ttl < 0
                    || eh.is_packet()
                    || (want != RecordType::NS && !eh.rank.acceptable(tunneled_floor))
                {
                    trace!(
                        rtype = %want,
                        kind = if eh.is_packet() { "packet" } else { "RR" },
                        rank = %eh.rank,
                        new_ttl,
                        "skipping unfit zone-cut entry"
                    );
                    continue;
                }
                k.set_zlf_len(len);
                return Ok(Some(CutHit { sub, rtype: want }));
            }
        }

        // Root reached with nothing usable; the caller may still try the
        // NSEC chain, or fall back to root hints.
        k.set_zlf_len(0);
        Ok(None)
    }

    /// Attempts to answer from `*.clencl` data of the given type.
    #[allow(clippy::too_many_arguments)]
    fn try_wild(
        &self,
        txn: &B::Txn<'_>,
        k: &mut KeyBuf,
        ans: &mut Answer,
        clencl: &Name,
        sname: &Name,
        rtype: RecordType,
        floor: Rank,
        qry: &Query,
    ) -> Result<bool> {
        k.set_name_wild(clencl, true)?;
        let value = {
            let kb = k.exact_key(rtype)?;
            txn.read(kb)?
        };
        let Some(value) = value else {
            trace!(clencl = %clencl, %rtype, "wildcard not found");
            return Ok(false);
        };
        let sub = match entry::seek(value, k.ktype(), rtype) {
            Ok(sub) => sub,
            Err(err) if err.is_miss() => return Ok(false),
            Err(err) => return Err(err),
        };
        let Ok(eh) = entry::entry_consistent(sub) else {
            return Ok(false);
        };
        // The TTL question is asked about the expanded owner name.
        let new_ttl = get_new_ttl(&eh, qry, Some(sname), rtype, qry.timestamp);
        if new_ttl < 0 || !eh.rank.acceptable(floor) || eh.is_packet() {
            trace!(
                kind = if eh.is_packet() { "packet" } else { "RR" },
                rank = %eh.rank,
                new_ttl,
                "skipping unfit wildcard entry"
            );
            return Ok(false);
        }
        ans.answer = Some(answer::entry_to_answer(sub, &eh, sname, rtype, new_ttl as u32)?);
        ans.rcode = AnswerRcode::NoError;
        debug!(new_ttl, "wildcard answer expanded");
        Ok(true)
    }

    /// Low-level exact lookup for introspection; never returns packets.
    pub fn peek_exact(&self, name: &Name, rtype: RecordType) -> Result<CachePeek> {
        let result = self.peek_exact_real(name, rtype);
        match &result {
            Ok(peek) => {
                trace!(%name, %rtype, ttl = peek.ttl, "peek_exact hit");
                self.stats().record_hit();
            }
            Err(err) => {
                trace!(%name, %rtype, error = %err, "peek_exact miss");
                self.stats().record_miss();
            }
        }
        result
    }

    fn peek_exact_real(&self, name: &Name, rtype: RecordType) -> Result<CachePeek> {
        if !key::is_cacheable(rtype) {
            return Err(CacheError::Unsupported);
        }
        let mut k = KeyBuf::new();
        k.set_name(name)?;
        let txn = self.backend.begin_read()?;
        let value = {
            let kb = k.exact_key(rtype)?;
            txn.read(kb)?
        }
        .ok_or(CacheError::NotFound)?;
        let sub = entry::seek(value, k.ktype(), rtype)?;
        let eh = entry::entry_consistent(sub)?;
        if eh.is_packet() {
            return Err(CacheError::NotFound);
        }
        Ok(CachePeek {
            time: eh.time,
            ttl: eh.ttl,
            rank: eh.rank,
            raw: sub.to_vec(),
        })
    }
}
