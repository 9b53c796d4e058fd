//! NSEC-based negative proofs: closest provable encloser and source of
//! synthesis, assembled purely from cached records.
//!
//! NSEC entries live under the `'1'` tag, keyed by the interval start
//! within their zone, so a predecessor lookup on the query name lands on
//! the only NSEC that could cover or match it. All interval comparisons
//! happen in the same within-zone label-format space the keys use.

use crate::answer::{Answer, AnswerRcode, AnswerSet};
use crate::backend::{Backend, Found, ReadTxn};
use crate::entry;
use crate::key::KeyBuf;
use crate::query::Query;
use crate::rank::get_new_ttl;
use crate::{Cache, Result};
use smallvec::SmallVec;
use tracing::trace;
use varve_proto::name::MAX_LF_LENGTH;
use varve_proto::rdata::NSEC;
use varve_proto::{Name, RecordType};

/// Interval endpoints of the NSEC that covered the query name, kept in
/// within-zone key form for reuse by the source-of-synthesis check.
pub(crate) struct CoverTrack {
    pub low: Vec<u8>,
    pub hi: Vec<u8>,
}

/// Outcome of the closest-encloser search.
pub(crate) enum Encloser {
    /// An NSEC owns the query name: NODATA proven.
    Match,
    /// An NSEC covers the query name: NXDOMAIN so far, pending the
    /// source-of-synthesis check. Carries the provable encloser depth.
    Cover { clencl_labels: usize },
    /// No usable NSEC in cache; the caller reports a miss.
    Nothing,
}

/// Outcome of the source-of-synthesis check.
pub(crate) enum Synth {
    /// The proof is complete; proceed to the SOA.
    Proved,
    /// The wildcard may hold data; attempt expansion from cache.
    Continue,
}

/// One NSEC loaded via predecessor lookup, already validated.
struct NsecHit {
    how: Found,
    owner_kwz: Vec<u8>,
    aset: AnswerSet,
    nsec: NSEC,
    next_kwz: Vec<u8>,
}

/// Computes a name's within-zone key form, or `None` when the name does
/// not fall under the zone.
fn kwz_of(name: &Name, zone_lf: &[u8]) -> Option<Vec<u8>> {
    let mut buf = [0u8; MAX_LF_LENGTH];
    let len = name.to_lf(&mut buf).ok()?;
    let lf = &buf[..len];
    if !lf.starts_with(zone_lf) {
        return None;
    }
    Some(lf[zone_lf.len()..].to_vec())
}

/// Interval membership in within-zone key order. An empty or
/// not-greater `next` marks the chain's wrap-around to the apex, which
/// covers everything above `owner`.
fn covered(owner_kwz: &[u8], next_kwz: &[u8], q_kwz: &[u8]) -> bool {
    owner_kwz < q_kwz && (q_kwz < next_kwz || next_kwz <= owner_kwz)
}

impl<B: Backend> Cache<B> {
    /// Predecessor lookup in the zone's NSEC index, returning the hit
    /// only if the entry is fresh, SECURE, signed, and structurally fine.
    /// Anything less yields `None`: the branch is abandoned so the
    /// iterator can fetch fresh proofs.
    fn read_nsec_leq(
        &self,
        txn: &B::Txn<'_>,
        k: &mut KeyBuf,
        kwz: &[u8],
        qry: &Query,
    ) -> Result<Option<NsecHit>> {
        let zlf = k.zlf_len();
        let zone_lf: SmallVec<[u8; 72]> = SmallVec::from_slice(&k.lf()[..zlf]);
        let search: SmallVec<[u8; 80]> = SmallVec::from_slice(k.nsec1_key_for(kwz)?);

        let Some((fkey, fval, how)) = txn.read_leq(&search)? else {
            return Ok(None);
        };
        let prefix = zlf + 2;
        if fkey.len() < prefix || fkey[..prefix] != search[..prefix] {
            // Predecessor fell outside this zone's NSEC index.
            return Ok(None);
        }
        let owner_kwz = fkey[prefix..].to_vec();

        let Ok(eh) = entry::entry_consistent(fval) else {
            return Ok(None);
        };
        if eh.is_packet() || !eh.rank.is_secure() {
            return Ok(None);
        }
        let mut owner_lf = zone_lf.to_vec();
        owner_lf.extend_from_slice(&owner_kwz);
        let Ok(owner) = Name::from_lf(&owner_lf) else {
            return Ok(None);
        };
        // No stale serving for proofs: an expired NSEC abandons the branch.
        let new_ttl = get_new_ttl(&eh, qry, None, RecordType::NSEC, qry.timestamp);
        if new_ttl < 0 {
            trace!(owner = %owner, new_ttl, "stale NSEC, abandoning proof");
            return Ok(None);
        }
        let Ok(aset) = crate::answer::entry_to_answer(fval, &eh, &owner, RecordType::NSEC, new_ttl as u32)
        else {
            return Ok(None);
        };
        if aset.sigs.is_none() {
            return Ok(None);
        }
        let Some(nsec) = aset.set.rdatas().first().and_then(|rd| rd.as_nsec()).cloned() else {
            return Ok(None);
        };
        let Some(next_kwz) = kwz_of(nsec.next_name(), &zone_lf) else {
            return Ok(None);
        };
        Ok(Some(NsecHit {
            how,
            owner_kwz,
            aset,
            nsec,
            next_kwz,
        }))
    }

    /// Finds the NSEC covering or matching the query name and derives the
    /// closest provable encloser from it.
    pub(crate) fn nsec1_encloser(
        &self,
        txn: &B::Txn<'_>,
        k: &mut KeyBuf,
        ans: &mut Answer,
        qry: &Query,
        sname: &Name,
        stype: RecordType,
        cover: &mut Option<CoverTrack>,
    ) -> Result<Encloser> {
        ans.nsec_v = 1;
        let q_kwz = k.lf()[k.zlf_len()..].to_vec();
        let Some(hit) = self.read_nsec_leq(txn, k, &q_kwz, qry)? else {
            return Ok(Encloser::Nothing);
        };
        match hit.how {
            Found::Eq => {
                if hit.nsec.contains_type(stype.to_u16()) {
                    // The bitmap claims the type exists; not a proof.
                    trace!(%sname, %stype, "NSEC matches but lists the type");
                    return Ok(Encloser::Nothing);
                }
                ans.rcode = AnswerRcode::NoData;
                ans.nsecs.push(hit.aset);
                Ok(Encloser::Match)
            }
            Found::Lt => {
                if !covered(&hit.owner_kwz, &hit.next_kwz, &q_kwz) {
                    return Ok(Encloser::Nothing);
                }
                let clencl_labels = sname
                    .common_suffix_labels(hit.aset.set.owner())
                    .max(sname.common_suffix_labels(hit.nsec.next_name()));
                ans.rcode = AnswerRcode::NxDomain;
                *cover = Some(CoverTrack {
                    low: hit.owner_kwz,
                    hi: hit.next_kwz,
                });
                ans.nsecs.push(hit.aset);
                Ok(Encloser::Cover { clencl_labels })
            }
        }
    }

    /// Proves something about `*.clencl`, the source of synthesis: its
    /// non-existence pins NXDOMAIN; a match without the queried type
    /// turns the answer into NODATA at the wildcard; a match listing the
    /// type invites wildcard expansion.
    pub(crate) fn nsec1_src_synth(
        &self,
        txn: &B::Txn<'_>,
        k: &mut KeyBuf,
        ans: &mut Answer,
        qry: &Query,
        clencl: &Name,
        stype: RecordType,
        cover: &CoverTrack,
    ) -> Result<Synth> {
        let zlf = k.zlf_len();
        let Ok(wild) = clencl.to_wildcard() else {
            return Ok(Synth::Continue);
        };
        let Some(ss_kwz) = kwz_of(&wild, &k.lf()[..zlf]) else {
            return Ok(Synth::Continue);
        };
        if covered(&cover.low, &cover.hi, &ss_kwz) {
            // The NSEC already collected for the query name covers the
            // wildcard too; one record proves both.
            return Ok(Synth::Proved);
        }
        let Some(hit) = self.read_nsec_leq(txn, k, &ss_kwz, qry)? else {
            return Ok(Synth::Continue);
        };
        match hit.how {
            Found::Eq => {
                if hit.nsec.contains_type(stype.to_u16()) {
                    // The wildcard exists and holds the type.
                    return Ok(Synth::Continue);
                }
                ans.rcode = AnswerRcode::NoData;
                if hit.owner_kwz != cover.low {
                    ans.nsecs.push(hit.aset);
                }
                Ok(Synth::Proved)
            }
            Found::Lt => {
                if !covered(&hit.owner_kwz, &hit.next_kwz, &ss_kwz) {
                    return Ok(Synth::Continue);
                }
                if hit.owner_kwz != cover.low {
                    ans.nsecs.push(hit.aset);
                }
                Ok(Synth::Proved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covered() {
        // Plain interval: a < b < c.
        assert!(covered(b"\x01a", b"\x01c", b"\x01b"));
        assert!(!covered(b"\x01a", b"\x01c", b"\x01c"));
        assert!(!covered(b"\x01a", b"\x01c", b"\x01a"));
        assert!(!covered(b"\x01b", b"\x01c", b"\x01a"));

        // Wrap-around: next at or below owner covers everything above.
        assert!(covered(b"\x01c", b"", b"\x03foo"));
        assert!(covered(b"\x01c", b"\x01a", b"\x01d"));
        assert!(!covered(b"\x01c", b"\x01a", b"\x01b"));

        // Apex owner covers from the bottom.
        assert!(covered(b"", b"\x01a", b"\x01*"));
    }
}
