//! The answer accumulator shared by the peek path and the negative-proof
//! assembler, and its final rendering into a response packet.

use crate::entry::{self, EntryHeader, EXPIRING_TTL};
use crate::query::QueryFlags;
use crate::rank::Rank;
use crate::Result;
use smallvec::SmallVec;
use varve_proto::{Message, Name, RecordType, ResponseCode, RrSet, Type};

/// The running result code of a partially assembled answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRcode {
    /// Nothing decided yet.
    Unset,
    /// A positive answer (e.g. a wildcard expansion).
    NoError,
    /// The name exists but carries no such type.
    NoData,
    /// The name does not exist.
    NxDomain,
}

/// One materialized RR-set destined for the packet, with its signatures.
#[derive(Debug, Clone)]
pub struct AnswerSet {
    /// The records.
    pub set: RrSet,
    /// The covering RRSIG set, if cached.
    pub sigs: Option<RrSet>,
    /// Rank of the cache entry the set came from.
    pub rank: Rank,
    /// True when the remaining TTL is at or below the expiry threshold.
    pub expiring: bool,
}

/// Accumulates the pieces of a cache-synthesized answer: the answer
/// RR-set, the NSEC proofs, and the SOA for the authority section.
#[derive(Debug)]
pub struct Answer {
    /// Running result code.
    pub rcode: AnswerRcode,
    /// NSEC chain variant in use; only 1 is implemented.
    pub nsec_v: u8,
    /// The answer-section slot.
    pub answer: Option<AnswerSet>,
    /// The NSEC proofs for the authority section.
    pub nsecs: SmallVec<[AnswerSet; 2]>,
    /// The SOA slot for the authority section.
    pub soa: Option<AnswerSet>,
}

impl Default for Answer {
    fn default() -> Self {
        Self::new()
    }
}

impl Answer {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self {
            rcode: AnswerRcode::Unset,
            nsec_v: 1,
            answer: None,
            nsecs: SmallVec::new(),
            soa: None,
        }
    }

    /// Returns true if any accumulated RR-set is close to expiry.
    pub fn expiring(&self) -> bool {
        self.answer.iter().any(|s| s.expiring)
            || self.nsecs.iter().any(|s| s.expiring)
            || self.soa.iter().any(|s| s.expiring)
    }
}

/// Materializes a sub-entry into an [`AnswerSet`] under `owner`.
///
/// `owner` need not be the stored name: wildcard expansion materializes
/// `*.clencl` data under the queried name.
pub fn entry_to_answer(
    sub: &[u8],
    eh: &EntryHeader,
    owner: &Name,
    rtype: RecordType,
    new_ttl: u32,
) -> Result<AnswerSet> {
    let (set, sigs) = entry::materialize(sub, owner, rtype, new_ttl)?;
    Ok(AnswerSet {
        set,
        sigs,
        rank: eh.rank,
        expiring: new_ttl <= EXPIRING_TTL,
    })
}

pub(crate) fn append_set(pkt: &mut Message, set: &AnswerSet, authority: bool) {
    let records = set
        .set
        .to_records()
        .into_iter()
        .chain(set.sigs.iter().flat_map(RrSet::to_records));
    for rr in records {
        if authority {
            pkt.add_authority(rr);
        } else {
            pkt.add_answer(rr);
        }
    }
}

/// Renders the accumulator into `pkt` and flips the query flags that mark
/// a cache-synthesized response.
///
/// Returns the wire rcode that was set, or `None` when the accumulator
/// holds nothing servable (the caller then reports a miss).
pub fn write_answer(
    ans: &Answer,
    pkt: &mut Message,
    qname: &Name,
    qtype: RecordType,
    flags: &mut QueryFlags,
) -> Option<ResponseCode> {
    let rcode = match ans.rcode {
        AnswerRcode::NoData | AnswerRcode::NoError => ResponseCode::NoError,
        AnswerRcode::NxDomain => ResponseCode::NXDomain,
        AnswerRcode::Unset => return None,
    };

    pkt.renew(qname.clone(), Type::Known(qtype));
    pkt.set_rcode(rcode);
    if let Some(answer) = &ans.answer {
        append_set(pkt, answer, false);
    }
    for nsec in &ans.nsecs {
        append_set(pkt, nsec, true);
    }
    if let Some(soa) = &ans.soa {
        append_set(pkt, soa, true);
    }

    flags.expiring = ans.expiring();
    flags.cached = true;
    flags.no_minimize = true;
    Some(rcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{patch_ttl, write_sub_entry, EntryFlags};
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use varve_proto::rdata::A;
    use varve_proto::{RData, RecordClass};

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn sample_sub(ttl: u32) -> (Vec<u8>, EntryHeader) {
        let set = RrSet::with_rdata(
            name("*.example.com."),
            RecordType::A,
            RecordClass::IN,
            ttl,
            RData::A(A::new(Ipv4Addr::new(198, 51, 100, 7))),
        );
        let mut value = Vec::new();
        let at = write_sub_entry(
            &mut value,
            100,
            Rank::SECURE | Rank::AUTH,
            EntryFlags::empty(),
            &set,
            None,
        );
        patch_ttl(&mut value, at, ttl);
        let eh = crate::entry::entry_consistent(&value).unwrap();
        (value, eh)
    }

    #[test]
    fn test_owner_override() {
        let (value, eh) = sample_sub(300);
        let owner = name("foo.example.com.");
        let set = entry_to_answer(&value, &eh, &owner, RecordType::A, 250).unwrap();
        assert_eq!(set.set.owner(), &owner);
        assert_eq!(set.set.ttl(), 250);
        assert!(!set.expiring);

        let nearly = entry_to_answer(&value, &eh, &owner, RecordType::A, 4).unwrap();
        assert!(nearly.expiring);
    }

    #[test]
    fn test_write_answer_sections() {
        let (value, eh) = sample_sub(300);
        let owner = name("foo.example.com.");
        let mut ans = Answer::new();
        ans.answer = Some(entry_to_answer(&value, &eh, &owner, RecordType::A, 250).unwrap());
        ans.rcode = AnswerRcode::NoError;

        let mut pkt = Message::new(7);
        let mut flags = QueryFlags::default();
        let rcode = write_answer(&ans, &mut pkt, &owner, RecordType::A, &mut flags);
        assert_eq!(rcode, Some(ResponseCode::NoError));
        assert_eq!(pkt.answers().len(), 1);
        assert!(pkt.authority().is_empty());
        assert!(flags.cached);
        assert!(flags.no_minimize);
        assert!(!flags.expiring);
    }

    #[test]
    fn test_unset_reports_nothing() {
        let ans = Answer::new();
        let mut pkt = Message::new(7);
        let mut flags = QueryFlags::default();
        assert!(write_answer(
            &ans,
            &mut pkt,
            &name("example.com."),
            RecordType::A,
            &mut flags
        )
        .is_none());
        assert!(!flags.cached);
    }
}
