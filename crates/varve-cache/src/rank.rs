//! Record rank and TTL policy.
//!
//! Every cached entry carries a *rank* byte describing how far its data got
//! through validation and whether it came from an authoritative source.
//! Peek decides what is acceptable by computing a per-request floor and
//! testing entries against it.

use crate::entry::EntryHeader;
use crate::query::{Query, Request};
use std::fmt;
use std::ops::BitOr;
use varve_proto::{Name, RecordType};

/// Validation rank of a cached entry.
///
/// The two low bits carry the base level, ordered
/// `INITIAL < INSECURE < SECURE < BOGUS`; bit 2 marks data that came from
/// an authoritative source. The lattice is only partially ordered:
/// acceptance is "base level at least the floor's, and authoritative if the
/// floor demands it".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rank(u8);

impl Rank {
    /// Freshly obtained, not validated at all.
    pub const INITIAL: Rank = Rank(0);
    /// Proven to lie in an unsigned part of the tree.
    pub const INSECURE: Rank = Rank(1);
    /// Cryptographically validated.
    pub const SECURE: Rank = Rank(2);
    /// Failed validation; only packet entries may carry this.
    pub const BOGUS: Rank = Rank(3);
    /// Flag: obtained from an authoritative server.
    pub const AUTH: Rank = Rank(0x04);

    const BASE_MASK: u8 = 0x03;
    const KNOWN_MASK: u8 = 0x07;

    /// Reconstructs a rank from its storage byte, dropping unknown bits.
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self(byte & Self::KNOWN_MASK)
    }

    /// Returns the storage byte.
    #[inline]
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Returns the base validation level (the two low bits).
    #[inline]
    pub const fn base(self) -> u8 {
        self.0 & Self::BASE_MASK
    }

    /// Returns true if the AUTH flag is set.
    #[inline]
    pub const fn is_auth(self) -> bool {
        self.0 & Self::AUTH.0 != 0
    }

    /// Returns true if the base level is SECURE.
    #[inline]
    pub fn is_secure(self) -> bool {
        self.base() == Self::SECURE.0
    }

    /// Returns true if the base level is INSECURE.
    #[inline]
    pub fn is_insecure(self) -> bool {
        self.base() == Self::INSECURE.0
    }

    /// Returns true if the base level is BOGUS.
    #[inline]
    pub fn is_bogus(self) -> bool {
        self.base() == Self::BOGUS.0
    }

    /// Acceptance predicate: base level at least the floor's, and AUTH
    /// whenever the floor requires it.
    #[inline]
    pub fn acceptable(self, floor: Rank) -> bool {
        self.base() >= floor.base() && (!floor.is_auth() || self.is_auth())
    }

    /// Total order used when an existing entry competes with a new one:
    /// base level first, authoritativeness as the tie-break.
    #[inline]
    pub const fn order(self) -> (u8, bool) {
        (self.base(), self.is_auth())
    }
}

impl BitOr for Rank {
    type Output = Rank;

    #[inline]
    fn bitor(self, rhs: Rank) -> Rank {
        Rank(self.0 | rhs.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base() {
            0 => "initial",
            1 => "insecure",
            2 => "secure",
            _ => "bogus",
        };
        if self.is_auth() {
            write!(f, "{base}+auth")
        } else {
            f.write_str(base)
        }
    }
}

/// Computes the remaining TTL of an entry at `now`, negative once expired.
///
/// When the result is negative and the query carries a stale-serving
/// callback, the callback may override it; a non-negative return authorizes
/// serving the record with that TTL.
pub fn get_new_ttl(
    entry: &EntryHeader,
    qry: &Query,
    owner: Option<&Name>,
    rtype: RecordType,
    now: u32,
) -> i32 {
    // The record may have been obtained after the request started.
    let diff = now.saturating_sub(entry.time);
    let res = entry.ttl as i64 - i64::from(diff);
    let res = res.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    if res < 0 {
        if let (Some(owner), Some(cb)) = (owner, qry.stale_cb.as_ref()) {
            let stale = cb(res, owner, rtype);
            if stale >= 0 {
                return stale;
            }
        }
    }
    res
}

/// Decides the lowest acceptable rank for this request.
pub fn lowest_rank(req: &Request, qry: &Query) -> Rank {
    // In stub mode we do not trust RRs any further anyway, and a request
    // with checking disabled asked us not to.
    let allow_unverified = req.checking_disabled || qry.flags.stub;
    if qry.flags.nonauth {
        // Validation status carries little meaning for non-authoritative
        // records such as NS addresses picked up from glue.
        Rank::INITIAL
    } else if !allow_unverified && req.trust_anchors.covers(&qry.sname, qry.stype) {
        Rank::INSECURE | Rank::AUTH
    } else {
        Rank::INITIAL | Rank::AUTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryFlags;
    use crate::query::{AnchorSet, Query, Request};
    use std::str::FromStr;
    use std::sync::Arc;

    fn header(time: u32, ttl: u32) -> EntryHeader {
        EntryHeader {
            time,
            ttl,
            rank: Rank::SECURE | Rank::AUTH,
            flags: EntryFlags::empty(),
        }
    }

    fn query(name: &str) -> Query {
        Query::new(Name::from_str(name).unwrap(), RecordType::A, 0)
    }

    #[test]
    fn test_rank_acceptance() {
        let floor = Rank::INSECURE | Rank::AUTH;
        assert!((Rank::SECURE | Rank::AUTH).acceptable(floor));
        assert!((Rank::INSECURE | Rank::AUTH).acceptable(floor));
        assert!(!(Rank::INITIAL | Rank::AUTH).acceptable(floor));
        assert!(!Rank::SECURE.acceptable(floor)); // AUTH missing

        // A bare INITIAL floor accepts anything.
        assert!(Rank::INITIAL.acceptable(Rank::INITIAL));
        assert!(Rank::SECURE.acceptable(Rank::INITIAL));
    }

    #[test]
    fn test_rank_roundtrip() {
        let rank = Rank::SECURE | Rank::AUTH;
        assert_eq!(Rank::from_byte(rank.to_byte()), rank);
        assert_eq!(Rank::from_byte(0xF8), Rank::INITIAL); // unknown bits dropped
        assert_eq!(rank.to_string(), "secure+auth");
    }

    #[test]
    fn test_ttl_decay() {
        let eh = header(100, 300);
        let qry = query("example.com.");
        let name = Name::from_str("example.com.").unwrap();
        assert_eq!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 100), 300);
        assert_eq!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 150), 250);
        assert_eq!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 401), -1);
        // Clock skew: obtained after the request started.
        assert_eq!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 50), 300);
    }

    #[test]
    fn test_stale_callback() {
        let eh = header(100, 300);
        let mut qry = query("example.com.");
        qry.stale_cb = Some(Box::new(|_expired_by, _owner, _rtype| 30));
        let name = Name::from_str("example.com.").unwrap();
        assert_eq!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 401), 30);
        // Fresh records never consult the callback.
        assert_eq!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 150), 250);
    }

    #[test]
    fn test_stale_callback_refusal() {
        let eh = header(100, 300);
        let mut qry = query("example.com.");
        qry.stale_cb = Some(Box::new(|_, _, _| -1));
        let name = Name::from_str("example.com.").unwrap();
        assert!(get_new_ttl(&eh, &qry, Some(&name), RecordType::A, 401) < 0);
    }

    #[test]
    fn test_lowest_rank() {
        let qry = query("example.com.");
        let mut req = Request::new(query("example.com."));
        assert_eq!(lowest_rank(&req, &qry), Rank::INITIAL | Rank::AUTH);

        req.checking_disabled = true;
        assert_eq!(lowest_rank(&req, &qry), Rank::INITIAL | Rank::AUTH);

        req.checking_disabled = false;
        req.trust_anchors = Arc::new(AnchorSet::new(vec![Name::from_str(".").unwrap()]));
        assert_eq!(lowest_rank(&req, &qry), Rank::INSECURE | Rank::AUTH);

        // Checking disabled bypasses the trust-anchor floor.
        req.checking_disabled = true;
        assert_eq!(lowest_rank(&req, &qry), Rank::INITIAL | Rank::AUTH);

        let mut nonauth = query("example.com.");
        nonauth.flags.nonauth = true;
        assert_eq!(lowest_rank(&req, &nonauth), Rank::INITIAL);
    }
}
