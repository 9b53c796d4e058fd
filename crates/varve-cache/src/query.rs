//! The surface the iterator layer talks to the cache through.
//!
//! The cache never drives queries itself; it is handed the current request
//! and sub-query state at each `peek`/`stash` call and may flip a few query
//! flags in return.

use crate::rank::Rank;
use std::fmt;
use std::sync::Arc;
use varve_proto::{Name, RecordClass, RecordType, RrSet};

/// Layer processing state, as seen and returned by cache callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The query still needs work from further layers or upstream.
    Produce,
    /// The query was fully answered.
    Done,
    /// The query failed.
    Fail,
}

/// Packet section a selected record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// The answer section.
    Answer,
    /// The authority section.
    Authority,
    /// The additional section.
    Additional,
}

/// Per-query flags the cache reads or sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFlags {
    /// Never consult the cache for this query.
    pub no_cache: bool,
    /// The cache was already consulted for this sub-query.
    pub cache_tried: bool,
    /// The answer was satisfied from the cache.
    pub cached: bool,
    /// QNAME minimization must be disabled from here on.
    pub no_minimize: bool,
    /// Some returned RR-set is close to expiry.
    pub expiring: bool,
    /// DNSSEC validation is wanted for this query.
    pub dnssec_want: bool,
    /// The query is proven to lie in an insecure (unsigned) zone.
    pub dnssec_insecure: bool,
    /// Validation of the answer failed.
    pub dnssec_bogus: bool,
    /// The query fetches non-authoritative helper data (e.g. NS addresses).
    pub nonauth: bool,
    /// The resolver runs in stub mode for this query.
    pub stub: bool,
}

/// Stale-serving decision callback.
///
/// Invoked with the (negative) remaining TTL, the owner name, and the
/// record type; returning a non-negative value authorizes serving the
/// record with that TTL.
pub type StaleCb = Box<dyn Fn(i32, &Name, RecordType) -> i32>;

/// One sub-query of a resolution plan.
pub struct Query {
    /// The name being resolved.
    pub sname: Name,
    /// The type being resolved.
    pub stype: RecordType,
    /// The query class; only IN is cacheable.
    pub sclass: RecordClass,
    /// Wall-clock seconds when this query started.
    pub timestamp: u32,
    /// Identifier tying selected records to this sub-query.
    pub uid: u32,
    /// Flags the cache reads or sets.
    pub flags: QueryFlags,
    /// Optional stale-serving capability, scoped to this query.
    pub stale_cb: Option<StaleCb>,
}

impl Query {
    /// Creates a query with default flags and no stale callback.
    pub fn new(sname: Name, stype: RecordType, timestamp: u32) -> Self {
        Self {
            sname,
            stype,
            sclass: RecordClass::IN,
            timestamp,
            uid: 0,
            flags: QueryFlags::default(),
            stale_cb: None,
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sname", &self.sname)
            .field("stype", &self.stype)
            .field("sclass", &self.sclass)
            .field("timestamp", &self.timestamp)
            .field("uid", &self.uid)
            .field("flags", &self.flags)
            .field("stale_cb", &self.stale_cb.is_some())
            .finish()
    }
}

/// An RR-set selected by the iterator, with its validation rank.
#[derive(Debug, Clone)]
pub struct RankedRrset {
    /// The packet section the set came from.
    pub section: Section,
    /// The records themselves.
    pub rrset: RrSet,
    /// Rank assigned by the validator.
    pub rank: Rank,
    /// The sub-query that produced the set.
    pub qry_uid: u32,
    /// Set once the record has been stashed.
    pub cached: bool,
}

impl RankedRrset {
    /// Creates a selected RR-set for a sub-query.
    pub fn new(section: Section, rrset: RrSet, rank: Rank, qry_uid: u32) -> Self {
        Self {
            section,
            rrset,
            rank,
            qry_uid,
            cached: false,
        }
    }
}

/// Trust-anchor store consulted when computing the rank floor.
pub trait TrustAnchors {
    /// Returns true if some trust anchor covers `name`.
    fn covers(&self, name: &Name, rtype: RecordType) -> bool;
}

/// A store with no anchors: nothing is covered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnchors;

impl TrustAnchors for NoAnchors {
    fn covers(&self, _name: &Name, _rtype: RecordType) -> bool {
        false
    }
}

/// A plain list of anchor points; a name is covered when it falls under
/// any of them.
#[derive(Debug, Default, Clone)]
pub struct AnchorSet {
    anchors: Vec<Name>,
}

impl AnchorSet {
    /// Creates a store from anchor names.
    pub fn new(anchors: Vec<Name>) -> Self {
        Self { anchors }
    }
}

impl TrustAnchors for AnchorSet {
    fn covers(&self, name: &Name, _rtype: RecordType) -> bool {
        self.anchors.iter().any(|a| name.is_subdomain_of(a))
    }
}

/// The resolution request a layer call belongs to.
pub struct Request {
    /// Current layer state; peek returns it unchanged on a miss.
    pub state: State,
    /// The CD bit of the client request.
    pub checking_disabled: bool,
    /// Trust anchors for rank-floor decisions.
    pub trust_anchors: Arc<dyn TrustAnchors>,
    /// The current sub-query.
    pub qry: Query,
    /// Records selected by the iterator, for stashing.
    pub selected: Vec<RankedRrset>,
}

impl Request {
    /// Creates a request around one sub-query, with no trust anchors.
    pub fn new(qry: Query) -> Self {
        Self {
            state: State::Produce,
            checking_disabled: false,
            trust_anchors: Arc::new(NoAnchors),
            qry,
            selected: Vec::new(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("state", &self.state)
            .field("checking_disabled", &self.checking_disabled)
            .field("qry", &self.qry)
            .field("selected", &self.selected.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_anchor_set() {
        let anchors = AnchorSet::new(vec![Name::from_str("example.com.").unwrap()]);
        let sub = Name::from_str("a.b.example.com.").unwrap();
        let other = Name::from_str("example.org.").unwrap();
        assert!(anchors.covers(&sub, RecordType::A));
        assert!(!anchors.covers(&other, RecordType::A));
        assert!(!NoAnchors.covers(&sub, RecordType::A));
    }
}
