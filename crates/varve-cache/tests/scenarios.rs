//! End-to-end cache behavior over the in-memory backend, with explicit
//! timestamps driving all TTL arithmetic.

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use varve_cache::query::AnchorSet;
use varve_cache::{Cache, MemoryBackend, Query, Rank, Request, State};
use varve_proto::rdata::{A, CNAME, NS, NSEC, RRSIG, SOA};
use varve_proto::{
    Message, Name, Question, RData, RecordClass, RecordType, ResponseCode, ResourceRecord, RrSet,
};

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn cache() -> Cache<MemoryBackend> {
    let mut cache = Cache::open(MemoryBackend::new()).unwrap();
    cache.set_ttl_bounds(5, 3600);
    cache
}

fn request(qname: &str, qtype: RecordType, now: u32) -> Request {
    Request::new(Query::new(name(qname), qtype, now))
}

fn a_set(owner: &str, ttl: u32, last: u8) -> RrSet {
    RrSet::with_rdata(
        name(owner),
        RecordType::A,
        RecordClass::IN,
        ttl,
        RData::A(A::new(Ipv4Addr::new(192, 0, 2, last))),
    )
}

fn ns_set(owner: &str, target: &str, ttl: u32) -> RrSet {
    RrSet::with_rdata(
        name(owner),
        RecordType::NS,
        RecordClass::IN,
        ttl,
        RData::NS(NS::new(name(target))),
    )
}

fn soa_set(owner: &str, ttl: u32) -> RrSet {
    RrSet::with_rdata(
        name(owner),
        RecordType::SOA,
        RecordClass::IN,
        ttl,
        RData::SOA(SOA::new(
            name("ns1.example.com."),
            name("hostmaster.example.com."),
            2024010101,
            7200,
            3600,
            1209600,
            300,
        )),
    )
}

fn nsec_set(owner: &str, next: &str, types: &[RecordType], ttl: u32) -> RrSet {
    RrSet::with_rdata(
        name(owner),
        RecordType::NSEC,
        RecordClass::IN,
        ttl,
        RData::NSEC(NSEC::with_types(name(next), types)),
    )
}

fn sig_set(owner: &str, covered: RecordType, labels: u8, ttl: u32, signer: &str) -> RrSet {
    RrSet::with_rdata(
        name(owner),
        RecordType::RRSIG,
        RecordClass::IN,
        ttl,
        RData::RRSIG(RRSIG::new(
            covered.to_u16(),
            13,
            labels,
            ttl,
            u32::MAX,
            0,
            12345,
            name(signer),
            vec![0xAB; 64],
        )),
    )
}

/// Stashes a DNSSEC-correct example.com zone skeleton: the zone cut, the
/// SOA, and an NSEC chain `apex -> a -> c -> apex`.
fn populate_zone(cache: &Cache<MemoryBackend>, at: u32) {
    let secure = Rank::SECURE | Rank::AUTH;
    cache
        .insert_rr(
            &ns_set("example.com.", "ns1.example.com.", 3600),
            None,
            Rank::INSECURE | Rank::AUTH,
            at,
        )
        .unwrap();
    cache
        .insert_rr(&soa_set("example.com.", 3600), None, secure, at)
        .unwrap();
    cache
        .insert_rr(
            &nsec_set(
                "example.com.",
                "a.example.com.",
                &[RecordType::SOA, RecordType::NS],
                3600,
            ),
            Some(&sig_set(
                "example.com.",
                RecordType::NSEC,
                2,
                3600,
                "example.com.",
            )),
            secure,
            at,
        )
        .unwrap();
    cache
        .insert_rr(
            &nsec_set("a.example.com.", "c.example.com.", &[RecordType::A], 3600),
            Some(&sig_set(
                "a.example.com.",
                RecordType::NSEC,
                3,
                3600,
                "example.com.",
            )),
            secure,
            at,
        )
        .unwrap();
    cache
        .insert_rr(
            &nsec_set("c.example.com.", "example.com.", &[RecordType::A], 3600),
            Some(&sig_set(
                "c.example.com.",
                RecordType::NSEC,
                3,
                3600,
                "example.com.",
            )),
            secure,
            at,
        )
        .unwrap();
}

// ============================================================================
// Exact hits and TTL decay
// ============================================================================

#[test]
fn exact_positive_hit() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();

    let mut req = request("example.com.", RecordType::A, 150);
    let mut pkt = Message::new(0x1234);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);

    assert_eq!(pkt.rcode(), ResponseCode::NoError);
    assert_eq!(pkt.answers().len(), 1);
    let rr = &pkt.answers()[0];
    assert_eq!(rr.name(), &name("example.com."));
    assert_eq!(rr.ttl(), 250);
    assert!(req.qry.flags.cached);
    assert!(req.qry.flags.no_minimize);
    assert!(!req.qry.flags.expiring);
    assert_eq!(cache.stats().hits(), 1);
}

#[test]
fn roundtrip_keeps_full_ttl() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();

    let mut req = request("example.com.", RecordType::A, 100);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
    assert_eq!(pkt.answers()[0].ttl(), 300);
}

#[test]
fn stale_refused_then_accepted() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();

    // Without a stale callback the expired record is a miss.
    let mut req = request("example.com.", RecordType::A, 401);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
    assert!(!req.qry.flags.cached);

    // A callback authorizing 30 seconds revives it.
    let mut req = request("example.com.", RecordType::A, 401);
    req.qry.stale_cb = Some(Box::new(|_expired_by, _owner, _rtype| 30));
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
    assert_eq!(pkt.answers()[0].ttl(), 30);
}

#[test]
fn expiring_flag_near_ttl_end() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();

    let mut req = request("example.com.", RecordType::A, 397);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
    assert_eq!(pkt.answers()[0].ttl(), 3);
    assert!(req.qry.flags.expiring);
}

#[test]
fn ttl_clamped_at_stash() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 100_000, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();
    let peek = cache
        .peek_exact(&name("example.com."), RecordType::A)
        .unwrap();
    assert_eq!(peek.ttl, 3600);

    cache
        .insert_rr(
            &a_set("tiny.example.com.", 1, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();
    let peek = cache
        .peek_exact(&name("tiny.example.com."), RecordType::A)
        .unwrap();
    assert_eq!(peek.ttl, 5);
}

// ============================================================================
// Rank policy
// ============================================================================

#[test]
fn rank_floor_blocks_low_entries() {
    let cache = cache();
    cache
        .insert_rr(&a_set("example.com.", 300, 1), None, Rank::INITIAL, 100)
        .unwrap();

    // Default floor demands AUTH data.
    let mut req = request("example.com.", RecordType::A, 150);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);

    // Under a trust anchor the floor rises to INSECURE+AUTH, so even
    // INITIAL+AUTH data stops being served.
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::INITIAL | Rank::AUTH,
            100,
        )
        .unwrap();
    let mut req = request("example.com.", RecordType::A, 150);
    req.trust_anchors = Arc::new(AnchorSet::new(vec![Name::root()]));
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);

    // A non-auth fetch accepts anything.
    let mut req = request("example.com.", RecordType::A, 150);
    req.qry.flags.nonauth = true;
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
}

#[test]
fn splice_keeps_better_entry() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();
    // A lower-ranked refresh must not clobber the validated entry.
    cache
        .insert_rr(
            &a_set("example.com.", 600, 2),
            None,
            Rank::INITIAL | Rank::AUTH,
            110,
        )
        .unwrap();
    let peek = cache
        .peek_exact(&name("example.com."), RecordType::A)
        .unwrap();
    assert_eq!(peek.rank, Rank::SECURE | Rank::AUTH);
    assert_eq!(peek.ttl, 300);

    // An equal-rank refresh with more remaining life replaces it.
    cache
        .insert_rr(
            &a_set("example.com.", 600, 2),
            None,
            Rank::SECURE | Rank::AUTH,
            120,
        )
        .unwrap();
    let peek = cache
        .peek_exact(&name("example.com."), RecordType::A)
        .unwrap();
    assert_eq!(peek.ttl, 600);
}

// ============================================================================
// Zone cuts and xNAME tunneling
// ============================================================================

#[test]
fn closest_ns_fallback_preserves_state() {
    let cache = cache();
    cache
        .insert_rr(
            &ns_set("com.", "a.gtld-servers.net.", 3600),
            None,
            Rank::INSECURE | Rank::AUTH,
            0,
        )
        .unwrap();

    // No exact hit, the com cut is found, but with no NSEC chain the
    // negative assembly yields nothing: the caller's state is preserved.
    let mut req = request("sub.example.com.", RecordType::A, 10);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
    assert!(!req.qry.flags.cached);
    assert!(req.qry.flags.cache_tried);
    assert_eq!(cache.stats().misses(), 1);
}

#[test]
fn cname_tunneled_under_ns_key() {
    let cache = cache();
    let secure = Rank::SECURE | Rank::AUTH;
    let cname = RrSet::with_rdata(
        name("x.example.com."),
        RecordType::CNAME,
        RecordClass::IN,
        300,
        RData::CNAME(CNAME::new(name("target.example.org."))),
    );
    cache.insert_rr(&cname, None, secure, 100).unwrap();
    // Stashing an NS at the same name must not clobber the CNAME.
    cache
        .insert_rr(
            &ns_set("x.example.com.", "ns1.example.com.", 600),
            None,
            Rank::INITIAL | Rank::AUTH,
            100,
        )
        .unwrap();

    let cname_peek = cache
        .peek_exact(&name("x.example.com."), RecordType::CNAME)
        .unwrap();
    assert_eq!(cname_peek.rank, secure);
    assert_eq!(cname_peek.ttl, 300);
    let ns_peek = cache
        .peek_exact(&name("x.example.com."), RecordType::NS)
        .unwrap();
    assert_eq!(ns_peek.ttl, 600);
}

#[test]
fn cname_answers_other_type_queries() {
    let cache = cache();
    let cname = RrSet::with_rdata(
        name("x.example.com."),
        RecordType::CNAME,
        RecordClass::IN,
        300,
        RData::CNAME(CNAME::new(name("target.example.org."))),
    );
    cache
        .insert_rr(&cname, None, Rank::SECURE | Rank::AUTH, 100)
        .unwrap();

    // An A query at the aliased name is answered with the CNAME; the
    // chase happens in a subsequent sub-query.
    let mut req = request("x.example.com.", RecordType::A, 150);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
    assert_eq!(pkt.answers().len(), 1);
    assert_eq!(pkt.answers()[0].record_type(), Some(RecordType::CNAME));
    assert_eq!(pkt.answers()[0].ttl(), 250);
}

#[test]
fn ds_query_skips_child_ns() {
    let cache = cache();
    cache
        .insert_rr(
            &ns_set("example.com.", "ns1.example.com.", 3600),
            None,
            Rank::INITIAL | Rank::AUTH,
            0,
        )
        .unwrap();

    // A DS query for the cut name must not terminate at the child's NS
    // entry; with nothing else cached it falls through to a miss.
    let mut req = request("example.com.", RecordType::DS, 10);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
}

// ============================================================================
// Negative proofs
// ============================================================================

#[test]
fn nxdomain_synthesis() {
    let cache = cache();
    populate_zone(&cache, 100);

    let mut req = request("b.example.com.", RecordType::TXT, 200);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);

    assert_eq!(pkt.rcode(), ResponseCode::NXDomain);
    assert!(pkt.answers().is_empty());

    let nsec_owners: Vec<String> = pkt
        .authority()
        .iter()
        .filter(|rr| rr.record_type() == Some(RecordType::NSEC))
        .map(|rr| rr.name().to_string())
        .collect();
    // One NSEC covers b.example.com, the other its source of synthesis.
    assert_eq!(nsec_owners.len(), 2);
    assert!(nsec_owners.contains(&"a.example.com.".to_owned()));
    assert!(nsec_owners.contains(&"example.com.".to_owned()));

    let soa_count = pkt
        .authority()
        .iter()
        .filter(|rr| rr.record_type() == Some(RecordType::SOA))
        .count();
    assert_eq!(soa_count, 1);

    // The proofs decay like everything else.
    for rr in pkt.authority() {
        if rr.record_type() == Some(RecordType::NSEC) {
            assert_eq!(rr.ttl(), 3500);
        }
    }
    assert!(req.qry.flags.cached);
}

#[test]
fn nodata_from_matching_nsec() {
    let cache = cache();
    populate_zone(&cache, 100);

    // a.example.com exists but has only A; a TXT query is NODATA.
    let mut req = request("a.example.com.", RecordType::TXT, 200);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);

    assert_eq!(pkt.rcode(), ResponseCode::NoError);
    assert!(pkt.answers().is_empty());
    let nsec_count = pkt
        .authority()
        .iter()
        .filter(|rr| rr.record_type() == Some(RecordType::NSEC))
        .count();
    assert_eq!(nsec_count, 1);
    assert!(pkt
        .authority()
        .iter()
        .any(|rr| rr.record_type() == Some(RecordType::SOA)));
}

#[test]
fn matching_nsec_with_type_present_is_no_proof() {
    let cache = cache();
    populate_zone(&cache, 100);

    // The bitmap at a.example.com lists A, so it cannot prove anything
    // about an A query; the iterator must go upstream.
    let mut req = request("a.example.com.", RecordType::A, 200);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
}

#[test]
fn stale_nsec_abandons_proof() {
    let cache = cache();
    populate_zone(&cache, 100);

    // Long past every TTL nothing is served, even though the records
    // are still physically present.
    let mut req = request("b.example.com.", RecordType::TXT, 100 + 4000);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
}

// ============================================================================
// Wildcard expansion
// ============================================================================

/// Zone skeleton with a wildcard: names are example.com, *.example.com,
/// c.example.com; the NSEC chain runs apex -> * -> c -> apex.
fn populate_wildcard_zone(cache: &Cache<MemoryBackend>, at: u32) {
    let secure = Rank::SECURE | Rank::AUTH;
    cache
        .insert_rr(
            &ns_set("example.com.", "ns1.example.com.", 3600),
            None,
            Rank::INSECURE | Rank::AUTH,
            at,
        )
        .unwrap();
    cache
        .insert_rr(&soa_set("example.com.", 3600), None, secure, at)
        .unwrap();
    cache
        .insert_rr(
            &nsec_set(
                "*.example.com.",
                "c.example.com.",
                &[RecordType::A, RecordType::RRSIG, RecordType::NSEC],
                3600,
            ),
            Some(&sig_set(
                "*.example.com.",
                RecordType::NSEC,
                2,
                3600,
                "example.com.",
            )),
            secure,
            at,
        )
        .unwrap();
    cache
        .insert_rr(
            &nsec_set("c.example.com.", "example.com.", &[RecordType::A], 3600),
            Some(&sig_set(
                "c.example.com.",
                RecordType::NSEC,
                3,
                3600,
                "example.com.",
            )),
            secure,
            at,
        )
        .unwrap();
    cache
        .insert_rr(
            &a_set("*.example.com.", 300, 7),
            Some(&sig_set(
                "*.example.com.",
                RecordType::A,
                2,
                300,
                "example.com.",
            )),
            secure,
            at,
        )
        .unwrap();
}

#[test]
fn wildcard_expansion() {
    let cache = cache();
    populate_wildcard_zone(&cache, 100);

    let mut req = request("foo.example.com.", RecordType::A, 150);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);

    assert_eq!(pkt.rcode(), ResponseCode::NoError);
    let answers: Vec<_> = pkt
        .answers()
        .iter()
        .filter(|rr| rr.record_type() == Some(RecordType::A))
        .collect();
    assert_eq!(answers.len(), 1);
    // The owner is the queried name, not the wildcard.
    assert_eq!(answers[0].name(), &name("foo.example.com."));
    assert_eq!(answers[0].ttl(), 250);

    // The authority proves the exact name does not exist.
    assert!(pkt
        .authority()
        .iter()
        .any(|rr| rr.record_type() == Some(RecordType::NSEC)
            && rr.name() == &name("c.example.com.")));
}

#[test]
fn wildcard_stash_keys_on_source_of_synthesis() {
    let cache = cache();
    // An answer expanded from the wildcard arrives with the expanded
    // owner; the RRSIG label count reveals the synthesis.
    cache
        .insert_rr(
            &a_set("bar.example.com.", 300, 7),
            Some(&sig_set(
                "bar.example.com.",
                RecordType::A,
                2,
                300,
                "example.com.",
            )),
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();

    // It is retrievable under the wildcard name.
    let peek = cache
        .peek_exact(&name("*.example.com."), RecordType::A)
        .unwrap();
    assert_eq!(peek.ttl, 300);
    // And not under the expanded name.
    assert!(cache
        .peek_exact(&name("bar.example.com."), RecordType::A)
        .is_err());
}

#[test]
fn malformed_wildcard_labels_rejected() {
    let cache = cache();
    // RRSIG claiming more labels than the owner has is malformed.
    let result = cache.insert_rr(
        &a_set("example.com.", 300, 1),
        Some(&sig_set(
            "example.com.",
            RecordType::A,
            9,
            300,
            "example.com.",
        )),
        Rank::SECURE | Rank::AUTH,
        100,
    );
    assert!(result.is_ok());
    assert!(cache
        .peek_exact(&name("example.com."), RecordType::A)
        .is_err());
    assert_eq!(cache.stats().inserts(), 0);
}

// ============================================================================
// Packet entries
// ============================================================================

fn nxdomain_packet(qname: &str, qtype: RecordType, soa_ttl: u32) -> Message {
    let mut pkt = Message::new(0x77);
    pkt.renew(name(qname), qtype.into());
    pkt.set_rcode(ResponseCode::NXDomain);
    pkt.add_authority(ResourceRecord::new_known(
        name("example.com."),
        RecordType::SOA,
        RecordClass::IN,
        soa_ttl,
        RData::SOA(SOA::new(
            name("ns1.example.com."),
            name("hostmaster.example.com."),
            1,
            2,
            3,
            4,
            600,
        )),
    ));
    pkt
}

#[test]
fn packet_entry_roundtrip() {
    let cache = cache();

    // Stash an aggregate NXDOMAIN (no NSECs worth keeping per-RR).
    let mut req = request("gone.example.com.", RecordType::TXT, 100);
    let upstream = nxdomain_packet("gone.example.com.", RecordType::TXT, 600);
    assert_eq!(cache.stash(&mut req, &upstream), State::Produce);
    assert_eq!(cache.stats().inserts(), 1);

    // Peek it back later with TTLs decremented.
    let mut req = request("gone.example.com.", RecordType::TXT, 150);
    let mut pkt = Message::new(0x42);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
    assert_eq!(pkt.rcode(), ResponseCode::NXDomain);
    assert_eq!(pkt.id(), 0x42);
    assert_eq!(pkt.authority().len(), 1);
    assert_eq!(pkt.authority()[0].ttl(), 550);
    assert!(req.qry.flags.cached);

    // Expired packets are a miss again.
    let mut req = request("gone.example.com.", RecordType::TXT, 800);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
}

#[test]
fn bogus_packet_served_only_with_cd() {
    let cache = cache();

    // A validation failure goes to the packet cache.
    let mut pkt = Message::new(0x11);
    pkt.renew(name("broken.example.com."), RecordType::A.into());
    pkt.add_answer(ResourceRecord::new_known(
        name("broken.example.com."),
        RecordType::A,
        RecordClass::IN,
        300,
        RData::A(A::new(Ipv4Addr::new(192, 0, 2, 66))),
    ));
    let mut req = request("broken.example.com.", RecordType::A, 100);
    req.qry.flags.dnssec_bogus = true;
    cache.stash(&mut req, &pkt);
    assert_eq!(cache.stats().inserts(), 1);

    // A validating request never sees it.
    let mut req = request("broken.example.com.", RecordType::A, 150);
    let mut out = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut out), State::Produce);
    assert!(!req.qry.flags.dnssec_bogus);

    // A checking-disabled request does.
    let mut req = request("broken.example.com.", RecordType::A, 150);
    req.checking_disabled = true;
    let mut out = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut out), State::Done);
    assert_eq!(out.answers().len(), 1);
    assert_eq!(out.answers()[0].ttl(), 250);
    assert!(req.qry.flags.dnssec_bogus);
}

#[test]
fn packet_entries_hidden_from_peek_exact() {
    let cache = cache();
    let mut req = request("gone.example.com.", RecordType::TXT, 100);
    let upstream = nxdomain_packet("gone.example.com.", RecordType::TXT, 600);
    cache.stash(&mut req, &upstream);

    assert!(cache
        .peek_exact(&name("gone.example.com."), RecordType::TXT)
        .is_err());
}

#[test]
fn negative_with_nsec_proof_not_packet_cached() {
    let cache = cache();
    let mut pkt = nxdomain_packet("gone.example.com.", RecordType::TXT, 600);
    pkt.add_authority(ResourceRecord::new_known(
        name("a.example.com."),
        RecordType::NSEC,
        RecordClass::IN,
        600,
        RData::NSEC(NSEC::with_types(name("c.example.com."), &[RecordType::A])),
    ));

    let mut req = request("gone.example.com.", RecordType::TXT, 100);
    cache.stash(&mut req, &pkt);
    // The NSEC chain cache is responsible; no aggregate entry is written.
    assert_eq!(cache.stats().inserts(), 0);
}

// ============================================================================
// Stash via selected records
// ============================================================================

#[test]
fn stash_selected_records_with_sigs() {
    use varve_cache::{RankedRrset, Section};

    let cache = cache();
    let mut req = request("example.com.", RecordType::A, 100);
    req.qry.uid = 7;
    req.selected = vec![
        RankedRrset::new(
            Section::Answer,
            a_set("example.com.", 300, 1),
            Rank::SECURE | Rank::AUTH,
            7,
        ),
        RankedRrset::new(
            Section::Answer,
            sig_set("example.com.", RecordType::A, 2, 300, "example.com."),
            Rank::SECURE | Rank::AUTH,
            7,
        ),
    ];

    let mut pkt = Message::new(1);
    pkt.renew(name("example.com."), RecordType::A.into());
    cache.stash(&mut req, &pkt);

    assert!(req.selected.iter().all(|e| e.cached));
    assert_eq!(cache.stats().inserts(), 1);

    // The signatures come back attached to the answer.
    let mut req = request("example.com.", RecordType::A, 150);
    let mut out = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut out), State::Done);
    assert_eq!(out.answers().len(), 2);
    assert!(out
        .answers()
        .iter()
        .any(|rr| rr.record_type() == Some(RecordType::RRSIG)));
}

#[test]
fn stash_skips_foreign_and_cached_entries() {
    use varve_cache::{RankedRrset, Section};

    let cache = cache();
    let mut req = request("example.com.", RecordType::A, 100);
    req.qry.uid = 7;
    let mut already = RankedRrset::new(
        Section::Answer,
        a_set("done.example.com.", 300, 1),
        Rank::SECURE | Rank::AUTH,
        7,
    );
    already.cached = true;
    req.selected = vec![
        already,
        RankedRrset::new(
            Section::Answer,
            a_set("other.example.com.", 300, 1),
            Rank::SECURE | Rank::AUTH,
            99, // different sub-query
        ),
    ];

    let mut pkt = Message::new(1);
    pkt.renew(name("example.com."), RecordType::A.into());
    cache.stash(&mut req, &pkt);
    assert_eq!(cache.stats().inserts(), 0);
}

#[test]
fn truncated_packets_not_stashed() {
    use varve_proto::HeaderFlags;

    let cache = cache();
    let mut req = request("example.com.", RecordType::A, 100);
    req.selected = vec![varve_cache::RankedRrset::new(
        varve_cache::Section::Answer,
        a_set("example.com.", 300, 1),
        Rank::SECURE | Rank::AUTH,
        0,
    )];
    let mut pkt = Message::new(1);
    pkt.renew(name("example.com."), RecordType::A.into());
    pkt.header_mut().flags |= HeaderFlags::TC;
    cache.stash(&mut req, &pkt);
    assert_eq!(cache.stats().inserts(), 0);
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn peek_skips_unfit_queries() {
    let cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();

    // NO_CACHE flag.
    let mut req = request("example.com.", RecordType::A, 150);
    req.qry.flags.no_cache = true;
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);

    // Already tried without a stale callback.
    let mut req = request("example.com.", RecordType::A, 150);
    req.qry.flags.cache_tried = true;
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);

    // Meta-types and NSEC queries.
    let mut req = request("example.com.", RecordType::ANY, 150);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
    let mut req = request("example.com.", RecordType::NSEC, 150);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);

    // Non-IN class.
    let mut req = request("example.com.", RecordType::A, 150);
    req.qry.sclass = RecordClass::CH;
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);

    // A finished query is left alone.
    let mut req = request("example.com.", RecordType::A, 150);
    req.state = State::Done;
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
}

#[test]
fn second_peek_suppressed_without_stale_cb() {
    let cache = cache();
    let mut req = request("missing.example.com.", RecordType::A, 100);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
    assert!(req.qry.flags.cache_tried);

    // The second peek on the same sub-query is a no-op...
    let misses = cache.stats().misses();
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
    assert_eq!(cache.stats().misses(), misses);

    // ...unless a stale callback makes retrying worthwhile.
    req.qry.stale_cb = Some(Box::new(|_, _, _| -1));
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
    assert_eq!(cache.stats().misses(), misses + 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn clear_forgets_everything() {
    let mut cache = cache();
    cache
        .insert_rr(
            &a_set("example.com.", 300, 1),
            None,
            Rank::SECURE | Rank::AUTH,
            100,
        )
        .unwrap();
    assert_eq!(cache.count().unwrap(), 2);

    cache.clear().unwrap();
    assert_eq!(cache.count().unwrap(), 1); // version entry only

    let mut req = request("example.com.", RecordType::A, 150);
    let mut pkt = Message::new(1);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Produce);
}

#[test]
fn question_is_preserved_in_synthesized_answers() {
    let cache = cache();
    populate_zone(&cache, 100);

    let mut req = request("b.example.com.", RecordType::TXT, 150);
    let mut pkt = Message::new(0xABCD);
    assert_eq!(cache.peek(&mut req, &mut pkt), State::Done);
    let q: &Question = pkt.question().unwrap();
    assert_eq!(q.qname, name("b.example.com."));
    assert_eq!(q.qtype.to_u16(), RecordType::TXT.to_u16());
    assert_eq!(pkt.id(), 0xABCD);
}
