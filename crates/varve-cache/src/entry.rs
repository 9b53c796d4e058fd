//! Entry codec: the value layout behind every cache key.
//!
//! An entry value is one or more *sub-entries*. Keys other than NS hold
//! exactly one; the NS key may chain several, because CNAME and DNAME are
//! tunneled under the NS type (and so found by the closest-NS scan in one
//! pass per label). Each sub-entry is:
//!
//! ```text
//! time       u32 LE   insertion wall-clock, seconds
//! ttl        u32 LE   clamped at stash time
//! rank       u8
//! flags      u8
//! data[]              RR-set payload, or a length-prefixed packet
//! ```
//!
//! For RR sub-entries `data` is the dematerialized RR-set followed by the
//! dematerialized RRSIG set (possibly empty); both are self-delimiting, so
//! a sub-entry's length can always be recomputed from its bytes. Packet
//! sub-entries carry `u16 LE` length plus the raw wire. Which slots a
//! bundle holds is recorded in the `has_*` flag bits, kept identical in
//! every chained header.

use crate::rank::Rank;
use crate::{CacheError, Result};
use bitflags::bitflags;
use bytes::BytesMut;
use varve_proto::{Name, RData, RecordClass, RecordType, RrSet, Type};

/// Fixed size of a sub-entry header.
pub const ENTRY_HEADER_LEN: usize = 10;

/// Remaining-TTL threshold below which an answer is flagged as expiring.
pub const EXPIRING_TTL: u32 = 5;

bitflags! {
    /// Sub-entry header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        /// The payload is a whole wire packet.
        const IS_PACKET = 0x01;
        /// The proof chain used NSEC3 opt-out (packet entries only).
        const HAS_OPTOUT = 0x02;
        /// The NS bundle holds an NS sub-entry.
        const HAS_NS = 0x04;
        /// The NS bundle holds a CNAME sub-entry.
        const HAS_CNAME = 0x08;
        /// The NS bundle holds a DNAME sub-entry.
        const HAS_DNAME = 0x10;
        /// The NS bundle holds NSEC chain parameters (reserved).
        const HAS_NSEC_PARAMS = 0x20;
    }
}

impl EntryFlags {
    /// Returns the bundle-slot flag for a tunneled type.
    pub fn slot(rtype: RecordType) -> EntryFlags {
        match rtype {
            RecordType::CNAME => EntryFlags::HAS_CNAME,
            RecordType::DNAME => EntryFlags::HAS_DNAME,
            _ => EntryFlags::HAS_NS,
        }
    }
}

/// A parsed sub-entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Insertion wall-clock, seconds.
    pub time: u32,
    /// Clamped TTL at insertion.
    pub ttl: u32,
    /// Validation rank.
    pub rank: Rank,
    /// Entry flags.
    pub flags: EntryFlags,
}

impl EntryHeader {
    /// Parses a header off the front of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_HEADER_LEN {
            return Err(CacheError::Corrupt);
        }
        Ok(Self {
            time: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ttl: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            rank: Rank::from_byte(data[8]),
            flags: EntryFlags::from_bits_truncate(data[9]),
        })
    }

    /// Appends the header to a value buffer.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.ttl.to_le_bytes());
        out.push(self.rank.to_byte());
        out.push(self.flags.bits());
    }

    /// Returns true if the payload is a whole packet.
    #[inline]
    pub fn is_packet(&self) -> bool {
        self.flags.contains(EntryFlags::IS_PACKET)
    }
}

/// Overwrites the TTL field of the sub-entry starting at `at`.
///
/// The stash path assembles entries with a zero TTL and commits the real
/// one last, so a torn write is read back as already expired.
pub fn patch_ttl(value: &mut [u8], at: usize, ttl: u32) {
    value[at + 4..at + 8].copy_from_slice(&ttl.to_le_bytes());
}

/// Validates a sub-entry's structure and invariants, returning its header.
///
/// Shorter-than-declared payloads, a BOGUS rank outside a packet entry,
/// and opt-out outside a packet entry are all rejected as corrupt.
pub fn entry_consistent(data: &[u8]) -> Result<EntryHeader> {
    let eh = EntryHeader::parse(data)?;
    if eh.is_packet() {
        if data.len() < ENTRY_HEADER_LEN + 2 {
            return Err(CacheError::Corrupt);
        }
        let pkt_len = usize::from(u16::from_le_bytes([
            data[ENTRY_HEADER_LEN],
            data[ENTRY_HEADER_LEN + 1],
        ]));
        if data.len() < ENTRY_HEADER_LEN + 2 + pkt_len {
            return Err(CacheError::Corrupt);
        }
    } else {
        if eh.rank.is_bogus() {
            return Err(CacheError::Corrupt);
        }
        if eh.flags.contains(EntryFlags::HAS_OPTOUT) {
            return Err(CacheError::Corrupt);
        }
    }
    Ok(eh)
}

/// Returns the wire of a packet sub-entry.
pub fn packet_payload(sub: &[u8]) -> Result<&[u8]> {
    let eh = entry_consistent(sub)?;
    if !eh.is_packet() {
        return Err(CacheError::Corrupt);
    }
    let pkt_len = usize::from(u16::from_le_bytes([
        sub[ENTRY_HEADER_LEN],
        sub[ENTRY_HEADER_LEN + 1],
    ]));
    Ok(&sub[ENTRY_HEADER_LEN + 2..ENTRY_HEADER_LEN + 2 + pkt_len])
}

/// Measures one dematerialized RR-set starting at `at`, without copying.
fn rdataset_len(data: &[u8], at: usize) -> Result<usize> {
    let bound = data.len();
    if at + 2 > bound {
        return Err(CacheError::Corrupt);
    }
    let count = usize::from(u16::from_le_bytes([data[at], data[at + 1]]));
    let mut pos = at + 2;
    for _ in 0..count {
        if pos + 2 > bound {
            return Err(CacheError::Corrupt);
        }
        let len = usize::from(u16::from_le_bytes([data[pos], data[pos + 1]]));
        pos += 2 + len;
        if pos > bound {
            return Err(CacheError::Corrupt);
        }
    }
    Ok(pos - at)
}

/// Returns the total length of the sub-entry at the front of `data`.
pub fn sub_entry_len(data: &[u8]) -> Result<usize> {
    let eh = entry_consistent(data)?;
    if eh.is_packet() {
        let pkt_len = usize::from(u16::from_le_bytes([
            data[ENTRY_HEADER_LEN],
            data[ENTRY_HEADER_LEN + 1],
        ]));
        return Ok(ENTRY_HEADER_LEN + 2 + pkt_len);
    }
    let rr = rdataset_len(data, ENTRY_HEADER_LEN)?;
    let sigs = rdataset_len(data, ENTRY_HEADER_LEN + rr)?;
    Ok(ENTRY_HEADER_LEN + rr + sigs)
}

/// The slot order inside an NS bundle.
pub const BUNDLE_ORDER: [RecordType; 3] = [RecordType::NS, RecordType::CNAME, RecordType::DNAME];

/// Advances inside an entry value to the sub-entry for `want`.
///
/// Keys other than NS hold a single sub-entry, returned whole. NS keys
/// chain the tunneled types in [`BUNDLE_ORDER`]; absent slots read as a
/// miss, structural problems as corruption.
pub fn seek(value: &[u8], key_type: RecordType, want: RecordType) -> Result<&[u8]> {
    if key_type != RecordType::NS {
        entry_consistent(value)?;
        return Ok(value);
    }
    let first = entry_consistent(value)?;
    let mut pos = 0;
    for slot in BUNDLE_ORDER {
        if !first.flags.contains(EntryFlags::slot(slot)) {
            if slot == want {
                return Err(CacheError::NotFound);
            }
            continue;
        }
        let len = sub_entry_len(&value[pos..])?;
        if slot == want {
            return Ok(&value[pos..pos + len]);
        }
        pos += len;
    }
    Err(CacheError::NotFound)
}

/// Splits an NS bundle into its (type, sub-entry) pieces.
pub fn bundle_parts(value: &[u8]) -> Result<Vec<(RecordType, &[u8])>> {
    let first = entry_consistent(value)?;
    let mut parts = Vec::new();
    let mut pos = 0;
    for slot in BUNDLE_ORDER {
        if !first.flags.contains(EntryFlags::slot(slot)) {
            continue;
        }
        let len = sub_entry_len(&value[pos..])?;
        parts.push((slot, &value[pos..pos + len]));
        pos += len;
    }
    Ok(parts)
}

/// Rewrites the slot flags in every chained header of a bundle value.
pub fn patch_bundle_flags(value: &mut [u8], flags: EntryFlags) -> Result<()> {
    let slot_mask = EntryFlags::HAS_NS
        | EntryFlags::HAS_CNAME
        | EntryFlags::HAS_DNAME
        | EntryFlags::HAS_NSEC_PARAMS;
    let mut pos = 0;
    while pos < value.len() {
        let len = sub_entry_len(&value[pos..])?;
        let keep = EntryFlags::from_bits_truncate(value[pos + 9])
            & (EntryFlags::IS_PACKET | EntryFlags::HAS_OPTOUT);
        value[pos + 9] = ((flags & slot_mask) | keep).bits();
        pos += len;
    }
    Ok(())
}

/// Returns the dematerialized size of an optional RR-set.
pub fn dematerialized_size(set: Option<&RrSet>) -> usize {
    match set {
        None => 2,
        Some(set) => {
            2 + set
                .rdatas()
                .iter()
                .map(|rd| 2 + rd.wire_len())
                .sum::<usize>()
        }
    }
}

/// Appends the dematerialized form of an optional RR-set.
///
/// `None` writes an empty set, so payloads keep their fixed shape.
pub fn dematerialize(set: Option<&RrSet>, out: &mut Vec<u8>) {
    let Some(set) = set else {
        out.extend_from_slice(&0u16.to_le_bytes());
        return;
    };
    out.extend_from_slice(&(set.len() as u16).to_le_bytes());
    let mut scratch = BytesMut::new();
    for rd in set.rdatas() {
        scratch.clear();
        rd.write_to(&mut scratch);
        out.extend_from_slice(&(scratch.len() as u16).to_le_bytes());
        out.extend_from_slice(&scratch);
    }
}

/// Reads one dematerialized RR-set back into records.
fn materialize_rdataset(
    data: &[u8],
    at: usize,
    owner: &Name,
    rtype: RecordType,
    ttl: u32,
) -> Result<(RrSet, usize)> {
    let total = rdataset_len(data, at)?;
    let count = usize::from(u16::from_le_bytes([data[at], data[at + 1]]));
    let mut set = RrSet::new(owner.clone(), rtype, RecordClass::IN, ttl);
    let mut pos = at + 2;
    for _ in 0..count {
        let len = usize::from(u16::from_le_bytes([data[pos], data[pos + 1]]));
        pos += 2;
        let rdata = RData::parse(Type::Known(rtype), data, pos, len as u16)
            .map_err(|_| CacheError::Corrupt)?;
        set.push(ttl, rdata);
        pos += len;
    }
    set.set_ttl(ttl);
    Ok((set, total))
}

/// Materializes a sub-entry into an RR-set plus its signatures, applying
/// the already-computed remaining TTL.
pub fn materialize(
    sub: &[u8],
    owner: &Name,
    rtype: RecordType,
    new_ttl: u32,
) -> Result<(RrSet, Option<RrSet>)> {
    let eh = entry_consistent(sub)?;
    if eh.is_packet() {
        return Err(CacheError::Corrupt);
    }
    let (set, used) = materialize_rdataset(sub, ENTRY_HEADER_LEN, owner, rtype, new_ttl)?;
    let (sigs, _) = materialize_rdataset(
        sub,
        ENTRY_HEADER_LEN + used,
        owner,
        RecordType::RRSIG,
        new_ttl,
    )?;
    let sigs = if sigs.is_empty() { None } else { Some(sigs) };
    Ok((set, sigs))
}

/// Builds one RR sub-entry: header with a zeroed TTL, then the payload.
///
/// Returns the offset of the sub-entry within `out`, for the final
/// [`patch_ttl`] once the whole value stands.
pub fn write_sub_entry(
    out: &mut Vec<u8>,
    time: u32,
    rank: Rank,
    flags: EntryFlags,
    set: &RrSet,
    sigs: Option<&RrSet>,
) -> usize {
    let at = out.len();
    out.reserve(ENTRY_HEADER_LEN + dematerialized_size(Some(set)) + dematerialized_size(sigs));
    EntryHeader {
        time,
        ttl: 0,
        rank,
        flags,
    }
    .write_to(out);
    dematerialize(Some(set), out);
    dematerialize(sigs, out);
    at
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use varve_proto::rdata::{A, CNAME, NS};

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn a_set(owner: &str, ttl: u32) -> RrSet {
        RrSet::with_rdata(
            name(owner),
            RecordType::A,
            RecordClass::IN,
            ttl,
            RData::A(A::new(Ipv4Addr::new(192, 0, 2, 1))),
        )
    }

    #[test]
    fn test_header_roundtrip() {
        let eh = EntryHeader {
            time: 1000,
            ttl: 300,
            rank: Rank::SECURE | Rank::AUTH,
            flags: EntryFlags::HAS_NS,
        };
        let mut buf = Vec::new();
        eh.write_to(&mut buf);
        assert_eq!(buf.len(), ENTRY_HEADER_LEN);
        assert_eq!(EntryHeader::parse(&buf).unwrap(), eh);
    }

    #[test]
    fn test_truncated_rejected() {
        assert!(EntryHeader::parse(&[0; 9]).is_err());
        // A packet entry claiming more bytes than present.
        let mut buf = Vec::new();
        EntryHeader {
            time: 0,
            ttl: 0,
            rank: Rank::INITIAL,
            flags: EntryFlags::IS_PACKET,
        }
        .write_to(&mut buf);
        buf.extend_from_slice(&100u16.to_le_bytes());
        buf.extend_from_slice(&[0; 10]);
        assert!(entry_consistent(&buf).is_err());
    }

    #[test]
    fn test_bogus_requires_packet() {
        let mut buf = Vec::new();
        EntryHeader {
            time: 0,
            ttl: 0,
            rank: Rank::BOGUS,
            flags: EntryFlags::empty(),
        }
        .write_to(&mut buf);
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        assert!(entry_consistent(&buf).is_err());

        let mut pkt = Vec::new();
        EntryHeader {
            time: 0,
            ttl: 0,
            rank: Rank::BOGUS,
            flags: EntryFlags::IS_PACKET,
        }
        .write_to(&mut pkt);
        pkt.extend_from_slice(&2u16.to_le_bytes());
        pkt.extend_from_slice(&[0xAB, 0xCD]);
        assert!(entry_consistent(&pkt).is_ok());
        assert_eq!(packet_payload(&pkt).unwrap(), &[0xAB, 0xCD]);
    }

    #[test]
    fn test_materialize_roundtrip() {
        let set = a_set("example.com.", 300);
        let mut value = Vec::new();
        let at = write_sub_entry(
            &mut value,
            100,
            Rank::SECURE | Rank::AUTH,
            EntryFlags::empty(),
            &set,
            None,
        );
        patch_ttl(&mut value, at, 300);

        let eh = entry_consistent(&value).unwrap();
        assert_eq!(eh.ttl, 300);
        assert_eq!(eh.time, 100);

        let (back, sigs) = materialize(&value, set.owner(), RecordType::A, 250).unwrap();
        assert!(sigs.is_none());
        assert_eq!(back.ttl(), 250);
        assert_eq!(back.rdatas(), set.rdatas());
        assert_eq!(sub_entry_len(&value).unwrap(), value.len());
    }

    #[test]
    fn test_bundle_seek() {
        let owner = name("x.example.com.");
        let ns_set = RrSet::with_rdata(
            owner.clone(),
            RecordType::NS,
            RecordClass::IN,
            600,
            RData::NS(NS::new(name("ns1.example.com."))),
        );
        let cname_set = RrSet::with_rdata(
            owner.clone(),
            RecordType::CNAME,
            RecordClass::IN,
            300,
            RData::CNAME(CNAME::new(name("target.example.org."))),
        );

        let flags = EntryFlags::HAS_NS | EntryFlags::HAS_CNAME;
        let mut value = Vec::new();
        let at1 = write_sub_entry(&mut value, 50, Rank::INITIAL | Rank::AUTH, flags, &ns_set, None);
        let at2 = write_sub_entry(
            &mut value,
            50,
            Rank::SECURE | Rank::AUTH,
            flags,
            &cname_set,
            None,
        );
        patch_ttl(&mut value, at1, 600);
        patch_ttl(&mut value, at2, 300);

        let ns_sub = seek(&value, RecordType::NS, RecordType::NS).unwrap();
        let (back, _) = materialize(ns_sub, &owner, RecordType::NS, 600).unwrap();
        assert_eq!(back.rdatas(), ns_set.rdatas());

        let cname_sub = seek(&value, RecordType::NS, RecordType::CNAME).unwrap();
        let eh = entry_consistent(cname_sub).unwrap();
        assert_eq!(eh.ttl, 300);
        let (back, _) = materialize(cname_sub, &owner, RecordType::CNAME, 300).unwrap();
        assert_eq!(back.rdatas(), cname_set.rdatas());

        assert!(matches!(
            seek(&value, RecordType::NS, RecordType::DNAME),
            Err(CacheError::NotFound)
        ));

        let parts = bundle_parts(&value).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, RecordType::NS);
        assert_eq!(parts[1].0, RecordType::CNAME);
    }

    #[test]
    fn test_ttl_patched_last() {
        let set = a_set("example.com.", 300);
        let mut value = Vec::new();
        let at = write_sub_entry(
            &mut value,
            100,
            Rank::SECURE | Rank::AUTH,
            EntryFlags::empty(),
            &set,
            None,
        );
        // Before the patch the entry reads as expired.
        assert_eq!(entry_consistent(&value).unwrap().ttl, 0);
        patch_ttl(&mut value, at, 300);
        assert_eq!(entry_consistent(&value).unwrap().ttl, 300);
    }
}
