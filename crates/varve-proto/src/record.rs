//! DNS resource records and RR-sets.

use crate::class::{Class, RecordClass};
use crate::error::Result;
use crate::name::Name;
use crate::rdata::RData;
use crate::rtype::{RecordType, Type};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// The owner name.
    name: Name,
    /// The record type.
    rtype: Type,
    /// The record class.
    rclass: Class,
    /// Time to live in seconds.
    ttl: u32,
    /// The record data.
    rdata: RData,
}

impl ResourceRecord {
    /// Creates a new resource record.
    pub fn new(name: Name, rtype: Type, rclass: Class, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Creates a new resource record with known type and class.
    pub fn new_known(
        name: Name,
        rtype: RecordType,
        rclass: RecordClass,
        ttl: u32,
        rdata: RData,
    ) -> Self {
        Self::new(name, rtype.into(), rclass.into(), ttl, rdata)
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    #[inline]
    pub fn rtype(&self) -> Type {
        self.rtype
    }

    /// Returns the record type if known.
    #[inline]
    pub fn record_type(&self) -> Option<RecordType> {
        self.rtype.as_known()
    }

    /// Returns the record class.
    #[inline]
    pub fn rclass(&self) -> Class {
        self.rclass
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Sets the TTL.
    #[inline]
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    /// Returns a copy with the given TTL.
    #[must_use]
    pub fn with_ttl(&self, ttl: u32) -> Self {
        let mut copy = self.clone();
        copy.ttl = ttl;
        copy
    }

    /// Returns the record data.
    #[inline]
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Parses one record out of a message buffer.
    ///
    /// Returns the record and the number of bytes consumed at `offset`.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, name_len) = Name::parse(message, offset)?;
        let mut pos = offset + name_len;

        let mut reader = crate::wire::WireReader::new(message);
        reader.set_position(pos);
        let rtype = Type::from_u16(reader.read_u16()?);
        let rclass = Class::from_u16(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()?;
        pos = reader.position();

        let rdata = RData::parse(rtype, message, pos, rdlength)?;
        pos += usize::from(rdlength);
        Ok((
            Self {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            pos - offset,
        ))
    }

    /// Writes the record in uncompressed wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.extend_from_slice(&self.rtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.rclass.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());
        buf.extend_from_slice(&(self.rdata.wire_len() as u16).to_be_bytes());
        self.rdata.write_to(buf);
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

/// An RR-set: all records sharing owner, class, and type.
///
/// The TTL is a single value for the whole set; when a set is assembled
/// from records with differing TTLs the minimum wins (RFC 2181 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrSet {
    owner: Name,
    rtype: RecordType,
    rclass: RecordClass,
    ttl: u32,
    rdatas: Vec<RData>,
}

impl RrSet {
    /// Creates an empty RR-set.
    pub fn new(owner: Name, rtype: RecordType, rclass: RecordClass, ttl: u32) -> Self {
        Self {
            owner,
            rtype,
            rclass,
            ttl,
            rdatas: Vec::new(),
        }
    }

    /// Creates an RR-set with one record.
    pub fn with_rdata(
        owner: Name,
        rtype: RecordType,
        rclass: RecordClass,
        ttl: u32,
        rdata: RData,
    ) -> Self {
        Self {
            owner,
            rtype,
            rclass,
            ttl,
            rdatas: vec![rdata],
        }
    }

    /// Returns the owner name.
    #[inline]
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// Returns the record type.
    #[inline]
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Returns the record class.
    #[inline]
    pub fn rclass(&self) -> RecordClass {
        self.rclass
    }

    /// Returns the set TTL.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Sets the TTL for the whole set.
    #[inline]
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    /// Returns the record data values.
    #[inline]
    pub fn rdatas(&self) -> &[RData] {
        &self.rdatas
    }

    /// Returns true if the set holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rdatas.is_empty()
    }

    /// Returns the number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.rdatas.len()
    }

    /// Adds a record, keeping the set TTL at the minimum seen.
    pub fn push(&mut self, ttl: u32, rdata: RData) {
        if self.rdatas.is_empty() {
            self.ttl = ttl;
        } else {
            self.ttl = self.ttl.min(ttl);
        }
        self.rdatas.push(rdata);
    }

    /// Replaces the owner name, e.g. when expanding a wildcard.
    #[inline]
    pub fn set_owner(&mut self, owner: Name) {
        self.owner = owner;
    }

    /// Expands the set into individual resource records.
    pub fn to_records(&self) -> Vec<ResourceRecord> {
        self.rdatas
            .iter()
            .map(|rd| {
                ResourceRecord::new_known(
                    self.owner.clone(),
                    self.rtype,
                    self.rclass,
                    self.ttl,
                    rd.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdata::A;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn a_rdata(last: u8) -> RData {
        RData::A(A::new(Ipv4Addr::new(192, 0, 2, last)))
    }

    #[test]
    fn test_record_wire_roundtrip() {
        let rr = ResourceRecord::new_known(
            Name::from_str("example.com.").unwrap(),
            RecordType::A,
            RecordClass::IN,
            300,
            a_rdata(1),
        );
        let mut buf = BytesMut::new();
        rr.write_to(&mut buf);
        let (back, used) = ResourceRecord::parse(&buf, 0).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(back, rr);
    }

    #[test]
    fn test_rrset_min_ttl() {
        let mut set = RrSet::new(
            Name::from_str("example.com.").unwrap(),
            RecordType::A,
            RecordClass::IN,
            0,
        );
        set.push(300, a_rdata(1));
        set.push(120, a_rdata(2));
        set.push(600, a_rdata(3));
        assert_eq!(set.ttl(), 120);
        assert_eq!(set.len(), 3);

        let records = set.to_records();
        assert!(records.iter().all(|r| r.ttl() == 120));
    }
}
