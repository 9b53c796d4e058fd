//! DNS record data (RDATA) types.
//!
//! Only the types the resolver stores, serves, or inspects get a typed
//! representation; everything else is preserved as opaque bytes.

pub mod address;
pub mod authority;
pub mod dnssec;
pub mod name;
pub mod text;
pub mod unknown;

pub use address::{A, AAAA};
pub use authority::SOA;
pub use dnssec::{NSEC, RRSIG};
pub use name::{CNAME, DNAME, MX, NS, PTR};
pub use text::TXT;
pub use unknown::Unknown;

use crate::error::Result;
use crate::rtype::{RecordType, Type};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record data.
///
/// Unknown record types are preserved as opaque byte sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RData {
    /// IPv4 address (A record)
    A(A),

    /// IPv6 address (AAAA record)
    AAAA(AAAA),

    /// Name server (NS record)
    NS(NS),

    /// Canonical name (CNAME record)
    CNAME(CNAME),

    /// Pointer (PTR record)
    PTR(PTR),

    /// Delegation name (DNAME record)
    DNAME(DNAME),

    /// Mail exchange (MX record)
    MX(MX),

    /// Start of authority (SOA record)
    SOA(SOA),

    /// Text (TXT record)
    TXT(TXT),

    /// DNSSEC signature (RRSIG record)
    RRSIG(RRSIG),

    /// Next secure (NSEC record)
    NSEC(NSEC),

    /// Anything else, preserved as raw bytes
    Unknown(Unknown),
}

impl RData {
    /// Parses RDATA out of a message buffer.
    ///
    /// The whole message is needed because several types embed names that
    /// may use compression pointers.
    pub fn parse(rtype: Type, message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let known = match rtype.as_known() {
            Some(t) => t,
            None => return Ok(Self::Unknown(Unknown::parse(message, offset, rdlength)?)),
        };
        Ok(match known {
            RecordType::A => Self::A(A::parse(message, offset, rdlength)?),
            RecordType::AAAA => Self::AAAA(AAAA::parse(message, offset, rdlength)?),
            RecordType::NS => Self::NS(NS::parse(message, offset)?),
            RecordType::CNAME => Self::CNAME(CNAME::parse(message, offset)?),
            RecordType::PTR => Self::PTR(PTR::parse(message, offset)?),
            RecordType::DNAME => Self::DNAME(DNAME::parse(message, offset)?),
            RecordType::MX => Self::MX(MX::parse(message, offset)?),
            RecordType::SOA => Self::SOA(SOA::parse(message, offset)?),
            RecordType::TXT => Self::TXT(TXT::parse(message, offset, rdlength)?),
            RecordType::RRSIG => Self::RRSIG(RRSIG::parse(message, offset, rdlength)?),
            RecordType::NSEC => Self::NSEC(NSEC::parse(message, offset, rdlength)?),
            _ => Self::Unknown(Unknown::parse(message, offset, rdlength)?),
        })
    }

    /// Writes the RDATA in uncompressed wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::A(v) => v.write_to(buf),
            Self::AAAA(v) => v.write_to(buf),
            Self::NS(v) => v.write_to(buf),
            Self::CNAME(v) => v.write_to(buf),
            Self::PTR(v) => v.write_to(buf),
            Self::DNAME(v) => v.write_to(buf),
            Self::MX(v) => v.write_to(buf),
            Self::SOA(v) => v.write_to(buf),
            Self::TXT(v) => v.write_to(buf),
            Self::RRSIG(v) => v.write_to(buf),
            Self::NSEC(v) => v.write_to(buf),
            Self::Unknown(v) => v.write_to(buf),
        }
    }

    /// Returns the uncompressed wire length.
    pub fn wire_len(&self) -> usize {
        match self {
            Self::A(_) => 4,
            Self::AAAA(_) => 16,
            Self::NS(v) => v.target().wire_len(),
            Self::CNAME(v) => v.target().wire_len(),
            Self::PTR(v) => v.target().wire_len(),
            Self::DNAME(v) => v.target().wire_len(),
            Self::MX(v) => v.wire_len(),
            Self::SOA(v) => v.wire_len(),
            Self::TXT(v) => v.wire_len(),
            Self::RRSIG(v) => v.wire_len(),
            Self::NSEC(v) => v.wire_len(),
            Self::Unknown(v) => v.wire_len(),
        }
    }

    /// Returns the RRSIG payload, if this is an RRSIG record.
    #[inline]
    pub fn as_rrsig(&self) -> Option<&RRSIG> {
        match self {
            Self::RRSIG(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the NSEC payload, if this is an NSEC record.
    #[inline]
    pub fn as_nsec(&self) -> Option<&NSEC> {
        match self {
            Self::NSEC(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the SOA payload, if this is an SOA record.
    #[inline]
    pub fn as_soa(&self) -> Option<&SOA> {
        match self {
            Self::SOA(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(v) => fmt::Display::fmt(v, f),
            Self::AAAA(v) => fmt::Display::fmt(v, f),
            Self::NS(v) => fmt::Display::fmt(v, f),
            Self::CNAME(v) => fmt::Display::fmt(v, f),
            Self::PTR(v) => fmt::Display::fmt(v, f),
            Self::DNAME(v) => fmt::Display::fmt(v, f),
            Self::MX(v) => fmt::Display::fmt(v, f),
            Self::SOA(v) => fmt::Display::fmt(v, f),
            Self::TXT(v) => fmt::Display::fmt(v, f),
            Self::RRSIG(v) => fmt::Display::fmt(v, f),
            Self::NSEC(v) => fmt::Display::fmt(v, f),
            Self::Unknown(v) => fmt::Display::fmt(v, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_rdata_wire_roundtrip() {
        let rdata = RData::A(A::new(Ipv4Addr::new(192, 0, 2, 1)));
        let mut buf = BytesMut::new();
        rdata.write_to(&mut buf);
        assert_eq!(buf.len(), rdata.wire_len());

        let back = RData::parse(RecordType::A.into(), &buf, 0, buf.len() as u16).unwrap();
        assert_eq!(back, rdata);
    }

    #[test]
    fn test_unknown_type_preserved() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let rdata = RData::parse(Type::Unknown(65280), &payload, 0, 4).unwrap();
        assert!(matches!(rdata, RData::Unknown(_)));
        let mut buf = BytesMut::new();
        rdata.write_to(&mut buf);
        assert_eq!(&buf[..], &payload);
    }
}
