//! DNS record types.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record type.
///
/// Covers the types the resolver stores, serves, or must recognize for
/// special handling (metatypes, DNSSEC types). See RFC 1035, RFC 3596,
/// RFC 4034, RFC 6672, RFC 9460.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u16)]
pub enum RecordType {
    /// IPv4 address - RFC 1035
    A = 1,

    /// Authoritative name server - RFC 1035
    NS = 2,

    /// Canonical name (alias) - RFC 1035
    CNAME = 5,

    /// Start of authority - RFC 1035
    SOA = 6,

    /// Domain name pointer - RFC 1035
    PTR = 12,

    /// Mail exchange - RFC 1035
    MX = 15,

    /// Text strings - RFC 1035
    TXT = 16,

    /// IPv6 address - RFC 3596
    AAAA = 28,

    /// Server selection - RFC 2782
    SRV = 33,

    /// Delegation name - RFC 6672
    DNAME = 39,

    /// EDNS(0) option pseudo-RR - RFC 6891
    OPT = 41,

    /// Delegation signer - RFC 4034
    DS = 43,

    /// DNSSEC signature - RFC 4034
    RRSIG = 46,

    /// Next secure - RFC 4034
    NSEC = 47,

    /// DNS public key - RFC 4034
    DNSKEY = 48,

    /// Next secure v3 - RFC 5155
    NSEC3 = 50,

    /// NSEC3 parameters - RFC 5155
    NSEC3PARAM = 51,

    /// Service binding - RFC 9460
    SVCB = 64,

    /// HTTPS service binding - RFC 9460
    HTTPS = 65,

    /// Transaction key - RFC 2930
    TKEY = 249,

    /// Transaction signature - RFC 8945
    TSIG = 250,

    /// Incremental zone transfer - RFC 1995
    IXFR = 251,

    /// Full zone transfer - RFC 1035
    AXFR = 252,

    /// Any record type (query meta-type) - RFC 1035
    ANY = 255,
}

impl RecordType {
    /// Returns the numeric value.
    #[inline]
    pub fn to_u16(self) -> u16 {
        self.into()
    }

    /// Returns the type name as used in presentation format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::NS => "NS",
            Self::CNAME => "CNAME",
            Self::SOA => "SOA",
            Self::PTR => "PTR",
            Self::MX => "MX",
            Self::TXT => "TXT",
            Self::AAAA => "AAAA",
            Self::SRV => "SRV",
            Self::DNAME => "DNAME",
            Self::OPT => "OPT",
            Self::DS => "DS",
            Self::RRSIG => "RRSIG",
            Self::NSEC => "NSEC",
            Self::DNSKEY => "DNSKEY",
            Self::NSEC3 => "NSEC3",
            Self::NSEC3PARAM => "NSEC3PARAM",
            Self::SVCB => "SVCB",
            Self::HTTPS => "HTTPS",
            Self::TKEY => "TKEY",
            Self::TSIG => "TSIG",
            Self::IXFR => "IXFR",
            Self::AXFR => "AXFR",
            Self::ANY => "ANY",
        }
    }

    /// Returns true for meta-types that only appear in queries or as
    /// transport machinery, never as stored zone data (RFC 6895).
    #[inline]
    pub fn is_metatype(self) -> bool {
        matches!(
            self,
            Self::OPT | Self::TKEY | Self::TSIG | Self::IXFR | Self::AXFR | Self::ANY
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A record type that may be outside the set of known types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A known, named record type.
    Known(RecordType),
    /// A numeric type we carry opaquely.
    Unknown(u16),
}

impl Type {
    /// Returns the numeric value.
    #[inline]
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Known(t) => t.to_u16(),
            Self::Unknown(v) => v,
        }
    }

    /// Creates from a numeric value.
    #[inline]
    pub fn from_u16(value: u16) -> Self {
        match RecordType::try_from(value) {
            Ok(t) => Self::Known(t),
            Err(_) => Self::Unknown(value),
        }
    }

    /// Returns the known type, if any.
    #[inline]
    pub fn as_known(self) -> Option<RecordType> {
        match self {
            Self::Known(t) => Some(t),
            Self::Unknown(_) => None,
        }
    }
}

impl From<RecordType> for Type {
    #[inline]
    fn from(t: RecordType) -> Self {
        Self::Known(t)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(t) => fmt::Display::fmt(t, f),
            Self::Unknown(v) => write!(f, "TYPE{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        assert_eq!(RecordType::try_from(1u16), Ok(RecordType::A));
        assert_eq!(RecordType::NSEC.to_u16(), 47);
        assert_eq!(Type::from_u16(65534), Type::Unknown(65534));
        assert_eq!(Type::from_u16(2), Type::Known(RecordType::NS));
    }

    #[test]
    fn test_metatypes() {
        assert!(RecordType::ANY.is_metatype());
        assert!(RecordType::OPT.is_metatype());
        assert!(RecordType::AXFR.is_metatype());
        assert!(!RecordType::A.is_metatype());
        assert!(!RecordType::RRSIG.is_metatype());
    }
}
