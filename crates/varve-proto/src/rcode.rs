//! DNS response codes.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS response code (the 4-bit header RCODE).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum ResponseCode {
    /// No error condition.
    NoError = 0,

    /// The server was unable to interpret the query.
    FormErr = 1,

    /// Internal server failure.
    ServFail = 2,

    /// The queried name does not exist.
    NXDomain = 3,

    /// The requested operation is not implemented.
    NotImp = 4,

    /// The server refuses to answer.
    Refused = 5,

    /// A name exists when it should not - RFC 2136
    YXDomain = 6,

    /// An RR set exists when it should not - RFC 2136
    YXRRSet = 7,

    /// An RR set that should exist does not - RFC 2136
    NXRRSet = 8,

    /// The server is not authoritative for the zone - RFC 2136
    NotAuth = 9,

    /// A name is not within the zone - RFC 2136
    NotZone = 10,
}

impl ResponseCode {
    /// Returns the numeric value.
    #[inline]
    pub fn to_u8(self) -> u8 {
        self.into()
    }

    /// Creates from the low 4 bits of the header flags word.
    ///
    /// Unknown values map to `ServFail` rather than failing the parse.
    #[inline]
    pub fn from_u8_lossy(value: u8) -> Self {
        Self::try_from(value & 0x0F).unwrap_or(Self::ServFail)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoError => "NOERROR",
            Self::FormErr => "FORMERR",
            Self::ServFail => "SERVFAIL",
            Self::NXDomain => "NXDOMAIN",
            Self::NotImp => "NOTIMP",
            Self::Refused => "REFUSED",
            Self::YXDomain => "YXDOMAIN",
            Self::YXRRSet => "YXRRSET",
            Self::NXRRSet => "NXRRSET",
            Self::NotAuth => "NOTAUTH",
            Self::NotZone => "NOTZONE",
        };
        f.write_str(s)
    }
}
