//! DNS record classes.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record class.
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
#[repr(u16)]
pub enum RecordClass {
    /// Internet - RFC 1035
    IN = 1,

    /// Chaos - RFC 1035
    CH = 3,

    /// Hesiod - RFC 1035
    HS = 4,

    /// None (update prerequisite) - RFC 2136
    NONE = 254,

    /// Any class (query only) - RFC 1035
    ANY = 255,
}

impl RecordClass {
    /// Returns the numeric value.
    #[inline]
    pub fn to_u16(self) -> u16 {
        self.into()
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IN => "IN",
            Self::CH => "CH",
            Self::HS => "HS",
            Self::NONE => "NONE",
            Self::ANY => "ANY",
        };
        f.write_str(s)
    }
}

/// A record class that may be outside the set of known classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class {
    /// A known, named class.
    Known(RecordClass),
    /// A numeric class we carry opaquely.
    Unknown(u16),
}

impl Class {
    /// Returns the numeric value.
    #[inline]
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Known(c) => c.to_u16(),
            Self::Unknown(v) => v,
        }
    }

    /// Creates from a numeric value.
    #[inline]
    pub fn from_u16(value: u16) -> Self {
        match RecordClass::try_from(value) {
            Ok(c) => Self::Known(c),
            Err(_) => Self::Unknown(value),
        }
    }

    /// Returns the known class, if any.
    #[inline]
    pub fn as_known(self) -> Option<RecordClass> {
        match self {
            Self::Known(c) => Some(c),
            Self::Unknown(_) => None,
        }
    }
}

impl From<RecordClass> for Class {
    #[inline]
    fn from(c: RecordClass) -> Self {
        Self::Known(c)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(c) => fmt::Display::fmt(c, f),
            Self::Unknown(v) => write!(f, "CLASS{v}"),
        }
    }
}
