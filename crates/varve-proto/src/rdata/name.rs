//! Record types whose RDATA is (mostly) a domain name.

use crate::error::Result;
use crate::name::Name;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! single_name_rdata {
    ($(#[$doc:meta])* $ty:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $ty {
            target: Name,
        }

        impl $ty {
            /// Creates a new record pointing at `target`.
            #[inline]
            pub fn new(target: Name) -> Self {
                Self { target }
            }

            /// Returns the target name.
            #[inline]
            pub fn target(&self) -> &Name {
                &self.target
            }

            /// Parses the record out of a message buffer.
            pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
                let (target, _) = Name::parse(message, offset)?;
                Ok(Self { target })
            }

            /// Writes the record in uncompressed wire format.
            #[inline]
            pub fn write_to(&self, buf: &mut BytesMut) {
                self.target.write_wire(buf);
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.target, f)
            }
        }
    };
}

single_name_rdata! {
    /// NS record - authoritative name server (RFC 1035).
    NS
}

single_name_rdata! {
    /// CNAME record - canonical name alias (RFC 1035).
    CNAME
}

single_name_rdata! {
    /// PTR record - domain name pointer (RFC 1035).
    PTR
}

single_name_rdata! {
    /// DNAME record - delegation of a whole subtree (RFC 6672).
    DNAME
}

/// MX record - mail exchange (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MX {
    preference: u16,
    exchange: Name,
}

impl MX {
    /// Creates a new MX record.
    #[inline]
    pub fn new(preference: u16, exchange: Name) -> Self {
        Self {
            preference,
            exchange,
        }
    }

    /// Returns the preference value.
    #[inline]
    pub const fn preference(&self) -> u16 {
        self.preference
    }

    /// Returns the exchange name.
    #[inline]
    pub fn exchange(&self) -> &Name {
        &self.exchange
    }

    /// Parses an MX record out of a message buffer.
    pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
        let preference = u16::from_be_bytes([
            *message
                .get(offset)
                .ok_or(crate::Error::UnexpectedEof { offset })?,
            *message
                .get(offset + 1)
                .ok_or(crate::Error::UnexpectedEof { offset: offset + 1 })?,
        ]);
        let (exchange, _) = Name::parse(message, offset + 2)?;
        Ok(Self {
            preference,
            exchange,
        })
    }

    /// Returns the uncompressed wire length.
    #[inline]
    pub fn wire_len(&self) -> usize {
        2 + self.exchange.wire_len()
    }

    /// Writes the record in uncompressed wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.preference.to_be_bytes());
        self.exchange.write_wire(buf);
    }
}

impl fmt::Display for MX {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.preference, self.exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cname_roundtrip() {
        let cname = CNAME::new(Name::from_str("target.example.com.").unwrap());
        let mut buf = BytesMut::new();
        cname.write_to(&mut buf);
        assert_eq!(CNAME::parse(&buf, 0).unwrap(), cname);
    }

    #[test]
    fn test_mx_roundtrip() {
        let mx = MX::new(10, Name::from_str("mail.example.com.").unwrap());
        let mut buf = BytesMut::new();
        mx.write_to(&mut buf);
        assert_eq!(buf.len(), mx.wire_len());
        assert_eq!(MX::parse(&buf, 0).unwrap(), mx);
    }
}
