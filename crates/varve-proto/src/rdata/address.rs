//! Address record types (A, AAAA).

use crate::error::{Error, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A record - IPv4 address (RFC 1035).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct A {
    addr: Ipv4Addr,
}

impl A {
    /// Creates a new A record.
    #[inline]
    pub const fn new(addr: Ipv4Addr) -> Self {
        Self { addr }
    }

    /// Returns the address.
    #[inline]
    pub const fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// Parses an A record from wire format.
    pub fn parse(message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        if rdlength != 4 || offset + 4 > message.len() {
            return Err(Error::invalid_rdata("A", "expected 4 bytes"));
        }
        let octets: [u8; 4] = message[offset..offset + 4].try_into().unwrap();
        Ok(Self {
            addr: Ipv4Addr::from(octets),
        })
    }

    /// Writes the record to wire format.
    #[inline]
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.addr.octets());
    }
}

impl fmt::Display for A {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

/// AAAA record - IPv6 address (RFC 3596).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AAAA {
    addr: Ipv6Addr,
}

impl AAAA {
    /// Creates a new AAAA record.
    #[inline]
    pub const fn new(addr: Ipv6Addr) -> Self {
        Self { addr }
    }

    /// Returns the address.
    #[inline]
    pub const fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    /// Parses an AAAA record from wire format.
    pub fn parse(message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        if rdlength != 16 || offset + 16 > message.len() {
            return Err(Error::invalid_rdata("AAAA", "expected 16 bytes"));
        }
        let octets: [u8; 16] = message[offset..offset + 16].try_into().unwrap();
        Ok(Self {
            addr: Ipv6Addr::from(octets),
        })
    }

    /// Writes the record to wire format.
    #[inline]
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.addr.octets());
    }
}

impl fmt::Display for AAAA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}
