//! DNS message header.

use crate::error::{Error, Result};
use crate::rcode::ResponseCode;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the DNS header in bytes.
pub const HEADER_SIZE: usize = 12;

bitflags! {
    /// DNS header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u16 {
        /// Query/Response flag: 0 = query, 1 = response
        const QR = 0x8000;

        /// Authoritative Answer
        const AA = 0x0400;

        /// Truncation
        const TC = 0x0200;

        /// Recursion Desired
        const RD = 0x0100;

        /// Recursion Available
        const RA = 0x0080;

        /// Authentic Data (DNSSEC)
        const AD = 0x0020;

        /// Checking Disabled (DNSSEC)
        const CD = 0x0010;
    }
}

impl Default for HeaderFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for HeaderFlags {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for HeaderFlags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::from_bits_truncate(u16::deserialize(deserializer)?))
    }
}

/// DNS message header.
///
/// # Wire Format
///
/// ```text
/// |                      ID                       |
/// |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
/// |                    QDCOUNT                    |
/// |                    ANCOUNT                    |
/// |                    NSCOUNT                    |
/// |                    ARCOUNT                    |
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Message identifier for matching requests to responses.
    pub id: u16,

    /// Query/Response flag and other flags.
    pub flags: HeaderFlags,

    /// Operation code (only QUERY is produced by this library).
    pub opcode: u8,

    /// Response code.
    pub rcode: ResponseCode,

    /// Number of questions.
    pub qd_count: u16,

    /// Number of answer records.
    pub an_count: u16,

    /// Number of authority records.
    pub ns_count: u16,

    /// Number of additional records.
    pub ar_count: u16,
}

impl Header {
    /// Creates a new header with the given message ID.
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self {
            id,
            flags: HeaderFlags::empty(),
            opcode: 0,
            rcode: ResponseCode::NoError,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// Returns true if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.flags.contains(HeaderFlags::QR)
    }

    /// Returns true if the message was truncated.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.flags.contains(HeaderFlags::TC)
    }

    /// Returns true if checking is disabled (CD flag).
    #[inline]
    pub fn checking_disabled(&self) -> bool {
        self.flags.contains(HeaderFlags::CD)
    }

    /// Parses a header from the first 12 bytes of a message.
    pub fn parse(message: &[u8]) -> Result<Self> {
        if message.len() < HEADER_SIZE {
            return Err(Error::buffer_too_short(HEADER_SIZE, message.len()));
        }
        let id = u16::from_be_bytes([message[0], message[1]]);
        let raw_flags = u16::from_be_bytes([message[2], message[3]]);
        Ok(Self {
            id,
            flags: HeaderFlags::from_bits_truncate(raw_flags),
            opcode: ((raw_flags >> 11) & 0x0F) as u8,
            rcode: ResponseCode::from_u8_lossy((raw_flags & 0x0F) as u8),
            qd_count: u16::from_be_bytes([message[4], message[5]]),
            an_count: u16::from_be_bytes([message[6], message[7]]),
            ns_count: u16::from_be_bytes([message[8], message[9]]),
            ar_count: u16::from_be_bytes([message[10], message[11]]),
        })
    }

    /// Writes the header in wire format.
    pub fn write_to(&self, buf: &mut bytes::BytesMut) {
        let raw_flags = self.flags.bits()
            | (u16::from(self.opcode & 0x0F) << 11)
            | u16::from(self.rcode.to_u8() & 0x0F);
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&raw_flags.to_be_bytes());
        buf.extend_from_slice(&self.qd_count.to_be_bytes());
        buf.extend_from_slice(&self.an_count.to_be_bytes());
        buf.extend_from_slice(&self.ns_count.to_be_bytes());
        buf.extend_from_slice(&self.ar_count.to_be_bytes());
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id {} {} {} qd {} an {} ns {} ar {}",
            self.id,
            if self.is_response() { "resp" } else { "query" },
            self.rcode,
            self.qd_count,
            self.an_count,
            self.ns_count,
            self.ar_count
        )
    }
}
