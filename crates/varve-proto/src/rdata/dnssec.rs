//! DNSSEC record types the resolver consumes (RRSIG, NSEC).

use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::RecordType;
use crate::wire::WireReader;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// RRSIG record - DNSSEC signature over an RR-set (RFC 4034).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RRSIG {
    /// Type covered by this signature.
    type_covered: u16,
    /// Algorithm number.
    algorithm: u8,
    /// Number of labels in the original owner name (excludes root and a
    /// leading wildcard).
    labels: u8,
    /// Original TTL.
    original_ttl: u32,
    /// Signature expiration time (Unix timestamp).
    expiration: u32,
    /// Signature inception time (Unix timestamp).
    inception: u32,
    /// Key tag of the signing key.
    key_tag: u16,
    /// Signer's name, the apex of the signing zone.
    signer: Name,
    /// Signature data.
    signature: Vec<u8>,
}

impl RRSIG {
    /// Creates a new RRSIG record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        type_covered: u16,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer: Name,
        signature: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer,
            signature: signature.into(),
        }
    }

    /// Returns the type covered by this signature.
    #[inline]
    pub const fn type_covered(&self) -> u16 {
        self.type_covered
    }

    /// Returns true if this signature covers `rtype`.
    #[inline]
    pub fn covers(&self, rtype: RecordType) -> bool {
        self.type_covered == rtype.to_u16()
    }

    /// Returns the algorithm number.
    #[inline]
    pub const fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// Returns the owner label count from the signature.
    #[inline]
    pub const fn labels(&self) -> u8 {
        self.labels
    }

    /// Returns the original TTL.
    #[inline]
    pub const fn original_ttl(&self) -> u32 {
        self.original_ttl
    }

    /// Returns the expiration time.
    #[inline]
    pub const fn expiration(&self) -> u32 {
        self.expiration
    }

    /// Returns the inception time.
    #[inline]
    pub const fn inception(&self) -> u32 {
        self.inception
    }

    /// Returns the key tag.
    #[inline]
    pub const fn key_tag(&self) -> u16 {
        self.key_tag
    }

    /// Returns the signer's name.
    #[inline]
    pub fn signer(&self) -> &Name {
        &self.signer
    }

    /// Returns the signature data.
    #[inline]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Returns true if the signature is within its validity window.
    #[inline]
    pub fn is_valid_at(&self, now: u32) -> bool {
        now >= self.inception && now <= self.expiration
    }

    /// Parses an RRSIG record out of a message buffer.
    pub fn parse(message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let mut reader = WireReader::new(message);
        reader.set_position(offset);
        let type_covered = reader.read_u16()?;
        let algorithm = reader.read_u8()?;
        let labels = reader.read_u8()?;
        let original_ttl = reader.read_u32()?;
        let expiration = reader.read_u32()?;
        let inception = reader.read_u32()?;
        let key_tag = reader.read_u16()?;

        let (signer, name_len) = Name::parse(message, offset + 18)?;
        let sig_start = offset + 18 + name_len;
        let sig_end = offset + rdlength as usize;
        if sig_start > sig_end || sig_end > message.len() {
            return Err(Error::invalid_rdata("RRSIG", "bad signature bounds"));
        }
        Ok(Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer,
            signature: message[sig_start..sig_end].to_vec(),
        })
    }

    /// Returns the uncompressed wire length.
    #[inline]
    pub fn wire_len(&self) -> usize {
        18 + self.signer.wire_len() + self.signature.len()
    }

    /// Writes the record in uncompressed wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.type_covered.to_be_bytes());
        buf.extend_from_slice(&[self.algorithm, self.labels]);
        buf.extend_from_slice(&self.original_ttl.to_be_bytes());
        buf.extend_from_slice(&self.expiration.to_be_bytes());
        buf.extend_from_slice(&self.inception.to_be_bytes());
        buf.extend_from_slice(&self.key_tag.to_be_bytes());
        self.signer.write_wire(buf);
        buf.extend_from_slice(&self.signature);
    }
}

impl fmt::Display for RRSIG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TYPE{} {} {} {} {} {} {} {}",
            self.type_covered,
            self.algorithm,
            self.labels,
            self.original_ttl,
            self.expiration,
            self.inception,
            self.key_tag,
            self.signer
        )
    }
}

/// NSEC record - authenticated denial of existence (RFC 4034).
///
/// An NSEC record asserts that no name exists between its owner and
/// `next_name` in canonical zone order, and lists the types present at
/// the owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NSEC {
    /// Next domain name in canonical order.
    next_name: Name,
    /// Type bitmap of record types at the owner name.
    type_bitmap: Vec<u8>,
}

impl NSEC {
    /// Creates a new NSEC record from a raw type bitmap.
    pub fn new(next_name: Name, type_bitmap: impl Into<Vec<u8>>) -> Self {
        Self {
            next_name,
            type_bitmap: type_bitmap.into(),
        }
    }

    /// Creates a new NSEC record from a list of present types.
    pub fn with_types(next_name: Name, types: &[RecordType]) -> Self {
        let mut values: Vec<u16> = types.iter().map(|t| t.to_u16()).collect();
        values.sort_unstable();
        values.dedup();

        let mut bitmap = Vec::new();
        let mut i = 0;
        while i < values.len() {
            let window = (values[i] >> 8) as u8;
            let mut bytes = [0u8; 32];
            let mut max_byte = 0;
            while i < values.len() && (values[i] >> 8) as u8 == window {
                let low = (values[i] & 0xFF) as usize;
                bytes[low / 8] |= 0x80 >> (low % 8);
                max_byte = low / 8;
                i += 1;
            }
            bitmap.push(window);
            bitmap.push(max_byte as u8 + 1);
            bitmap.extend_from_slice(&bytes[..=max_byte]);
        }
        Self {
            next_name,
            type_bitmap: bitmap,
        }
    }

    /// Returns the next domain name.
    #[inline]
    pub fn next_name(&self) -> &Name {
        &self.next_name
    }

    /// Returns the raw type bitmap.
    #[inline]
    pub fn type_bitmap(&self) -> &[u8] {
        &self.type_bitmap
    }

    /// Returns true if the bitmap marks `rtype` as present at the owner.
    pub fn contains_type(&self, rtype: u16) -> bool {
        let want_window = (rtype >> 8) as u8;
        let low = (rtype & 0xFF) as usize;
        let mut pos = 0;
        while pos + 2 <= self.type_bitmap.len() {
            let window = self.type_bitmap[pos];
            let len = usize::from(self.type_bitmap[pos + 1]);
            pos += 2;
            if pos + len > self.type_bitmap.len() {
                break;
            }
            if window == want_window {
                let byte = low / 8;
                return byte < len && self.type_bitmap[pos + byte] & (0x80 >> (low % 8)) != 0;
            }
            pos += len;
        }
        false
    }

    /// Returns the record types present according to the bitmap.
    pub fn types(&self) -> Vec<u16> {
        let mut types = Vec::new();
        let mut pos = 0;
        while pos + 2 <= self.type_bitmap.len() {
            let window = u16::from(self.type_bitmap[pos]);
            let len = usize::from(self.type_bitmap[pos + 1]);
            pos += 2;
            if pos + len > self.type_bitmap.len() {
                break;
            }
            for (byte_idx, &byte) in self.type_bitmap[pos..pos + len].iter().enumerate() {
                for bit in 0..8u16 {
                    if byte & (0x80 >> bit) != 0 {
                        types.push(window * 256 + byte_idx as u16 * 8 + bit);
                    }
                }
            }
            pos += len;
        }
        types
    }

    /// Parses an NSEC record out of a message buffer.
    pub fn parse(message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let (next_name, name_len) = Name::parse(message, offset)?;
        let bitmap_start = offset + name_len;
        let bitmap_end = offset + rdlength as usize;
        if bitmap_start > bitmap_end || bitmap_end > message.len() {
            return Err(Error::invalid_rdata("NSEC", "bad bitmap bounds"));
        }
        Ok(Self {
            next_name,
            type_bitmap: message[bitmap_start..bitmap_end].to_vec(),
        })
    }

    /// Returns the uncompressed wire length.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.next_name.wire_len() + self.type_bitmap.len()
    }

    /// Writes the record in uncompressed wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.next_name.write_wire(buf);
        buf.extend_from_slice(&self.type_bitmap);
    }
}

impl fmt::Display for NSEC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.next_name)?;
        for t in self.types() {
            match RecordType::try_from(t) {
                Ok(rt) => write!(f, " {rt}")?,
                Err(_) => write!(f, " TYPE{t}")?,
            }
        }
        Ok(())
    }
}
