//! DNS domain name representation and operations.
//!
//! Names are stored in uncompressed wire format, always terminated by the
//! root label. Besides the usual parsing and comparison operations, this
//! module provides the *label format* (LF) encoding: a reversible,
//! lexicographically sortable byte form with the labels in reverse order,
//! each preceded by its length. LF is what the resolver cache keys on, so
//! that all names under one suffix share a key prefix.

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Maximum length of a name in label format (wire length minus the root).
pub const MAX_LF_LENGTH: usize = MAX_NAME_LENGTH - 1;

/// Maximum number of compression pointer jumps tolerated while parsing.
const MAX_POINTER_JUMPS: usize = 32;

/// A DNS domain name.
///
/// # Wire Format
///
/// A sequence of labels, each prefixed by a length byte, terminated by the
/// zero-length root label. `www.example.com.` is:
///
/// ```text
/// 03 'w' 'w' 'w' 07 'e' 'x' 'a' 'm' 'p' 'l' 'e' 03 'c' 'o' 'm' 00
/// ```
///
/// # Comparison Semantics
///
/// Equality and hashing are case-insensitive per RFC 1035. `Ord` follows
/// the canonical ordering of RFC 4034 §6.1.
#[derive(Clone)]
pub struct Name {
    /// Uncompressed wire form, including the terminating root label.
    wire: SmallVec<[u8; 40]>,
    /// Number of labels, excluding the root.
    label_count: u8,
}

impl Name {
    /// Creates the root domain name.
    #[inline]
    pub fn root() -> Self {
        Self {
            wire: SmallVec::from_slice(&[0]),
            label_count: 0,
        }
    }

    /// Creates a domain name from uncompressed wire format bytes.
    pub fn from_wire(wire: &[u8]) -> Result<Self> {
        let label_count = Self::validate_wire(wire)?;
        Ok(Self {
            wire: SmallVec::from_slice(wire),
            label_count,
        })
    }

    /// Validates wire format and returns the label count (excluding root).
    fn validate_wire(wire: &[u8]) -> Result<u8> {
        if wire.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: wire.len() });
        }
        let mut pos = 0;
        let mut labels = 0u8;
        loop {
            let Some(&len) = wire.get(pos) else {
                return Err(Error::unexpected_eof(pos));
            };
            let len = len as usize;
            if len == 0 {
                // Root label must terminate the name.
                if pos + 1 != wire.len() {
                    return Err(Error::invalid_data(pos, "data past root label"));
                }
                return Ok(labels);
            }
            if len > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: len });
            }
            pos += 1 + len;
            if pos >= wire.len() {
                return Err(Error::unexpected_eof(pos));
            }
            labels += 1;
        }
    }

    /// Parses a possibly-compressed name out of a message buffer.
    ///
    /// Returns the name and the number of bytes consumed at `offset`
    /// (a compression pointer consumes two bytes regardless of how much
    /// of the name lives elsewhere).
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut wire = SmallVec::<[u8; 40]>::new();
        let mut labels = 0u8;
        let mut pos = offset;
        let mut consumed = None;
        let mut jumps = 0usize;

        loop {
            let Some(&len) = message.get(pos) else {
                return Err(Error::unexpected_eof(pos));
            };
            match len {
                0 => {
                    wire.push(0);
                    let end = pos + 1;
                    let consumed = consumed.unwrap_or(end - offset);
                    if wire.len() > MAX_NAME_LENGTH {
                        return Err(Error::NameTooLong { length: wire.len() });
                    }
                    return Ok((
                        Self {
                            wire,
                            label_count: labels,
                        },
                        consumed,
                    ));
                }
                l if l & 0xC0 == 0xC0 => {
                    let Some(&lo) = message.get(pos + 1) else {
                        return Err(Error::unexpected_eof(pos + 1));
                    };
                    let target = (usize::from(l & 0x3F) << 8) | usize::from(lo);
                    if target >= pos {
                        return Err(Error::InvalidCompressionPointer {
                            offset: pos,
                            target,
                        });
                    }
                    jumps += 1;
                    if jumps > MAX_POINTER_JUMPS {
                        return Err(Error::CompressionLoop { offset: pos });
                    }
                    consumed.get_or_insert(pos + 2 - offset);
                    pos = target;
                }
                l if l as usize > MAX_LABEL_LENGTH => {
                    return Err(Error::invalid_data(pos, "bad label length"));
                }
                l => {
                    let start = pos + 1;
                    let end = start + l as usize;
                    if end > message.len() {
                        return Err(Error::unexpected_eof(end));
                    }
                    wire.push(l);
                    wire.extend_from_slice(&message[start..end]);
                    if wire.len() + 1 > MAX_NAME_LENGTH {
                        return Err(Error::NameTooLong {
                            length: wire.len() + 1,
                        });
                    }
                    labels += 1;
                    pos = end;
                }
            }
        }
    }

    /// Returns the wire format representation (with the terminating root).
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the wire format length.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Returns the number of labels, excluding the root.
    #[inline]
    pub fn label_count(&self) -> usize {
        usize::from(self.label_count)
    }

    /// Returns true if this is the root domain.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.label_count == 0
    }

    /// Returns true if the leftmost label is the `*` wildcard.
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.wire.starts_with(&[1, b'*'])
    }

    /// Returns an iterator over the labels, leftmost first, excluding root.
    #[inline]
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter { wire: &self.wire }
    }

    /// Returns the parent domain (one label removed), or `None` for root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let skip = 1 + usize::from(self.wire[0]);
        Some(Self {
            wire: SmallVec::from_slice(&self.wire[skip..]),
            label_count: self.label_count - 1,
        })
    }

    /// Returns the name with `n` leading labels removed, or `None` if the
    /// name has fewer than `n` labels.
    pub fn strip_labels(&self, n: usize) -> Option<Self> {
        if n > self.label_count() {
            return None;
        }
        let mut pos = 0;
        for _ in 0..n {
            pos += 1 + usize::from(self.wire[pos]);
        }
        Some(Self {
            wire: SmallVec::from_slice(&self.wire[pos..]),
            label_count: self.label_count - n as u8,
        })
    }

    /// Returns `*.<self>`, the source of synthesis for this name.
    pub fn to_wildcard(&self) -> Result<Self> {
        if self.wire.len() + 2 > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong {
                length: self.wire.len() + 2,
            });
        }
        let mut wire = SmallVec::with_capacity(self.wire.len() + 2);
        wire.extend_from_slice(&[1, b'*']);
        wire.extend_from_slice(&self.wire);
        Ok(Self {
            wire,
            label_count: self.label_count + 1,
        })
    }

    /// Returns true if this name equals or is a subdomain of `other`.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        self.common_suffix_labels(other) == other.label_count()
    }

    /// Counts the trailing labels shared with `other`, case-insensitively
    /// and excluding the root.
    pub fn common_suffix_labels(&self, other: &Name) -> usize {
        let mine: SmallVec<[&[u8]; 12]> = self.labels().collect();
        let theirs: SmallVec<[&[u8]; 12]> = other.labels().collect();
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count()
    }

    /// Writes the name into label format: labels in reverse order, each
    /// preceded by its length, lowercased. Returns the encoded length.
    ///
    /// The root name encodes to zero bytes.
    pub fn to_lf(&self, out: &mut [u8]) -> Result<usize> {
        let needed = self.wire.len() - 1;
        if out.len() < needed {
            return Err(Error::buffer_too_short(needed, out.len()));
        }
        let mut write = needed;
        let mut pos = 0;
        while self.wire[pos] != 0 {
            let len = usize::from(self.wire[pos]);
            write -= 1 + len;
            out[write] = len as u8;
            for (i, &b) in self.wire[pos + 1..pos + 1 + len].iter().enumerate() {
                out[write + 1 + i] = b.to_ascii_lowercase();
            }
            pos += 1 + len;
        }
        debug_assert_eq!(write, 0);
        Ok(needed)
    }

    /// Reconstructs a name from its label format encoding.
    pub fn from_lf(lf: &[u8]) -> Result<Self> {
        if lf.len() > MAX_LF_LENGTH {
            return Err(Error::NameTooLong { length: lf.len() + 1 });
        }
        let mut starts = SmallVec::<[usize; 12]>::new();
        let mut pos = 0;
        while pos < lf.len() {
            let len = usize::from(lf[pos]);
            if len == 0 || len > MAX_LABEL_LENGTH || pos + 1 + len > lf.len() {
                return Err(Error::invalid_data(pos, "bad label format"));
            }
            starts.push(pos);
            pos += 1 + len;
        }
        let mut wire = SmallVec::with_capacity(lf.len() + 1);
        for &start in starts.iter().rev() {
            let len = usize::from(lf[start]);
            wire.extend_from_slice(&lf[start..start + 1 + len]);
        }
        wire.push(0);
        Ok(Self {
            wire,
            label_count: starts.len() as u8,
        })
    }

    /// Writes the name in wire format to a buffer.
    #[inline]
    pub fn write_wire(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.wire);
    }
}

/// Iterator over the labels of a name, leftmost first, excluding root.
pub struct LabelIter<'a> {
    wire: &'a [u8],
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = usize::from(*self.wire.first()?);
        if len == 0 {
            return None;
        }
        let label = &self.wire[1..1 + len];
        self.wire = &self.wire[1 + len..];
        Some(label)
    }
}

impl std::iter::FusedIterator for LabelIter<'_> {}

impl FromStr for Name {
    type Err = Error;

    /// Parses a name from dotted presentation format. A missing trailing
    /// dot is tolerated; `""` and `"."` are the root.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }
        let s = s.strip_suffix('.').unwrap_or(s);

        let mut wire = SmallVec::<[u8; 40]>::new();
        let mut label_count = 0u8;
        for part in s.split('.') {
            if part.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: part.len() });
            }
            for (i, c) in part.chars().enumerate() {
                if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '*' {
                    return Err(Error::InvalidLabelChar {
                        character: c,
                        position: i,
                    });
                }
            }
            wire.push(part.len() as u8);
            wire.extend_from_slice(part.as_bytes());
            label_count += 1;
        }
        wire.push(0);
        if wire.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: wire.len() });
        }
        Ok(Self { wire, label_count })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            for &b in label {
                if b == b'.' || b == b'\\' {
                    write!(f, "\\{}", b as char)?;
                } else if b.is_ascii_graphic() || b == b' ' {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "\\{b:03}")?;
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{self}\")")
    }
}

impl PartialEq for Name {
    /// Case-insensitive comparison per DNS semantics.
    fn eq(&self, other: &Self) -> bool {
        self.wire.len() == other.wire.len()
            && self
                .wire
                .iter()
                .zip(other.wire.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &b in &self.wire {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Canonical DNS name ordering per RFC 4034 §6.1: compare labels from
    /// the root outward, case-insensitively, shorter label first on a
    /// shared prefix.
    fn cmp(&self, other: &Self) -> Ordering {
        let mine: SmallVec<[&[u8]; 12]> = self.labels().collect();
        let theirs: SmallVec<[&[u8]; 12]> = other.labels().collect();
        for (a, b) in mine.iter().rev().zip(theirs.iter().rev()) {
            let ord = a
                .iter()
                .map(u8::to_ascii_lowercase)
                .cmp(b.iter().map(u8::to_ascii_lowercase));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        mine.len().cmp(&theirs.len())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
