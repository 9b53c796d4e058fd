//! Cache key codec.
//!
//! Keys are derived from the owner name in label format (LF), so that all
//! entries below one name share a key prefix and the zone hierarchy maps
//! onto key order:
//!
//! ```text
//! <dname_lf> 0x00 <tag> <rrtype_be16>?
//! ```
//!
//! The `0x00` separator keeps a shorter name's keys from bleeding into a
//! longer one during prefix work, which is also why names with a zero byte
//! inside a label are refused outright. Tag `'E'` marks an exact
//! name+type entry; tag `'1'` marks an NSEC entry indexed by the start of
//! the interval it proves, keyed within its zone.

use crate::{CacheError, Result};
use varve_proto::name::MAX_LF_LENGTH;
use varve_proto::{Name, RecordType};

/// Tag byte for exact name+type entries.
pub const TAG_EXACT: u8 = b'E';

/// Tag byte for NSEC entries indexed by interval start.
pub const TAG_NSEC1: u8 = b'1';

/// The reserved key of the cache version entry.
pub const VERSION_KEY: [u8; 3] = [0x00, 0x00, b'V'];

/// Room for LF + separator + tag + type, with the wildcard label on top.
const KEY_CAPACITY: usize = MAX_LF_LENGTH + 6;

/// Returns true for types the cache will store under an exact key.
///
/// Meta-types have no business being cached and RRSIGs only ever ride
/// along with the set they cover.
#[inline]
pub fn is_cacheable(rtype: RecordType) -> bool {
    !rtype.is_metatype() && rtype != RecordType::RRSIG
}

/// Refuses names that cannot be keyed unambiguously.
pub fn check_name(name: &Name) -> Result<()> {
    for label in name.labels() {
        if label.contains(&0) {
            return Err(CacheError::Unsupported);
        }
    }
    Ok(())
}

/// A reusable, stack-allocated key assembly buffer.
///
/// One of these lives on the stack of every peek or stash call. It holds
/// the owner name's LF once and derives exact and NSEC keys from it
/// without further allocation; the closest-NS scan shortens the LF prefix
/// in place.
pub struct KeyBuf {
    /// LF of the name currently being worked on.
    lf: [u8; MAX_LF_LENGTH],
    lf_len: usize,
    /// LF length of the zone apex, once known.
    zlf_len: usize,
    /// Type the last exact key was built for, after xNAME remapping.
    ktype: RecordType,
    /// Assembled key bytes.
    key: [u8; KEY_CAPACITY],
}

impl Default for KeyBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            lf: [0; MAX_LF_LENGTH],
            lf_len: 0,
            zlf_len: 0,
            ktype: RecordType::NS,
            key: [0; KEY_CAPACITY],
        }
    }

    /// Loads a name into the buffer.
    pub fn set_name(&mut self, name: &Name) -> Result<()> {
        check_name(name)?;
        self.lf_len = name.to_lf(&mut self.lf)?;
        self.zlf_len = self.lf_len.min(self.zlf_len);
        Ok(())
    }

    /// Loads an encloser name, optionally extended by the `*` label.
    ///
    /// Wildcard-expanded records are stored under their source of
    /// synthesis, so the key name is `*.<encloser>`.
    pub fn set_name_wild(&mut self, encloser: &Name, wildcard: bool) -> Result<()> {
        self.set_name(encloser)?;
        if wildcard {
            if self.lf_len + 2 > MAX_LF_LENGTH {
                return Err(CacheError::Unsupported);
            }
            self.lf[self.lf_len] = 1;
            self.lf[self.lf_len + 1] = b'*';
            self.lf_len += 2;
        }
        Ok(())
    }

    /// Returns the current LF bytes.
    #[inline]
    pub fn lf(&self) -> &[u8] {
        &self.lf[..self.lf_len]
    }

    /// Returns the current LF length.
    #[inline]
    pub fn lf_len(&self) -> usize {
        self.lf_len
    }

    /// Returns the zone apex LF length.
    #[inline]
    pub fn zlf_len(&self) -> usize {
        self.zlf_len
    }

    /// Records the zone apex LF length.
    #[inline]
    pub fn set_zlf_len(&mut self, len: usize) {
        debug_assert!(len <= self.lf_len);
        self.zlf_len = len;
    }

    /// Returns the type the last exact key addressed, after remapping.
    #[inline]
    pub fn ktype(&self) -> RecordType {
        self.ktype
    }

    /// Returns the prefix lengths at which the current LF ends on a label
    /// boundary, shortest first, starting with the root (0).
    pub fn label_boundaries(&self) -> smallvec::SmallVec<[usize; 12]> {
        let mut ends = smallvec::SmallVec::new();
        ends.push(0);
        let mut pos = 0;
        while pos < self.lf_len {
            pos += 1 + usize::from(self.lf[pos]);
            ends.push(pos);
        }
        ends
    }

    /// Builds the exact-match key for the full current name.
    pub fn exact_key(&mut self, rtype: RecordType) -> Result<&[u8]> {
        let len = self.lf_len;
        self.exact_key_at(len, rtype)
    }

    /// Builds the exact-match key for the LF prefix of `lf_len` bytes.
    ///
    /// CNAME and DNAME are remapped onto the NS key so the closest-NS scan
    /// finds every kind of zone-cut-relevant data in one lookup per label.
    /// NSEC-family types are represented through the `'1'` index instead
    /// and are refused here, as are RRSIG and meta-types.
    pub fn exact_key_at(&mut self, lf_len: usize, rtype: RecordType) -> Result<&[u8]> {
        debug_assert!(lf_len <= self.lf_len);
        let rtype = match rtype {
            RecordType::NSEC | RecordType::NSEC3 => return Err(CacheError::Unsupported),
            t if !is_cacheable(t) => return Err(CacheError::Unsupported),
            RecordType::CNAME | RecordType::DNAME => RecordType::NS,
            t => t,
        };
        self.ktype = rtype;
        self.key[..lf_len].copy_from_slice(&self.lf[..lf_len]);
        self.key[lf_len] = 0x00;
        self.key[lf_len + 1] = TAG_EXACT;
        self.key[lf_len + 2..lf_len + 4].copy_from_slice(&rtype.to_u16().to_be_bytes());
        Ok(&self.key[..lf_len + 4])
    }

    /// Builds the NSEC key for the current name within the current zone.
    pub fn nsec1_key(&mut self) -> Result<&[u8]> {
        let zlf = self.zlf_len;
        let kwz: smallvec::SmallVec<[u8; 72]> =
            smallvec::SmallVec::from_slice(&self.lf[zlf..self.lf_len]);
        self.nsec1_key_for(&kwz)
    }

    /// Builds the NSEC key for an explicit within-zone suffix.
    pub fn nsec1_key_for(&mut self, kwz: &[u8]) -> Result<&[u8]> {
        let zlf = self.zlf_len;
        if zlf + 2 + kwz.len() > KEY_CAPACITY {
            return Err(CacheError::Unsupported);
        }
        self.key[..zlf].copy_from_slice(&self.lf[..zlf]);
        self.key[zlf] = 0x00;
        self.key[zlf + 1] = TAG_NSEC1;
        self.key[zlf + 2..zlf + 2 + kwz.len()].copy_from_slice(kwz);
        Ok(&self.key[..zlf + 2 + kwz.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[test]
    fn test_exact_key_layout() {
        let mut k = KeyBuf::new();
        k.set_name(&name("example.com.")).unwrap();
        let key = k.exact_key(RecordType::A).unwrap().to_vec();
        assert_eq!(key, b"\x03com\x07example\x00E\x00\x01");
        assert_eq!(k.ktype(), RecordType::A);
    }

    #[test]
    fn test_xname_remap() {
        let mut k = KeyBuf::new();
        k.set_name(&name("example.com.")).unwrap();
        let cname_key = k.exact_key(RecordType::CNAME).unwrap().to_vec();
        assert_eq!(k.ktype(), RecordType::NS);
        let ns_key = k.exact_key(RecordType::NS).unwrap().to_vec();
        assert_eq!(cname_key, ns_key);
        let dname_key = k.exact_key(RecordType::DNAME).unwrap().to_vec();
        assert_eq!(dname_key, ns_key);
    }

    #[test]
    fn test_forbidden_types() {
        let mut k = KeyBuf::new();
        k.set_name(&name("example.com.")).unwrap();
        assert!(k.exact_key(RecordType::NSEC).is_err());
        assert!(k.exact_key(RecordType::NSEC3).is_err());
        assert!(k.exact_key(RecordType::RRSIG).is_err());
        assert!(k.exact_key(RecordType::ANY).is_err());
        assert!(k.exact_key(RecordType::OPT).is_err());
    }

    #[test]
    fn test_separator_blocks_prefix_bleed() {
        // Keys of "com" must sort before every key under "com": the 0x00
        // separator is below any label length byte.
        let mut k = KeyBuf::new();
        k.set_name(&name("com.")).unwrap();
        let parent = k.exact_key(RecordType::NS).unwrap().to_vec();
        k.set_name(&name("example.com.")).unwrap();
        let child = k.exact_key(RecordType::NS).unwrap().to_vec();
        assert!(parent < child);
        assert!(!child.starts_with(&parent[..parent.len() - 3]));

        // And no user key can collide with the version entry.
        k.set_name(&Name::root()).unwrap();
        let root = k.exact_key(RecordType::NS).unwrap().to_vec();
        assert_ne!(&root[..3], &VERSION_KEY[..]);
    }

    #[test]
    fn test_nsec1_key_layout() {
        let mut k = KeyBuf::new();
        k.set_name(&name("a.example.com.")).unwrap();
        // Zone is example.com: LF is 4 + 8 = 12 bytes.
        k.set_zlf_len(12);
        let key = k.nsec1_key().unwrap().to_vec();
        assert_eq!(key, b"\x03com\x07example\x001\x01a");

        let wild = k.nsec1_key_for(b"\x01*").unwrap().to_vec();
        assert_eq!(wild, b"\x03com\x07example\x001\x01*");
    }

    #[test]
    fn test_wildcard_name() {
        let mut k = KeyBuf::new();
        k.set_name_wild(&name("example.com."), true).unwrap();
        let key = k.exact_key(RecordType::A).unwrap().to_vec();

        let mut k2 = KeyBuf::new();
        k2.set_name(&name("*.example.com.")).unwrap();
        let key2 = k2.exact_key(RecordType::A).unwrap().to_vec();
        assert_eq!(key, key2);
    }

    #[test]
    fn test_label_boundaries() {
        let mut k = KeyBuf::new();
        k.set_name(&name("a.b.example.com.")).unwrap();
        let ends = k.label_boundaries();
        // root, com, example.com, b.example.com, a.b.example.com
        assert_eq!(ends.as_slice(), &[0, 4, 12, 14, 16]);
    }

    #[test]
    fn test_key_distinctness() {
        // Distinct (name, type) pairs yield distinct keys.
        let mut k = KeyBuf::new();
        let mut seen = std::collections::HashSet::new();
        for n in ["example.com.", "a.example.com.", "xample.com.", "com."] {
            k.set_name(&name(n)).unwrap();
            for t in [RecordType::A, RecordType::NS, RecordType::TXT, RecordType::SOA] {
                assert!(seen.insert(k.exact_key(t).unwrap().to_vec()));
            }
        }
    }
}
