//! The ordered key/value contract the cache is written against.
//!
//! Implementations must order entries by raw key bytes; the peek path
//! depends on prefix relationships and predecessor lookups. Reads hand out
//! borrowed slices scoped to one read transaction, which in turn lives at
//! most for one cache operation.

use crate::{CacheError, Result};
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::ops::Bound;

/// How a predecessor lookup matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    /// The key itself is present.
    Eq,
    /// A strictly smaller key was returned.
    Lt,
}

/// A read snapshot. All reads within one cache operation go through a
/// single transaction and therefore observe a consistent state.
pub trait ReadTxn {
    /// Looks up a key, returning the stored value as a borrowed slice.
    fn read(&self, key: &[u8]) -> Result<Option<&[u8]>>;

    /// Returns the entry with the greatest key not exceeding `key`.
    fn read_leq(&self, key: &[u8]) -> Result<Option<(&[u8], &[u8], Found)>>;

    /// Returns the number of stored entries.
    fn count(&self) -> Result<u64>;
}

/// An ordered, transactional key/value store.
///
/// Writes are self-contained; durability is only promised after [`sync`].
///
/// [`sync`]: Backend::sync
pub trait Backend {
    /// The read-transaction type, borrowing from the backend.
    type Txn<'a>: ReadTxn
    where
        Self: 'a;

    /// Opens a read snapshot.
    fn begin_read(&self) -> Result<Self::Txn<'_>>;

    /// Stores a value under a key, replacing any previous value.
    fn write(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a key; absent keys are not an error.
    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Removes every entry.
    fn clear(&self) -> Result<()>;

    /// Flushes pending writes to durable storage. May be a no-op.
    fn sync(&self) -> Result<()>;

    /// Returns the number of stored entries.
    fn count(&self) -> Result<u64> {
        self.begin_read()?.count()
    }
}

/// An ordered in-memory backend over a B-tree map.
///
/// Used by the test-suite; TTL arithmetic is driven by explicit
/// timestamps, so no wall clock is involved anywhere.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: RefCell<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read snapshot over a [`MemoryBackend`].
///
/// Holding this borrows the map; attempting to write through the same
/// backend before dropping it is a caller bug and will panic, which keeps
/// the borrowed-read contract honest in tests.
pub struct MemoryTxn<'a> {
    map: Ref<'a, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl ReadTxn for MemoryTxn<'_> {
    fn read(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        Ok(self.map.get(key).map(Vec::as_slice))
    }

    fn read_leq(&self, key: &[u8]) -> Result<Option<(&[u8], &[u8], Found)>> {
        let found = self
            .map
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back();
        Ok(found.map(|(k, v)| {
            let how = if k.as_slice() == key {
                Found::Eq
            } else {
                Found::Lt
            };
            (k.as_slice(), v.as_slice(), how)
        }))
    }

    fn count(&self) -> Result<u64> {
        Ok(self.map.len() as u64)
    }
}

impl Backend for MemoryBackend {
    type Txn<'a> = MemoryTxn<'a>;

    fn begin_read(&self) -> Result<Self::Txn<'_>> {
        Ok(MemoryTxn {
            map: self
                .map
                .try_borrow()
                .map_err(|_| CacheError::Backend("reader/writer overlap".into()))?,
        })
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map
            .try_borrow_mut()
            .map_err(|_| CacheError::Backend("write during open read".into()))?
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.map
            .try_borrow_mut()
            .map_err(|_| CacheError::Backend("write during open read".into()))?
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map
            .try_borrow_mut()
            .map_err(|_| CacheError::Backend("write during open read".into()))?
            .clear();
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_ordering() {
        let be = MemoryBackend::new();
        be.write(b"b", b"2").unwrap();
        be.write(b"a", b"1").unwrap();
        be.write(b"d", b"4").unwrap();

        let txn = be.begin_read().unwrap();
        assert_eq!(txn.read(b"a").unwrap(), Some(&b"1"[..]));
        assert_eq!(txn.read(b"c").unwrap(), None);
        assert_eq!(txn.count().unwrap(), 3);

        let (k, v, how) = txn.read_leq(b"c").unwrap().unwrap();
        assert_eq!((k, v, how), (&b"b"[..], &b"2"[..], Found::Lt));

        let (k, _, how) = txn.read_leq(b"d").unwrap().unwrap();
        assert_eq!((k, how), (&b"d"[..], Found::Eq));

        assert!(txn.read_leq(b"A").unwrap().is_none());
    }

    #[test]
    fn test_memory_backend_clear_and_remove() {
        let be = MemoryBackend::new();
        be.write(b"a", b"1").unwrap();
        be.remove(b"a").unwrap();
        be.remove(b"a").unwrap();
        assert_eq!(be.count().unwrap(), 0);

        be.write(b"a", b"1").unwrap();
        be.write(b"b", b"2").unwrap();
        be.clear().unwrap();
        assert_eq!(be.count().unwrap(), 0);
    }

    #[test]
    fn test_overlapping_write_fails() {
        let be = MemoryBackend::new();
        be.write(b"a", b"1").unwrap();
        let txn = be.begin_read().unwrap();
        assert!(be.write(b"b", b"2").is_err());
        drop(txn);
        assert!(be.write(b"b", b"2").is_ok());
    }
}
