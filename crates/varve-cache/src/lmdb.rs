//! LMDB-backed implementation of the backend contract.
//!
//! LMDB gives exactly the shape the cache wants: a memory-mapped B+tree
//! ordered by raw key bytes, MVCC read snapshots that may be shared
//! read-only across processes, and a single writer.

use crate::backend::{Backend, Found, ReadTxn};
use crate::{CacheError, CacheOpts, Result};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use std::ops::Bound;

impl From<heed::Error> for CacheError {
    fn from(err: heed::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// The persistent cache database.
#[derive(Clone)]
pub struct LmdbBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl std::fmt::Debug for LmdbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbBackend").finish_non_exhaustive()
    }
}

impl LmdbBackend {
    /// Opens (creating if needed) the database under `opts.path`.
    pub fn open(opts: &CacheOpts) -> Result<Self> {
        std::fs::create_dir_all(&opts.path)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(opts.max_size)
                .max_dbs(1)
                .open(&opts.path)?
        };
        let mut wtxn = env.write_txn()?;
        let db = env.create_database::<Bytes, Bytes>(&mut wtxn, None)?;
        wtxn.commit()?;
        Ok(Self { env, db })
    }
}

/// An LMDB read snapshot.
pub struct LmdbTxn<'e> {
    txn: RoTxn<'e>,
    db: Database<Bytes, Bytes>,
}

impl ReadTxn for LmdbTxn<'_> {
    fn read(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        Ok(self.db.get(&self.txn, key)?)
    }

    fn read_leq(&self, key: &[u8]) -> Result<Option<(&[u8], &[u8], Found)>> {
        let range = (Bound::Unbounded, Bound::Included(key));
        let mut iter = self.db.rev_range(&self.txn, &range)?;
        match iter.next() {
            None => Ok(None),
            Some(Err(err)) => Err(err.into()),
            Some(Ok((k, v))) => {
                let how = if k == key { Found::Eq } else { Found::Lt };
                Ok(Some((k, v, how)))
            }
        }
    }

    fn count(&self) -> Result<u64> {
        Ok(self.db.len(&self.txn)?)
    }
}

impl Backend for LmdbBackend {
    type Txn<'a> = LmdbTxn<'a>;

    fn begin_read(&self) -> Result<Self::Txn<'_>> {
        Ok(LmdbTxn {
            txn: self.env.read_txn()?,
            db: self.db,
        })
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, value)?;
        wtxn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.delete(&mut wtxn, key)?;
        wtxn.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.env.force_sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, LmdbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let opts = CacheOpts {
            path: dir.path().join("cache"),
            max_size: 16 << 20,
        };
        let be = LmdbBackend::open(&opts).unwrap();
        (dir, be)
    }

    #[test]
    fn test_lmdb_roundtrip() {
        let (_dir, be) = open_temp();
        be.write(b"key-a", b"1").unwrap();
        be.write(b"key-c", b"3").unwrap();

        let txn = be.begin_read().unwrap();
        assert_eq!(txn.read(b"key-a").unwrap(), Some(&b"1"[..]));
        assert_eq!(txn.read(b"key-b").unwrap(), None);

        let (k, v, how) = txn.read_leq(b"key-b").unwrap().unwrap();
        assert_eq!((k, v, how), (&b"key-a"[..], &b"1"[..], Found::Lt));
        assert_eq!(txn.count().unwrap(), 2);
        drop(txn);

        be.clear().unwrap();
        assert_eq!(be.count().unwrap(), 0);
        be.sync().unwrap();
    }
}
