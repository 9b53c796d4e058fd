//! # Varve Resolver Cache
//!
//! The persistent, DNSSEC-aware cache behind the varve resolver's
//! iterative query pipeline. It memoizes positive RR-sets, NSEC negative
//! proofs, and whole packets for aggregate denials, over an ordered
//! transactional key/value store (LMDB in production).
//!
//! ## Shape
//!
//! - **`peek`** serves the iterator's *produce* phase: exact hits,
//!   closest-NS zone-cut search, NSEC-based NXDOMAIN/NODATA synthesis,
//!   and wildcard expansion, all without touching the network.
//! - **`stash`** ingests resolved records afterwards, best-effort: it
//!   never fails the caller.
//! - The backend is pluggable through the [`backend::Backend`] trait;
//!   [`backend::MemoryBackend`] backs the test-suite and
//!   [`lmdb::LmdbBackend`] the real thing.
//!
//! The cache is a memoization layer, not a source of truth: on any
//! internal error a peek degrades to a miss and a stash drops the record.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod answer;
pub mod backend;
pub mod entry;
pub mod key;
pub mod lmdb;
pub mod query;
pub mod rank;

mod nsec1;
mod peek;
mod stash;

pub use backend::{Backend, Found, MemoryBackend, ReadTxn};
pub use lmdb::LmdbBackend;
pub use peek::CachePeek;
pub use query::{Query, QueryFlags, RankedRrset, Request, Section, State, TrustAnchors};
pub use rank::Rank;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

/// On-disk format version; a mismatch at open purges the store.
pub const CACHE_VERSION: u16 = 3;

/// Default lower TTL clamp, seconds.
pub const DEFAULT_TTL_MIN: u32 = 5;

/// Default upper TTL clamp, seconds (six days).
pub const DEFAULT_TTL_MAX: u32 = 6 * 24 * 3600;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache errors.
///
/// Only [`CacheError::NotFound`] is part of normal operation; everything
/// else is coerced into miss-like behavior at the public entry points.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Benign miss.
    #[error("entry not found")]
    NotFound,

    /// An entry failed structural validation and is treated as absent.
    #[error("corrupt cache entry")]
    Corrupt,

    /// The backend reported an I/O or transaction problem.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The name or type cannot be represented in the cache.
    #[error("unsupported name or record type")]
    Unsupported,

    /// The store carries an incompatible format version.
    #[error("cache database version mismatch")]
    VersionMismatch,

    /// Filesystem-level failure while opening the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A protocol-level encode/decode failure.
    #[error("protocol error: {0}")]
    Proto(#[from] varve_proto::Error),
}

impl CacheError {
    /// Returns true for errors peek treats as a plain miss.
    #[inline]
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound | CacheError::Unsupported | CacheError::Corrupt
        )
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOpts {
    /// Directory holding the backend database.
    pub path: PathBuf,
    /// Maximum database size in bytes (the LMDB map size).
    pub max_size: usize,
}

impl Default for CacheOpts {
    fn default() -> Self {
        Self {
            path: PathBuf::from("varve-cache"),
            max_size: 256 << 20,
        }
    }
}

/// Operation counters, exposed read-only to the observability layer.
#[derive(Debug, Default)]
pub struct CacheStats {
    hit: AtomicU64,
    miss: AtomicU64,
    insert: AtomicU64,
    delete: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.insert.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.delete.fetch_add(1, Ordering::Relaxed);
    }

    /// Answers served from the cache.
    pub fn hits(&self) -> u64 {
        self.hit.load(Ordering::Relaxed)
    }

    /// Lookups that fell through to the iterator.
    pub fn misses(&self) -> u64 {
        self.miss.load(Ordering::Relaxed)
    }

    /// Entries written.
    pub fn inserts(&self) -> u64 {
        self.insert.load(Ordering::Relaxed)
    }

    /// Whole-store purges.
    pub fn deletes(&self) -> u64 {
        self.delete.load(Ordering::Relaxed)
    }
}

/// A paired wall-clock/monotonic timestamp taken at open or clear.
///
/// Hot paths that want a current wall-clock second without the cost or
/// non-monotonicity of `SystemTime::now` derive it from this pair.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    /// Wall-clock seconds since the epoch at checkpoint time.
    pub wall: u32,
    /// The matching monotonic instant.
    pub monotonic: Instant,
}

impl Checkpoint {
    fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        Self {
            wall,
            monotonic: Instant::now(),
        }
    }

    /// Returns the current wall-clock second, monotonic-safe.
    pub fn now_secs(&self) -> u32 {
        self.wall
            .saturating_add(self.monotonic.elapsed().as_secs() as u32)
    }
}

/// The cache handle: one per resolver instance.
///
/// Not internally synchronized; the resolver's cooperative scheduling is
/// expected to serialize access.
pub struct Cache<B: Backend> {
    pub(crate) backend: B,
    pub(crate) ttl_min: u32,
    pub(crate) ttl_max: u32,
    stats: CacheStats,
    checkpoint: Checkpoint,
}

impl Cache<LmdbBackend> {
    /// Opens the cache over an LMDB database at `opts.path`.
    pub fn open_lmdb(opts: &CacheOpts) -> Result<Self> {
        Self::open(LmdbBackend::open(opts)?)
    }
}

impl<B: Backend> Cache<B> {
    /// Wraps a backend, checks the format version (purging an
    /// incompatible store), and initializes defaults.
    pub fn open(backend: B) -> Result<Self> {
        let cache = Self {
            backend,
            ttl_min: DEFAULT_TTL_MIN,
            ttl_max: DEFAULT_TTL_MAX,
            stats: CacheStats::default(),
            checkpoint: Checkpoint::now(),
        };
        cache.assert_right_version()?;
        Ok(cache)
    }

    /// Adjusts the TTL clamps applied at stash time.
    pub fn set_ttl_bounds(&mut self, ttl_min: u32, ttl_max: u32) {
        self.ttl_min = ttl_min;
        self.ttl_max = ttl_max.max(ttl_min);
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns the timestamp checkpoint taken at open or clear.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Re-takes the timestamp checkpoint.
    pub fn make_checkpoint(&mut self) {
        self.checkpoint = Checkpoint::now();
    }

    /// Flushes pending writes; a no-op for backends without sync.
    pub fn sync(&self) -> Result<()> {
        self.backend.sync()
    }

    pub(crate) fn sync_quiet(&self) {
        if let Err(err) = self.backend.sync() {
            debug!(error = %err, "cache sync failed");
        }
    }

    /// Returns the number of stored entries, version key included.
    pub fn count(&self) -> Result<u64> {
        self.backend.count()
    }

    /// Erases every entry and re-stamps the version.
    pub fn clear(&mut self) -> Result<()> {
        self.backend.clear()?;
        self.stats.record_delete();
        self.make_checkpoint();
        self.assert_right_version()
    }

    /// Checks the stored format version; on any mismatch the store is
    /// purged (when non-empty) and the current version written back.
    fn assert_right_version(&self) -> Result<()> {
        let verdict = {
            let txn = self.backend.begin_read()?;
            match txn.read(&key::VERSION_KEY) {
                Ok(Some(value)) if value == CACHE_VERSION.to_be_bytes() => Ok(()),
                Ok(Some(value)) if value.len() != 2 => {
                    Err(format!("bad length: {}", value.len()))
                }
                Ok(Some(value)) => Err(format!(
                    "bad version: {}",
                    u16::from_be_bytes([value[0], value[1]])
                )),
                Ok(None) => Err("no version entry".to_owned()),
                Err(err) => Err(format!("read error: {err}")),
            }
        };
        let reason = match verdict {
            Ok(()) => return Ok(()),
            Err(reason) => reason,
        };
        if self.backend.count()? > 0 {
            info!(reason, "incompatible cache database detected, purging");
            self.backend.clear()?;
            self.stats.record_delete();
        }
        // Either purged or empty; stamp the current version.
        self.backend
            .write(&key::VERSION_KEY, &CACHE_VERSION.to_be_bytes())?;
        self.backend.sync()?;
        Ok(())
    }
}

impl<B: Backend> std::fmt::Debug for Cache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("ttl_min", &self.ttl_min)
            .field("ttl_max", &self.ttl_max)
            .field("stats", &self.stats)
            .finish()
    }
}
