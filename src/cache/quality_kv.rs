use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use chrono::Utc;

use crate::{
    data::envelope::{CacheEnvelope, Quality},
    error::PipelineResult,
    io::{atomic_write_json, read_json_if_exists},
};

/// Content-addressed key-to-envelope store with freshness tags
/// (`spec.md` §4.4). Single-writer (the Scheduler), many readers
/// (Intelligence instances in episodes). Durable across restarts: every
/// `set`/`set_many` lands via `io::atomic_write_json`, so readers never
/// observe a half-written file and a crash leaves the previous snapshot
/// intact.
///
/// There is no revision history — a `set` for an existing key replaces
/// it in place, per `spec.md` §4.4's documented lifetime policy.
pub struct QualityKv {
    path: PathBuf,
    snapshot: RwLock<HashMap<String, CacheEnvelope>>,
}

impl QualityKv {
    /// Opens (or creates) the store at `path`. The on-disk file is read
    /// once at construction into an in-memory snapshot; readers serve
    /// from that snapshot, writers persist then swap it in, which is the
    /// lock-free-read / copy-on-write behavior `spec.md` §4.4 specifies.
    pub fn open(path: impl Into<PathBuf>) -> PipelineResult<Self> {
        let path = path.into();
        let snapshot: HashMap<String, CacheEnvelope> =
            read_json_if_exists(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the on-disk file into the in-memory snapshot. Readers in
    /// a long-lived process call this periodically (or the Intelligence
    /// facade calls it once per accessor batch) to pick up Scheduler
    /// writes; a momentarily absent file yields an empty map, never an
    /// error.
    pub fn refresh(&self) -> PipelineResult<()> {
        let on_disk: HashMap<String, CacheEnvelope> =
            read_json_if_exists(&self.path)?.unwrap_or_default();
        *self.snapshot.write().expect("QualityKv lock poisoned") = on_disk;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<CacheEnvelope> {
        self.snapshot
            .read()
            .expect("QualityKv lock poisoned")
            .get(key)
            .cloned()
    }

    /// Returns `(data, quality)` for `key`, applying the freshness
    /// computation from `spec.md` §4.3 against `now`. A missing or
    /// `ok=false` envelope yields `default` data and `Quality::Missing`
    /// — never an error.
    pub fn get_with_quality(
        &self,
        key: &str,
        default: serde_json::Value,
        now: chrono::DateTime<Utc>,
    ) -> (serde_json::Value, Quality, Option<i64>) {
        match self.get(key) {
            Some(envelope) => {
                let (quality, age) = envelope.quality_at(now);
                if matches!(quality, Quality::Missing) {
                    (default, quality, age)
                } else {
                    (envelope.data, quality, age)
                }
            }
            None => (default, Quality::Missing, None),
        }
    }

    /// Writes a single envelope and persists the whole map atomically.
    /// Per `spec.md` §3, envelopes are monotonic per key in `fetched_at`:
    /// a write with an older `fetched_at` than the existing entry is
    /// rejected rather than silently regressing a reader's view.
    pub fn set(&self, key: String, envelope: CacheEnvelope) -> PipelineResult<()> {
        let mut guard = self.snapshot.write().expect("QualityKv lock poisoned");
        if let Some(existing) = guard.get(&key) {
            if let (Some(prev), Some(next)) = (existing.fetched_at, envelope.fetched_at) {
                if next < prev {
                    return Ok(());
                }
            }
        }
        guard.insert(key, envelope);
        atomic_write_json(&self.path, &*guard)
    }

    pub fn set_many(&self, items: impl IntoIterator<Item = (String, CacheEnvelope)>) -> PipelineResult<()> {
        let mut guard = self.snapshot.write().expect("QualityKv lock poisoned");
        for (key, envelope) in items {
            let should_write = match guard.get(&key) {
                Some(existing) => match (existing.fetched_at, envelope.fetched_at) {
                    (Some(prev), Some(next)) => next >= prev,
                    _ => true,
                },
                None => true,
            };
            if should_write {
                guard.insert(key, envelope);
            }
        }
        atomic_write_json(&self.path, &*guard)
    }
}
