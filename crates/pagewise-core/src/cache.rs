//! TTL baseline cache.
//!
//! Holds the most recent unfiltered bulk read for one record list. Filtered
//! views are derived from it locally while it is warm; an expired entry is
//! never read, only replaced.

use crate::{
    query::SortSpec,
    record::{Record, RecordId},
    store::Cursor,
};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;

///
/// Baseline
///
/// Unfiltered records fetched in the list's baseline order, within one
/// owner scope, plus where the store left off.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Baseline {
    pub records: Arc<Vec<Record>>,
    pub cursor: Option<Cursor>,
    pub sort: SortSpec,
    pub owner_scope: Option<RecordId>,
}

impl Baseline {
    /// Whether the store had nothing left after these records.
    #[must_use]
    pub const fn complete(&self) -> bool {
        self.cursor.is_none()
    }
}

///
/// CacheEntry
///

#[derive(Clone, Debug)]
struct CacheEntry {
    baseline: Baseline,
    fetched_at: Instant,
}

///
/// TtlCache
///

#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    entry: Option<CacheEntry>,
}

impl TtlCache {
    /// A zero `ttl` disables the cache: nothing is stored or served.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    #[must_use]
    pub fn get(&self) -> Option<&Baseline> {
        self.get_at(Instant::now())
    }

    /// Valid while `now <= fetched_at + ttl`.
    #[must_use]
    pub fn get_at(&self, now: Instant) -> Option<&Baseline> {
        let entry = self.entry.as_ref()?;
        let age = now.saturating_duration_since(entry.fetched_at);

        (self.is_enabled() && age <= self.ttl).then_some(&entry.baseline)
    }

    pub fn put(&mut self, baseline: Baseline) {
        self.put_at(baseline, Instant::now());
    }

    /// Replace any previous entry.
    pub fn put_at(&mut self, baseline: Baseline, now: Instant) {
        if !self.is_enabled() {
            return;
        }

        self.entry = Some(CacheEntry {
            baseline,
            fetched_at: now,
        });
    }

    /// Append a continuation page to a still-valid entry.
    ///
    /// The entry keeps its original fetch time, so continuing a baseline
    /// never extends its life. Returns whether anything was appended.
    pub fn extend(&mut self, records: &[Record], cursor: Option<Cursor>, now: Instant) -> bool {
        if self.get_at(now).is_none() {
            return false;
        }
        let Some(entry) = self.entry.as_mut() else {
            return false;
        };

        let baseline = &mut entry.baseline;
        let mut next = Vec::with_capacity(baseline.records.len() + records.len());
        next.extend(baseline.records.iter().cloned());
        next.extend(records.iter().cloned());
        baseline.records = Arc::new(next);
        baseline.cursor = cursor;

        true
    }

    /// Rewrite the cached records in place of a re-fetch (local mutations).
    pub fn apply(&mut self, rewrite: impl FnOnce(&Baseline) -> Option<Vec<Record>>) {
        if let Some(entry) = self.entry.as_mut()
            && let Some(next) = rewrite(&entry.baseline)
        {
            entry.baseline.records = Arc::new(next);
        }
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

///
/// TESTS
///
