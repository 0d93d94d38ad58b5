//! Metrics sink boundary.
//!
//! Session logic never touches `obs::metrics` directly; every counter
//! update flows through a `MetricsEvent` handed to a `MetricsSink`.

use crate::{error::ErrorKind, obs::metrics};

///
/// PageKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageKind {
    First,
    Next,
    Lookup,
}

///
/// OverlayKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OverlayKind {
    Create,
    Update,
    Delete,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    StorePage {
        list: &'a str,
        kind: PageKind,
        records: u64,
    },
    StoreError {
        list: &'a str,
        kind: ErrorKind,
    },
    CacheHit {
        list: &'a str,
    },
    CacheMiss {
        list: &'a str,
    },
    CacheSeed {
        list: &'a str,
        records: u64,
    },
    Superseded {
        list: &'a str,
    },
    Overlay {
        list: &'a str,
        kind: OverlayKind,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

///
/// GlobalMetricsSink
/// Default process-local sink that writes into thread-local metrics state.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::StorePage {
                list,
                kind,
                records,
            } => metrics::with_state_mut(|m| {
                match kind {
                    PageKind::First => m.ops.first_pages = m.ops.first_pages.saturating_add(1),
                    PageKind::Next => m.ops.next_pages = m.ops.next_pages.saturating_add(1),
                    PageKind::Lookup => m.ops.lookups = m.ops.lookups.saturating_add(1),
                }
                m.ops.records_fetched = m.ops.records_fetched.saturating_add(records);

                let entry = m.lists.entry(list.to_string()).or_default();
                entry.store_queries = entry.store_queries.saturating_add(1);
                entry.records_fetched = entry.records_fetched.saturating_add(records);
            }),

            MetricsEvent::StoreError { list, .. } => metrics::with_state_mut(|m| {
                m.ops.store_errors = m.ops.store_errors.saturating_add(1);
                let entry = m.lists.entry(list.to_string()).or_default();
                entry.store_errors = entry.store_errors.saturating_add(1);
            }),

            MetricsEvent::CacheHit { list } => metrics::with_state_mut(|m| {
                m.ops.cache_hits = m.ops.cache_hits.saturating_add(1);
                let entry = m.lists.entry(list.to_string()).or_default();
                entry.cache_hits = entry.cache_hits.saturating_add(1);
            }),

            MetricsEvent::CacheMiss { list } => metrics::with_state_mut(|m| {
                m.ops.cache_misses = m.ops.cache_misses.saturating_add(1);
                let entry = m.lists.entry(list.to_string()).or_default();
                entry.cache_misses = entry.cache_misses.saturating_add(1);
            }),

            MetricsEvent::CacheSeed { .. } => metrics::with_state_mut(|m| {
                m.ops.cache_seeds = m.ops.cache_seeds.saturating_add(1);
            }),

            MetricsEvent::Superseded { list } => metrics::with_state_mut(|m| {
                m.ops.superseded = m.ops.superseded.saturating_add(1);
                let entry = m.lists.entry(list.to_string()).or_default();
                entry.superseded = entry.superseded.saturating_add(1);
            }),

            MetricsEvent::Overlay { list, kind } => metrics::with_state_mut(|m| {
                match kind {
                    OverlayKind::Create => {
                        m.ops.overlay_creates = m.ops.overlay_creates.saturating_add(1);
                    }
                    OverlayKind::Update => {
                        m.ops.overlay_updates = m.ops.overlay_updates.saturating_add(1);
                    }
                    OverlayKind::Delete => {
                        m.ops.overlay_deletes = m.ops.overlay_deletes.saturating_add(1);
                    }
                }
                let entry = m.lists.entry(list.to_string()).or_default();
                entry.overlay_writes = entry.overlay_writes.saturating_add(1);
            }),
        }
    }
}

/// Snapshot the current metrics state.
///
/// `window_start_ms` filters by window start (`EventState::since_ms`), not
/// by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

///
/// TESTS
///
