use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for record list activity.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub lists: BTreeMap<String, ListCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            lists: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Store round-trips
    pub first_pages: u64,
    pub next_pages: u64,
    pub lookups: u64,
    pub records_fetched: u64,
    pub store_errors: u64,

    // Baseline cache
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_seeds: u64,

    // Coordination
    pub superseded: u64,

    // Local mutation overlay
    pub overlay_creates: u64,
    pub overlay_updates: u64,
    pub overlay_deletes: u64,
}

///
/// ListCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ListCounters {
    pub store_queries: u64,
    pub records_fetched: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub superseded: u64,
    pub store_errors: u64,
    pub overlay_writes: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and restart the window.
pub fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `since_ms`.
    pub counters: Option<EventState>,
    /// Per-list counters and averages.
    pub list_counters: Vec<ListSummary>,
}

///
/// ListSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ListSummary {
    pub list: String,
    pub store_queries: u64,
    pub records_fetched: u64,
    pub avg_records_per_query: f64,
    pub cache_hits: u64,
    pub cache_hit_ratio: f64,
    pub superseded: u64,
    pub store_errors: u64,
    pub overlay_writes: u64,
}

/// Build a report from in-memory counters.
///
/// A `window_start_ms` later than the current window start yields an empty
/// report, since no counter can be attributed to that later window.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if window_start_ms.is_some_and(|start| start > snap.since_ms) {
        return EventReport::default();
    }

    let mut list_counters: Vec<ListSummary> = snap
        .lists
        .iter()
        .map(|(list, c)| {
            let lookups = c.cache_hits + c.cache_misses;
            ListSummary {
                list: list.clone(),
                store_queries: c.store_queries,
                records_fetched: c.records_fetched,
                avg_records_per_query: if c.store_queries > 0 {
                    c.records_fetched as f64 / c.store_queries as f64
                } else {
                    0.0
                },
                cache_hits: c.cache_hits,
                cache_hit_ratio: if lookups > 0 {
                    c.cache_hits as f64 / lookups as f64
                } else {
                    0.0
                },
                superseded: c.superseded,
                store_errors: c.store_errors,
                overlay_writes: c.overlay_writes,
            }
        })
        .collect();

    // busiest lists first, then by name
    list_counters.sort_by(|a, b| match b.store_queries.cmp(&a.store_queries) {
        Ordering::Equal => a.list.cmp(&b.list),
        other => other,
    });

    EventReport {
        counters: Some(snap),
        list_counters,
    }
}

///
/// TESTS
///
