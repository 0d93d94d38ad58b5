//! Record list scenarios against `MemoryStore`, run on tokio's paused clock
//! so scripted latencies and cache ages are exact.

mod errors;
mod overlay;

use super::{ListSnapshot, RecordList, SearchOutcome, SessionStatus};
use crate::{
    config::AccessConfig,
    error::{ErrorKind, ErrorOrigin},
    obs::{MetricsEvent, MetricsSink},
    query::{Caller, Role, SearchCriteria},
    record::{RawDocument, RecordId},
    store::{MemoryStore, StoreError},
    test_support::{BASE_MILLIS, work_orders},
};
use serde_json::{Map, json};
use std::{cell::Cell, collections::HashSet, rc::Rc, time::Duration};
use tokio::time::{advance, sleep};
use tracing_subscriber::EnvFilter;

// 40 seeded orders: 26 open, 14 closed (every third), 20 per owner, and 10
// "Alpha Corp" clients (every fourth). Newer numbers sort first.
const SEEDED: i64 = 40;

///
/// CountingSink
///

#[derive(Debug, Default)]
struct CountingSink {
    store_pages: Cell<u64>,
    cache_hits: Cell<u64>,
    superseded: Cell<u64>,
}

impl MetricsSink for CountingSink {
    fn record(&self, event: MetricsEvent<'_>) {
        let counter = match event {
            MetricsEvent::StorePage { .. } => &self.store_pages,
            MetricsEvent::CacheHit { .. } => &self.cache_hits,
            MetricsEvent::Superseded { .. } => &self.superseded,
            _ => return,
        };
        counter.set(counter.get() + 1);
    }
}

fn document(n: i64) -> RawDocument {
    RawDocument::new(format!("wo-{n:03}"))
        .with("owner", json!(if n % 2 == 0 { "u-1" } else { "u-2" }))
        .with("status", json!(if n % 3 == 0 { "closed" } else { "open" }))
        .with("number", json!(n))
        .with("created_at", json!(BASE_MILLIS + n * 60_000))
        .with("client", json!(if n % 4 == 0 { "Alpha Corp" } else { "Beta LLC" }))
        .with("total", json!("12.50"))
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new(work_orders());
    store.extend((0..SEEDED).map(document));
    store
}

const fn config(page_size: u32, cache_ttl_secs: u64) -> AccessConfig {
    AccessConfig {
        cache_ttl_secs,
        page_size,
    }
}

fn executive() -> Caller {
    Caller::new("boss", Role::Executive)
}

fn technician(id: &str) -> Caller {
    Caller::new(id, Role::Technician)
}

// RUST_LOG=pagewise_core=debug shows the session logs for a failing scenario.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn record_list(
    store: MemoryStore,
    caller: Caller,
    config: &AccessConfig,
) -> (RecordList<MemoryStore>, Rc<CountingSink>) {
    init_tracing();

    let sink = Rc::new(CountingSink::default());
    let metrics: Rc<dyn MetricsSink> = Rc::clone(&sink) as _;
    let list = RecordList::with_sink(store, work_orders(), caller, config, metrics)
        .expect("record list should build");

    (list, sink)
}

fn open() -> SearchCriteria {
    SearchCriteria::new().eq("status", "open")
}

fn closed() -> SearchCriteria {
    SearchCriteria::new().eq("status", "closed")
}

async fn load_all(list: &RecordList<MemoryStore>) -> ListSnapshot {
    loop {
        let snapshot = list.snapshot();
        if !snapshot.has_more {
            return snapshot;
        }
        list.load_more().await.expect("load_more should succeed");
    }
}

fn assert_unique(snapshot: &ListSnapshot) {
    let ids: HashSet<&str> = snapshot.ids().into_iter().collect();
    assert_eq!(ids.len(), snapshot.records.len(), "duplicate ids in {:?}", snapshot.ids());
}

fn fields(pairs: &[(&str, serde_json::Value)]) -> Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}
