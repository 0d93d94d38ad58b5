use crate::{
    error::AccessError,
    query::{FilterFingerprint, FilterSpec, ListSchema},
    record::Record,
    session::CancelToken,
    store::Cursor,
    value::Value,
};
use rust_decimal::Decimal;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

///
/// SessionStatus
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        };

        write!(f, "{label}")
    }
}

///
/// PageSource
///
/// Where continuation pages of a session come from.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PageSource {
    /// The session's own store query.
    Store,
    /// The cached baseline query; pages are filtered locally.
    Baseline,
}

///
/// QuerySession
///
/// Mutable state of the one live query of a record list.
///

#[derive(Clone, Debug)]
pub(crate) struct QuerySession {
    pub(crate) token: CancelToken,
    pub(crate) filter: FilterSpec,
    pub(crate) accumulated: Arc<Vec<Record>>,
    pub(crate) last_cursor: Option<Cursor>,
    pub(crate) has_more: bool,
    pub(crate) status: SessionStatus,
    pub(crate) error: Option<AccessError>,
    pub(crate) pages: u32,
    pub(crate) total_known: usize,
    pub(crate) truncated: bool,
    pub(crate) from_cache: bool,
    pub(crate) next_in_flight: bool,
    pub(crate) source: PageSource,
}

impl QuerySession {
    /// Fresh session for `filter`: nothing accumulated, waiting on the store.
    pub(crate) fn loading(token: CancelToken, filter: FilterSpec) -> Self {
        Self {
            token,
            filter,
            accumulated: Arc::new(Vec::new()),
            last_cursor: None,
            has_more: false,
            status: SessionStatus::Loading,
            error: None,
            pages: 0,
            total_known: 0,
            truncated: false,
            from_cache: false,
            next_in_flight: false,
            source: PageSource::Store,
        }
    }

    /// Keep showing `previous` records while the same filter reloads, so a
    /// failed reload leaves them in place.
    pub(crate) fn retain_from(&mut self, previous: &Self) {
        self.accumulated = Arc::clone(&previous.accumulated);
        self.total_known = previous.total_known;
    }

    /// Replace the accumulated set, keeping `total_known` in step.
    pub(crate) fn replace_records(&mut self, records: Vec<Record>) {
        let before = self.accumulated.len();
        let after = records.len();
        self.total_known = (self.total_known + after).saturating_sub(before);
        self.accumulated = Arc::new(records);
    }

    pub(crate) fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            records: Arc::clone(&self.accumulated),
            status: self.status,
            error: self.error.clone(),
            has_more: self.has_more,
            total_known: self.total_known,
            pages: self.pages,
            truncated: self.truncated,
            from_cache: self.from_cache,
            fingerprint: Some(self.filter.fingerprint()),
        }
    }
}

///
/// ListSnapshot
///
/// What observers of a record list see. Snapshots share their record vector;
/// a later change publishes a new vector instead of editing this one.
///

#[derive(Clone, Debug, Default)]
pub struct ListSnapshot {
    pub records: Arc<Vec<Record>>,
    pub status: SessionStatus,
    pub error: Option<AccessError>,
    pub has_more: bool,
    pub total_known: usize,
    pub pages: u32,

    /// The view was derived from a partial cached baseline and cannot be
    /// continued in this order; refresh to query the store directly.
    pub truncated: bool,
    pub from_cache: bool,
    pub fingerprint: Option<FilterFingerprint>,
}

impl ListSnapshot {
    #[must_use]
    pub fn loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id().as_str()).collect()
    }
}

///
/// ListStats
///
/// Aggregates over the records currently published.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_owner: BTreeMap<String, usize>,
    pub total_amount: Decimal,

    /// Per text group, how many records carry each value in any of the
    /// group's fields. List values count every element.
    pub by_group: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ListStats {
    #[must_use]
    pub fn from_records(records: &[Record], schema: &ListSchema) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };

        for record in records {
            *stats
                .by_owner
                .entry(group_label(&record.value(schema.owner_field())))
                .or_default() += 1;

            if let Some(field) = schema.status_field() {
                *stats
                    .by_status
                    .entry(group_label(&record.value(field)))
                    .or_default() += 1;
            }

            for (group, fields) in schema.text_groups() {
                let mut labels: BTreeSet<String> = BTreeSet::new();
                for field in fields {
                    collect_labels(&record.value(field), &mut labels);
                }
                let counts = stats.by_group.entry(group.to_string()).or_default();
                for label in labels {
                    *counts.entry(label).or_default() += 1;
                }
            }

            if let Some(field) = schema.amount_field() {
                stats.total_amount += match record.value(field) {
                    Value::Decimal(amount) => amount,
                    Value::Int(amount) => Decimal::from(amount),
                    _ => Decimal::ZERO,
                };
            }
        }

        stats
    }

    /// The `limit` most common values of `group`, most frequent first.
    /// Ties keep label order.
    #[must_use]
    pub fn top_values(&self, group: &str, limit: usize) -> Vec<(&str, usize)> {
        let Some(counts) = self.by_group.get(group) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, usize)> = counts
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);

        ranked
    }
}

// blank entries are not values
fn collect_labels(value: &Value, labels: &mut BTreeSet<String>) {
    match value {
        Value::Null => {}
        Value::List(items) => {
            for item in items {
                collect_labels(item, labels);
            }
        }
        Value::Text(text) if text.trim().is_empty() => {}
        other => {
            labels.insert(group_label(other));
        }
    }
}

// missing values are grouped together rather than dropped
fn group_label(value: &Value) -> String {
    match value {
        Value::Null => "unassigned".to_string(),
        Value::Text(text) => text.clone(),
        other => other.text_fold().unwrap_or_default(),
    }
}

///
/// TESTS
///
