//! In-process [`RecordStore`] with the same query restrictions as a hosted
//! document store: indexed predicates only, one range field that must also
//! be the sort field, and opaque cursors.

use crate::{
    query::{ListSchema, SortSpec, eval},
    record::{Normalizer, RawDocument, Record, RecordId},
    store::{Cursor, RawPage, RecordStore, StoreError, StoreQuery},
    value::Value,
};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::{
    cell::{Cell, RefCell},
    cmp::Ordering,
    collections::{BTreeMap, VecDeque},
    time::Duration,
};
use ulid::Ulid;

///
/// MemoryStore
///
/// Deterministic store double. Documents are kept raw and normalized per
/// query, latency and failures are scripted per call, and every call is
/// counted.
///

#[derive(Debug)]
pub struct MemoryStore {
    schema: ListSchema,
    normalizer: Normalizer,
    documents: RefCell<BTreeMap<RecordId, RawDocument>>,
    latency: RefCell<VecDeque<Duration>>,
    failures: RefCell<VecDeque<StoreError>>,
    query_calls: Cell<u64>,
    write_calls: Cell<u64>,
    next_seq: Cell<u64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(schema: ListSchema) -> Self {
        Self {
            normalizer: schema.normalizer(),
            schema,
            documents: RefCell::new(BTreeMap::new()),
            latency: RefCell::new(VecDeque::new()),
            failures: RefCell::new(VecDeque::new()),
            query_calls: Cell::new(0),
            write_calls: Cell::new(0),
            next_seq: Cell::new(1),
        }
    }

    /// Seed a document directly, bypassing call accounting.
    pub fn insert(&self, doc: RawDocument) {
        self.documents
            .borrow_mut()
            .insert(RecordId::new(doc.id.clone()), doc);
    }

    pub fn extend(&self, docs: impl IntoIterator<Item = RawDocument>) {
        for doc in docs {
            self.insert(doc);
        }
    }

    /// Remove a document directly, bypassing call accounting.
    pub fn remove(&self, id: &RecordId) -> Option<RawDocument> {
        self.documents.borrow_mut().remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }

    /// Delay the next unscripted call by `delay`. Delays queue up in call order.
    pub fn push_latency(&self, delay: Duration) {
        self.latency.borrow_mut().push_back(delay);
    }

    /// Fail the next call (query or write) with `err`, once.
    pub fn fail_next(&self, err: StoreError) {
        self.failures.borrow_mut().push_back(err);
    }

    #[must_use]
    pub fn query_calls(&self) -> u64 {
        self.query_calls.get()
    }

    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.write_calls.get()
    }

    // Wait out scripted latency, then surface a scripted failure if any.
    // Borrows end before the await so interleaved calls never collide.
    async fn round_trip(&self) -> Result<(), StoreError> {
        let delay = self.latency.borrow_mut().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn validate(&self, query: &StoreQuery) -> Result<(), StoreError> {
        if query.limit == 0 {
            return Err(StoreError::invalid_argument("limit must be at least 1"));
        }
        if !self.schema.is_indexed(&query.sort.field) {
            return Err(StoreError::failed_precondition(format!(
                "no index for order by '{}'",
                query.sort.field
            )));
        }

        let mut range_field: Option<&str> = None;
        for pred in &query.predicates {
            if !self.schema.is_indexed(&pred.field) {
                return Err(StoreError::failed_precondition(format!(
                    "no index for filter on '{}'",
                    pred.field
                )));
            }
            if !pred.op.is_range() {
                continue;
            }
            if range_field.is_some_and(|field| field != pred.field) {
                return Err(StoreError::failed_precondition(
                    "range filters are limited to a single field",
                ));
            }
            if pred.field != query.sort.field {
                return Err(StoreError::failed_precondition(format!(
                    "range filter on '{}' requires ordering by that field first",
                    pred.field
                )));
            }
            range_field = Some(pred.field.as_str());
        }

        Ok(())
    }
}

///
/// CursorAnchor
///

struct CursorAnchor {
    value: Value,
    id: RecordId,
}

impl CursorAnchor {
    fn encode(record: &Record, sort: &SortSpec) -> Result<Cursor, StoreError> {
        serde_json::to_string(&(record.value(&sort.field), record.id()))
            .map(Cursor::new)
            .map_err(|err| StoreError::unavailable(format!("cursor encoding failed: {err}")))
    }

    fn decode(cursor: &Cursor) -> Result<Self, StoreError> {
        let (value, id): (Value, RecordId) = serde_json::from_str(cursor.as_str())
            .map_err(|_| StoreError::invalid_argument("cursor is not valid for this store"))?;

        Ok(Self { value, id })
    }

    fn into_record(self, sort_field: &str) -> Record {
        Record::new(self.id).with_field(sort_field, self.value)
    }
}

#[async_trait(?Send)]
impl RecordStore for MemoryStore {
    async fn query(&self, query: StoreQuery) -> Result<RawPage, StoreError> {
        self.query_calls.set(self.query_calls.get() + 1);
        self.round_trip().await?;
        self.validate(&query)?;

        let anchor = query
            .after
            .as_ref()
            .map(CursorAnchor::decode)
            .transpose()?
            .map(|anchor| anchor.into_record(&query.sort.field));

        let documents = self.documents.borrow();
        let mut rows: Vec<(Record, &RawDocument)> = documents
            .values()
            .map(|doc| (self.normalizer.record(doc.clone()), doc))
            .filter(|(record, _)| eval::matches_store(record, &query.predicates))
            .filter(|(record, _)| {
                anchor.as_ref().is_none_or(|anchor| {
                    eval::compare_records(record, anchor, &query.sort) == Ordering::Greater
                })
            })
            .collect();
        rows.sort_by(|(a, _), (b, _)| eval::compare_records(a, b, &query.sort));

        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next = match rows.last() {
            Some((last, _)) if has_more => Some(CursorAnchor::encode(last, &query.sort)?),
            _ => None,
        };

        Ok(RawPage {
            documents: rows.into_iter().map(|(_, doc)| doc.clone()).collect(),
            next,
        })
    }

    async fn create(&self, fields: Map<String, JsonValue>) -> Result<RawDocument, StoreError> {
        self.write_calls.set(self.write_calls.get() + 1);
        self.round_trip().await?;

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let id = Ulid::from_parts(seq, u128::from(seq)).to_string();

        let doc = RawDocument { id, fields };
        self.insert(doc.clone());

        Ok(doc)
    }

    async fn update(&self, id: &RecordId, changes: Map<String, JsonValue>) -> Result<(), StoreError> {
        self.write_calls.set(self.write_calls.get() + 1);
        self.round_trip().await?;

        let mut documents = self.documents.borrow_mut();
        let doc = documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        for (field, value) in changes {
            if value.is_null() {
                doc.fields.remove(&field);
            } else {
                doc.fields.insert(field, value);
            }
        }

        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.write_calls.set(self.write_calls.get() + 1);
        self.round_trip().await?;

        self.documents
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }
}

///
/// TESTS
///
