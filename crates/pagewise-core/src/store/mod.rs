//! Remote store boundary: the query shape the layer may issue, the page
//! shape it gets back, and the failures it has to classify.

pub mod memory;

use crate::{
    query::{ComparePredicate, SortSpec},
    record::{Normalizer, RawDocument, Record, RecordId},
};
use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error as ThisError;

// re-exports
pub use memory::MemoryStore;

///
/// Cursor
///
/// Opaque resume position handed out by the store.
/// The layer stores and returns it but never looks inside.
///

#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

///
/// StoreQuery
///
/// One page request: indexed predicates, a single sort key, a page-size
/// cap, and an optional resume cursor.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreQuery {
    pub predicates: Vec<ComparePredicate>,
    pub sort: SortSpec,
    pub limit: u32,
    pub after: Option<Cursor>,
}

impl StoreQuery {
    #[must_use]
    pub const fn new(predicates: Vec<ComparePredicate>, sort: SortSpec, limit: u32) -> Self {
        Self {
            predicates,
            sort,
            limit,
            after: None,
        }
    }

    #[must_use]
    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.after = cursor;
        self
    }
}

///
/// RawPage
///
/// Page as returned by a store client, before normalization.
/// `next == None` means the result set is exhausted.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPage {
    pub documents: Vec<RawDocument>,
    pub next: Option<Cursor>,
}

///
/// Page
///
/// Normalized page. An exhausted page never carries a cursor.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page {
    records: Vec<Record>,
    cursor: Option<Cursor>,
}

impl Page {
    #[must_use]
    pub const fn new(records: Vec<Record>, cursor: Option<Cursor>) -> Self {
        Self { records, cursor }
    }

    /// Normalize every document of `raw`.
    #[must_use]
    pub fn from_raw(raw: RawPage, normalizer: &Normalizer) -> Self {
        let records = raw
            .documents
            .into_iter()
            .map(|doc| normalizer.record(doc))
            .collect();

        Self::new(records, raw.next)
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<Record>, Option<Cursor>) {
        (self.records, self.cursor)
    }

    #[must_use]
    pub const fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.cursor.is_none()
    }
}

///
/// RecordStore
///
/// Remote document store consumed by the layer.
/// Timeouts belong to the implementation; when it gives up it reports
/// [`StoreError::Timeout`].
///

#[async_trait(?Send)]
pub trait RecordStore {
    /// Fetch one page. Predicates must target indexed fields.
    async fn query(&self, query: StoreQuery) -> Result<RawPage, StoreError>;

    /// Persist a new document and return it with its assigned identifier.
    async fn create(&self, fields: Map<String, JsonValue>) -> Result<RawDocument, StoreError>;

    /// Merge `changes` into an existing document. JSON `null` removes a field.
    async fn update(&self, id: &RecordId, changes: Map<String, JsonValue>) -> Result<(), StoreError>;

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError>;
}

///
/// StoreError
///
/// Failures reported by a store client, before classification.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("store request timed out")]
    Timeout,

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("failed precondition: {message}")]
    FailedPrecondition { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("document not found: {id}")]
    NotFound { id: RecordId },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldKind;
    use serde_json::json;

    #[test]
    fn page_without_cursor_is_exhausted() {
        let page = Page::new(vec![Record::new("a")], None);

        assert!(page.exhausted());
        assert!(page.cursor().is_none());
    }

    #[test]
    fn raw_pages_are_normalized_on_the_way_in() {
        let normalizer = Normalizer::new([("number".to_string(), FieldKind::Integer)]);
        let raw = RawPage {
            documents: vec![RawDocument::new("a").with("number", json!(" 12 "))],
            next: Some(Cursor::new("c1")),
        };

        let page = Page::from_raw(raw, &normalizer);

        assert_eq!(page.records()[0].get("number"), Some(&crate::value::Value::Int(12)));
        assert!(!page.exhausted());
    }
}
