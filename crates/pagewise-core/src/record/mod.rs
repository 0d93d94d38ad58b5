mod normalize;
mod patch;

use crate::value::Value;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// re-exports
pub use normalize::{CoercionError, FieldKind, Normalizer, RawDocument};
pub use patch::{PatchError, PatchOp, RecordPatch};

/// Reserved field name that addresses the store identifier.
pub const ID_FIELD: &str = "id";

///
/// RecordId
///
/// Stable identifier assigned by the store.
/// Doubles as the deterministic tie-break for every sort order.
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

///
/// Record
///
/// Immutable snapshot of one business record.
/// Changing a record produces a new value; the published list swaps entries
/// rather than editing one shared by other readers.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    fields: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment used when materializing records.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub const fn id(&self) -> &RecordId {
        &self.id
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field value for sorting and comparison; the identifier is addressable
    /// through [`ID_FIELD`], and missing fields read as `Null`.
    #[must_use]
    pub fn value(&self, field: &str) -> Value {
        if field == ID_FIELD {
            return Value::Text(self.id.as_str().to_string());
        }

        self.fields.get(field).cloned().unwrap_or(Value::Null)
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Return a new record with `patch` applied; `self` is left untouched.
    pub fn patched(&self, patch: &RecordPatch) -> Result<Self, PatchError> {
        let mut next = self.clone();
        patch.apply_to(&mut next.fields)?;

        Ok(next)
    }
}

///
/// TESTS
///
