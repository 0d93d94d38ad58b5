use crate::{record::ID_FIELD, value::Value};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// PatchError
///
/// Structured failures for overlay patch application.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PatchError {
    #[error("the record identifier cannot be changed by a patch")]
    IdentifierImmutable,

    #[error("patch contains an empty field name at position {index}")]
    EmptyField { index: usize },
}

///
/// PatchOp
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PatchOp {
    Set(Value),
    Unset,
}

///
/// RecordPatch
///
/// Ordered field assignments describing an acknowledged update.
/// Later operations on the same field win.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordPatch {
    ops: Vec<(String, PatchOp)>,
}

impl RecordPatch {
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((field.into(), PatchOp::Set(value.into())));
        self
    }

    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push((field.into(), PatchOp::Unset));
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> impl Iterator<Item = (&str, &PatchOp)> {
        self.ops.iter().map(|(field, op)| (field.as_str(), op))
    }

    /// Whether applying this patch may change `field`.
    #[must_use]
    pub fn touches(&self, field: &str) -> bool {
        self.ops.iter().any(|(name, _)| name == field)
    }

    pub(crate) fn apply_to(&self, fields: &mut BTreeMap<String, Value>) -> Result<(), PatchError> {
        self.validate()?;

        for (field, op) in &self.ops {
            match op {
                PatchOp::Set(value) => {
                    fields.insert(field.clone(), value.clone());
                }
                PatchOp::Unset => {
                    fields.remove(field);
                }
            }
        }

        Ok(())
    }

    /// Reject patches that could never apply, before any write is attempted.
    pub(crate) fn validate(&self) -> Result<(), PatchError> {
        for (index, (field, _)) in self.ops.iter().enumerate() {
            if field.trim().is_empty() {
                return Err(PatchError::EmptyField { index });
            }
            if field == ID_FIELD {
                return Err(PatchError::IdentifierImmutable);
            }
        }

        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_operations_on_the_same_field_win() {
        let mut fields = BTreeMap::new();
        let patch = RecordPatch::new()
            .set("status", "open")
            .unset("status")
            .set("owner", "u-2");

        patch.apply_to(&mut fields).expect("patch should apply");

        assert!(!fields.contains_key("status"));
        assert_eq!(fields.get("owner"), Some(&Value::from("u-2")));
    }

    #[test]
    fn identifier_patch_is_rejected_before_any_change() {
        let mut fields = BTreeMap::new();
        let patch = RecordPatch::new().set("status", "x").set(ID_FIELD, "other");

        let err = patch.apply_to(&mut fields).expect_err("id patch must fail");

        assert_eq!(err, PatchError::IdentifierImmutable);
        assert!(fields.is_empty(), "failed patch must not partially apply");
    }

    #[test]
    fn blank_field_names_are_rejected() {
        let patch = RecordPatch::new().set("  ", 1_i64);

        assert_eq!(
            patch.apply_to(&mut BTreeMap::new()),
            Err(PatchError::EmptyField { index: 0 })
        );
    }
}
