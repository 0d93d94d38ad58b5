//! Client-side filter evaluator.
//!
//! Pure functions over borrowed records: nothing here performs I/O or
//! mutates its input.

use crate::{
    query::{ComparePredicate, FilterSpec, SortSpec, TextPredicate},
    record::Record,
    value::canonical_cmp,
};
use std::cmp::Ordering;

/// Keep the records that satisfy every client-only predicate of `spec`.
///
/// Input order is preserved. Applying the result a second time yields the
/// same list.
#[must_use]
pub fn apply(records: &[Record], spec: &FilterSpec) -> Vec<Record> {
    if !spec.has_client_predicates() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| matches_client(record, spec))
        .cloned()
        .collect()
}

/// Evaluate the whole spec locally and return the result in spec order.
///
/// Used when a filter is derived from a cached baseline rather than from a
/// store response, so store predicates have not been applied yet.
#[must_use]
pub fn apply_all(records: &[Record], spec: &FilterSpec) -> Vec<Record> {
    let mut out: Vec<Record> = records
        .iter()
        .filter(|record| matches(record, spec))
        .cloned()
        .collect();
    sort_records(&mut out, spec.sort());

    out
}

/// Whether `record` satisfies both the store and the client predicates.
#[must_use]
pub fn matches(record: &Record, spec: &FilterSpec) -> bool {
    matches_store(record, spec.store_predicates()) && matches_client(record, spec)
}

#[must_use]
pub fn matches_client(record: &Record, spec: &FilterSpec) -> bool {
    spec.client_predicates()
        .iter()
        .all(|pred| matches_text(record, pred))
}

#[must_use]
pub fn matches_store(record: &Record, predicates: &[ComparePredicate]) -> bool {
    predicates
        .iter()
        .all(|pred| pred.op.eval(&record.value(&pred.field), &pred.value))
}

// Any field of the group containing the needle is enough.
fn matches_text(record: &Record, pred: &TextPredicate) -> bool {
    pred.fields.iter().any(|field| {
        record
            .value(field)
            .text_fold()
            .is_some_and(|text| text.contains(&pred.needle))
    })
}

/// Total record order for `sort`: the sort field, then the identifier, both
/// in the sort direction.
#[must_use]
pub fn compare_records(a: &Record, b: &Record, sort: &SortSpec) -> Ordering {
    let ord = canonical_cmp(&a.value(&sort.field), &b.value(&sort.field))
        .then_with(|| a.id().cmp(b.id()));

    sort.direction.apply(ord)
}

pub fn sort_records(records: &mut [Record], sort: &SortSpec) {
    records.sort_by(|a, b| compare_records(a, b, sort));
}

///
/// TESTS
///
