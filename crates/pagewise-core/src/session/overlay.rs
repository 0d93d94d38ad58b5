//! Local mutation overlay.
//!
//! Applies writes the store has already acknowledged to an in-memory record
//! list. Every function is copy-on-write: it reads a borrowed slice and
//! returns a replacement list, or `None` when nothing changes.

use crate::{
    query::{FilterSpec, eval},
    record::{PatchError, Record, RecordId, RecordPatch},
};
use std::cmp::Ordering;

/// Insert a newly created record at its sorted position.
///
/// Records outside `filter` are not shown. A record that sorts after the
/// last loaded one while more pages remain is left for those pages to
/// deliver. An id that is already present is treated as a replacement.
#[must_use]
pub fn apply_create(
    records: &[Record],
    record: Record,
    filter: &FilterSpec,
    has_more: bool,
) -> Option<Vec<Record>> {
    let mut next: Vec<Record> = records
        .iter()
        .filter(|r| r.id() != record.id())
        .cloned()
        .collect();
    let removed = next.len() != records.len();
    let inserted = place(&mut next, record, filter, has_more);

    (inserted || removed).then_some(next)
}

/// Replace a loaded record with its patched version.
///
/// A record that no longer satisfies `filter` is dropped; one that still
/// does moves to its new sorted position. Unknown ids change nothing.
pub fn apply_update(
    records: &[Record],
    id: &RecordId,
    patch: &RecordPatch,
    filter: &FilterSpec,
    has_more: bool,
) -> Result<Option<Vec<Record>>, PatchError> {
    let Some(current) = records.iter().find(|r| r.id() == id) else {
        return Ok(None);
    };
    let updated = current.patched(patch)?;

    let mut next: Vec<Record> = records.iter().filter(|r| r.id() != id).cloned().collect();
    place(&mut next, updated, filter, has_more);

    Ok(Some(next))
}

/// Drop the record with `id`, if loaded.
#[must_use]
pub fn apply_delete(records: &[Record], id: &RecordId) -> Option<Vec<Record>> {
    if !records.iter().any(|r| r.id() == id) {
        return None;
    }

    Some(records.iter().filter(|r| r.id() != id).cloned().collect())
}

fn place(records: &mut Vec<Record>, record: Record, filter: &FilterSpec, has_more: bool) -> bool {
    if !eval::matches(&record, filter) {
        return false;
    }

    let at = records.partition_point(|r| {
        eval::compare_records(r, &record, filter.sort()) == Ordering::Less
    });
    if has_more && at == records.len() {
        return false;
    }
    records.insert(at, record);

    true
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::{Caller, Role, RoleScopeResolver, SearchCriteria},
        test_support::{order, work_orders},
    };

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id().as_str()).collect()
    }

    // default order is newest first
    fn loaded() -> Vec<Record> {
        vec![
            order("c", "u-1", "open", 30),
            order("b", "u-2", "open", 20),
            order("a", "u-1", "open", 10),
        ]
    }

    #[test]
    fn create_lands_at_its_sorted_position() {
        let filter = FilterSpec::unfiltered(&work_orders());

        let next = apply_create(&loaded(), order("n", "u-1", "open", 25), &filter, false)
            .expect("create should change the list");

        assert_eq!(ids(&next), ["c", "n", "b", "a"]);
    }

    #[test]
    fn create_past_the_loaded_tail_waits_for_later_pages() {
        let filter = FilterSpec::unfiltered(&work_orders());

        assert!(apply_create(&loaded(), order("old", "u-1", "open", 1), &filter, true).is_none());
        assert!(apply_create(&loaded(), order("old", "u-1", "open", 1), &filter, false).is_some());
    }

    #[test]
    fn create_outside_the_scope_is_not_shown() {
        let schema = work_orders();
        let filter = RoleScopeResolver::new(schema.owner_field())
            .scope(&FilterSpec::unfiltered(&schema), &Caller::new("u-1", Role::Technician))
            .expect("scope should succeed");

        assert!(apply_create(&loaded(), order("x", "u-9", "open", 25), &filter, false).is_none());
    }

    #[test]
    fn update_that_leaves_the_filter_removes_the_record() {
        let schema = work_orders();
        let filter = FilterSpec::from_criteria(&schema, &SearchCriteria::new().eq("status", "open"))
            .expect("criteria should normalize");
        let patch = RecordPatch::new().set("status", "closed");

        let next = apply_update(&loaded(), &RecordId::from("b"), &patch, &filter, false)
            .expect("patch should apply")
            .expect("update should change the list");

        assert_eq!(ids(&next), ["c", "a"]);
    }

    #[test]
    fn update_moves_the_record_and_keeps_the_input_untouched() {
        let filter = FilterSpec::unfiltered(&work_orders());
        let before = loaded();
        let patch = RecordPatch::new().set("created_at", order("z", "u-1", "open", 40).value("created_at"));

        let next = apply_update(&before, &RecordId::from("a"), &patch, &filter, false)
            .expect("patch should apply")
            .expect("update should change the list");

        assert_eq!(ids(&next), ["a", "c", "b"]);
        assert_eq!(ids(&before), ["c", "b", "a"]);
    }

    #[test]
    fn update_of_unknown_record_is_a_no_op() {
        let filter = FilterSpec::unfiltered(&work_orders());

        let next = apply_update(&loaded(), &RecordId::from("zz"), &RecordPatch::new(), &filter, false)
            .expect("patch should apply");

        assert!(next.is_none());
    }

    #[test]
    fn delete_removes_exactly_one_record() {
        let next = apply_delete(&loaded(), &RecordId::from("b")).expect("delete should change the list");

        assert_eq!(ids(&next), ["c", "a"]);
        assert!(apply_delete(&next, &RecordId::from("b")).is_none());
    }
}
