//! Shared unit-test fixtures: a work-order list schema and record builders.

use crate::{
    query::{ListSchema, SortDirection},
    record::{FieldKind, Record},
    value::Timestamp,
};

/// 2024-03-01T00:00:00Z
pub(crate) const BASE_MILLIS: i64 = 1_709_251_200_000;

pub(crate) fn work_orders() -> ListSchema {
    ListSchema::builder("work_orders")
        .indexed("owner", FieldKind::Identifier)
        .indexed("status", FieldKind::Identifier)
        .indexed("number", FieldKind::Integer)
        .indexed("created_at", FieldKind::Timestamp)
        .text("client")
        .text("notes")
        .text("technician1")
        .text("technician2")
        .text("technician3")
        .field("total", FieldKind::Money)
        .text_group("technician", ["technician1", "technician2", "technician3"])
        .owner("owner")
        .status("status")
        .amount("total")
        .default_sort("created_at", SortDirection::Desc)
        .build()
        .expect("work order schema should build")
}

/// Work order whose creation time is `number` minutes after [`BASE_MILLIS`].
pub(crate) fn order(id: &str, owner: &str, status: &str, number: i64) -> Record {
    Record::new(id)
        .with_field("owner", owner)
        .with_field("status", status)
        .with_field("number", number)
        .with_field(
            "created_at",
            Timestamp::from_millis(BASE_MILLIS + number * 60_000),
        )
}
