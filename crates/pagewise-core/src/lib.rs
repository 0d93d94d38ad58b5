//! Core runtime for pagewise: record values, filter specifications, the
//! paginated query engine, the TTL baseline cache, cancellation, the local
//! mutation overlay, and observability.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod config;
pub mod error;
pub mod obs;
pub mod query;
pub mod record;
pub mod session;
pub mod store;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Default time-to-live of the unfiltered baseline cache, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default number of records requested per store page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Upper bound on the configurable page size.
///
/// Pages are meant to stay small so a single round-trip is cheap; anything
/// beyond this is a bulk export and belongs elsewhere.
pub const MAX_PAGE_SIZE: u32 = 500;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, engines, stores, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        query::{Caller, FilterSpec, ListSchema, Role, SearchCriteria, SortDirection},
        record::{Record, RecordId, RecordPatch},
        value::Value,
    };
}
