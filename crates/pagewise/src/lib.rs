//! ## Crate layout
//! - `core`: record values, filters, the paginated query engine, the TTL
//!   baseline cache, cancellation, the mutation overlay, and observability.
//!
//! Most consumers only need [`RecordList`], a [`RecordStore`]
//! implementation, and the `prelude`.

pub use pagewise_core as core;

/// re-exports
///
/// store implementations need these to match the trait signatures without
/// adding the dependencies to their own Cargo.toml
pub mod __reexports {
    pub use async_trait;
    pub use derive_more;
    pub use remain;
    pub use serde_json;
    pub use tokio;
}

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use core::{
    config::AccessConfig,
    error::{AccessError as Error, ErrorKind},
    session::{ListSnapshot, RecordList, SearchOutcome},
    store::{MemoryStore, RecordStore},
};

///
/// Prelude
/// domain vocabulary plus the list handle itself
///

pub mod prelude {
    pub use crate::core::{
        prelude::*,
        session::{ListSnapshot, RecordList, SearchOutcome, SessionStatus},
        store::RecordStore as _,
    };
}

///
/// TESTS
///
