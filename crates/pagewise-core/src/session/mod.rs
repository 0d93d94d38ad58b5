//! Query sessions: the live query of a record list, its pages, and the
//! local overlay of acknowledged writes.

mod cancel;
pub mod engine;
mod list;
pub mod overlay;
mod state;

pub use cancel::{CancelToken, CancellationCoordinator};
pub use engine::QueryEngine;
pub use list::{RecordList, SearchOutcome};
pub use state::{ListSnapshot, ListStats, SessionStatus};

#[cfg(test)]
mod tests;
