//! Query intent: list schemas, user criteria, normalized filter
//! specifications, the client-side evaluator, and role scoping.

mod criteria;
pub mod eval;
mod filter;
mod fingerprint;
mod schema;
mod scope;

pub use criteria::SearchCriteria;
pub use filter::{
    CompareOp, ComparePredicate, FilterSpec, SortDirection, SortSpec, TextPredicate,
};
pub use fingerprint::FilterFingerprint;
pub use schema::{ANY_TEXT_GROUP, FieldDef, ListSchema, ListSchemaBuilder};
pub use scope::{Caller, Role, RoleScopeResolver, Visibility};
