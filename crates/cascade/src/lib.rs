//! Cascading soft-delete for softdel records.
//!
//! [`CascadeEngine::mark_deleted`] flags a record and everything reachable
//! through its active relations as deleted. The first record of a cascade is
//! booked in the ledger; a validation failure anywhere rolls back the records
//! on the path from the root to the failing node.

pub mod context;
pub mod engine;
pub mod error;
pub mod graph;

pub use context::CascadeContext;
pub use engine::{CascadeEngine, DeleteMode};
pub use error::{CascadeError, CascadeResult};
pub use graph::{CatalogGraph, Dependents, RelationGraph};
