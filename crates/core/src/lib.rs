//! Core domain types for softdel.
//!
//! This crate defines the data model shared by the store and the engine:
//! - Records, their identities and status columns
//! - The status state machine (which transition toggles which column)
//! - The relation catalog and its query variants
//! - Field validation rules
//! - Configuration

pub mod catalog;
pub mod config;
pub mod error;
pub mod record;
pub mod relation;
pub mod status;
pub mod validation;

pub use catalog::{Catalog, EntitySchema};
pub use error::{Error, Result};
pub use record::{EntityRef, Record};
pub use relation::{RelationSpec, RelationVariant};
pub use status::{StatusField, StatusMode, Transition, resolve_transition};
pub use validation::{FieldRule, ValidationErrors};
