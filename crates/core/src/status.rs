//! Status transitions applied by a cascade.
//!
//! A record moves from active to deleted and never back, except through the
//! compensation a failed cascade performs on its own trail.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boolean status column a transition toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusField {
    Deleted,
    Archived,
}

impl StatusField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for StatusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition modes a cascade can be asked to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusMode {
    /// Mark the record and its active dependents deleted.
    Deleting,
    /// Declared for archive support; not resolvable yet.
    Archiving,
}

impl StatusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleting => "deleting",
            Self::Archiving => "archiving",
        }
    }
}

impl fmt::Display for StatusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deleting" => Ok(Self::Deleting),
            "archiving" => Ok(Self::Archiving),
            other => Err(Error::UnknownTransitionMode(other.to_string())),
        }
    }
}

/// A resolved transition: which field to set and how the ledger books it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub status_field: StatusField,
    pub in_archive: bool,
}

/// Resolve a mode into the field it toggles.
///
/// Only [`StatusMode::Deleting`] is wired up. [`StatusMode::Archiving`] fails
/// with [`Error::UnknownTransitionMode`] instead of silently doing nothing.
pub fn resolve_transition(mode: StatusMode) -> Result<Transition> {
    match mode {
        StatusMode::Deleting => Ok(Transition {
            status_field: StatusField::Deleted,
            in_archive: false,
        }),
        StatusMode::Archiving => Err(Error::UnknownTransitionMode(mode.to_string())),
    }
}
