//! Persisted records and their identities.

use crate::error::{Error, Result};
use crate::status::StatusField;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Identity of a record: its collection plus its id within that collection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

impl FromStr for EntityRef {
    type Err = Error;

    /// Parse the `entity_type#id` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let (entity_type, id) = s
            .rsplit_once('#')
            .ok_or_else(|| Error::InvalidEntityRef(format!("missing '#' in {s:?}")))?;
        if entity_type.is_empty() {
            return Err(Error::InvalidEntityRef(format!("empty entity type in {s:?}")));
        }
        let id = id
            .parse::<i64>()
            .map_err(|e| Error::InvalidEntityRef(format!("bad id in {s:?}: {e}")))?;
        Ok(Self::new(entity_type, id))
    }
}

/// One persisted entity instance.
///
/// `deleted` and `archived` are `None` when the record's type never declared
/// the column, which is what makes a type "not status capable".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_type: String,
    pub id: i64,
    pub deleted: Option<bool>,
    pub archived: Option<bool>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Record {
    /// Create an active record that declares both status columns.
    pub fn new(entity_type: impl Into<String>, id: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            entity_type: entity_type.into(),
            id,
            deleted: Some(false),
            archived: Some(false),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a record whose type has no status columns at all.
    pub fn without_status(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            deleted: None,
            archived: None,
            ..Self::new(entity_type, id)
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.id)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Current value of a status column, `None` if the type lacks it.
    pub fn status(&self, field: StatusField) -> Option<bool> {
        match field {
            StatusField::Deleted => self.deleted,
            StatusField::Archived => self.archived,
        }
    }

    /// Set a status column. Fails if the record's type never declared it.
    pub fn set_status(&mut self, field: StatusField, value: bool) -> Result<()> {
        let slot = match field {
            StatusField::Deleted => &mut self.deleted,
            StatusField::Archived => &mut self.archived,
        };
        match slot {
            Some(current) => {
                *current = value;
                Ok(())
            }
            None => Err(Error::MissingStatusField {
                entity: format!("{}#{}", self.entity_type, self.id),
                field: field.to_string(),
            }),
        }
    }

    /// Put a declared status column back to `false`. Undeclared columns stay
    /// absent.
    pub fn reset_status(&mut self, field: StatusField) {
        let slot = match field {
            StatusField::Deleted => &mut self.deleted,
            StatusField::Archived => &mut self.archived,
        };
        if let Some(current) = slot {
            *current = false;
        }
    }
}
