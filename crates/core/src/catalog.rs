//! Static registration of record types, their relations and rules.
//!
//! The catalog is read-only once built. It replaces any runtime discovery of
//! relations: traversal order is exactly the declaration order here.

use crate::error::{Error, Result};
use crate::record::Record;
use crate::relation::{RelationSpec, RelationVariant};
use crate::status::StatusField;
use crate::validation::{FieldRule, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

fn default_true() -> bool {
    true
}

/// Declaration of one record type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: String,
    /// Whether the type declares a `deleted` column.
    #[serde(default = "default_true")]
    pub deleted: bool,
    /// Whether the type declares an `archived` column.
    #[serde(default = "default_true")]
    pub archived: bool,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
    #[serde(default)]
    pub rules: Vec<FieldRule>,
}

impl EntitySchema {
    /// A type with both status columns and no relations.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            deleted: true,
            archived: true,
            relations: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Drop both status columns from the declaration.
    pub fn without_status(mut self) -> Self {
        self.deleted = false;
        self.archived = false;
        self
    }

    pub fn relation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationSpec::new(name, target, foreign_key));
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn has_status(&self, field: StatusField) -> bool {
        match field {
            StatusField::Deleted => self.deleted,
            StatusField::Archived => self.archived,
        }
    }

    /// Align `record`'s status columns with this schema: declared columns
    /// default to `false`, undeclared ones are dropped. A set flag on an
    /// undeclared column fails with [`Error::MissingStatusField`].
    pub fn conform(&self, record: &mut Record) -> Result<()> {
        for field in [StatusField::Deleted, StatusField::Archived] {
            let declared = self.has_status(field);
            let current = record.status(field);
            if !declared && current == Some(true) {
                return Err(Error::MissingStatusField {
                    entity: record.entity_ref().to_string(),
                    field: field.to_string(),
                });
            }
            let aligned = declared.then(|| current.unwrap_or(false));
            match field {
                StatusField::Deleted => record.deleted = aligned,
                StatusField::Archived => record.archived = aligned,
            }
        }
        Ok(())
    }

    /// Build a fresh active record shaped by this schema.
    pub fn new_record(&self, id: i64) -> Record {
        let mut record = Record::new(self.entity_type.clone(), id);
        record.deleted = self.deleted.then_some(false);
        record.archived = self.archived.then_some(false);
        record
    }

    /// Run every rule against `record`.
    pub fn validate(&self, record: &Record) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for rule in &self.rules {
            rule.check(record, &mut errors);
        }
        errors.into_result()
    }
}

/// Registry of all known record types.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entities: BTreeMap<String, EntitySchema>,
}

impl Catalog {
    /// Build a catalog, checking that declarations are consistent.
    pub fn new(schemas: impl IntoIterator<Item = EntitySchema>) -> Result<Self> {
        let mut entities = BTreeMap::new();
        for schema in schemas {
            if schema.entity_type.is_empty() {
                return Err(Error::InvalidCatalog("empty entity type".to_string()));
            }
            if entities.contains_key(&schema.entity_type) {
                return Err(Error::InvalidCatalog(format!(
                    "entity type '{}' declared twice",
                    schema.entity_type
                )));
            }
            entities.insert(schema.entity_type.clone(), schema);
        }

        for schema in entities.values() {
            let mut names = HashSet::new();
            for relation in &schema.relations {
                if !names.insert(relation.name.as_str()) {
                    return Err(Error::InvalidCatalog(format!(
                        "relation '{}' declared twice on '{}'",
                        relation.name, schema.entity_type
                    )));
                }
                let (variant, _) = RelationVariant::from_accessor(&relation.name);
                if variant != RelationVariant::Active {
                    return Err(Error::InvalidCatalog(format!(
                        "relation name '{}' on '{}' collides with the {} variant accessor",
                        relation.name, schema.entity_type, variant
                    )));
                }
                if !entities.contains_key(&relation.target) {
                    return Err(Error::InvalidCatalog(format!(
                        "relation '{}' on '{}' targets undeclared type '{}'",
                        relation.name, schema.entity_type, relation.target
                    )));
                }
            }
        }

        Ok(Self { entities })
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntitySchema> {
        self.entities.get(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Relations declared for `entity_type`, in declaration order.
    pub fn relations_of(&self, entity_type: &str) -> &[RelationSpec] {
        self.entities
            .get(entity_type)
            .map(|s| s.relations.as_slice())
            .unwrap_or(&[])
    }

    /// Validate `record` against its type's rules. Unknown types have none.
    pub fn validate(&self, record: &Record) -> std::result::Result<(), ValidationErrors> {
        match self.entities.get(&record.entity_type) {
            Some(schema) => schema.validate(record),
            None => Ok(()),
        }
    }
}
