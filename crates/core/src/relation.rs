//! Named relations between record types and their query variants.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filter applied on top of a relation's base query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationVariant {
    /// `deleted = false AND archived = false`. Cascades only walk this one.
    #[default]
    Active,
    /// `deleted = true AND archived = false`.
    Deleted,
    /// `deleted = false AND archived = true`.
    Archived,
    /// No status filter.
    All,
}

impl RelationVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
            Self::Archived => "archived",
            Self::All => "all",
        }
    }

    /// Whether a row with these status values belongs to the variant.
    /// Columns a type does not declare count as `false`.
    pub fn matches(&self, deleted: Option<bool>, archived: Option<bool>) -> bool {
        let deleted = deleted.unwrap_or(false);
        let archived = archived.unwrap_or(false);
        match self {
            Self::Active => !deleted && !archived,
            Self::Deleted => deleted && !archived,
            Self::Archived => !deleted && archived,
            Self::All => true,
        }
    }

    pub fn matches_record(&self, record: &Record) -> bool {
        self.matches(record.deleted, record.archived)
    }

    /// Accessor name for a relation under this variant:
    /// `items`, `deletedItems`, `archivedItems`, `allItems`.
    pub fn accessor(&self, relation: &str) -> String {
        let prefix = match self {
            Self::Active => return relation.to_string(),
            Self::Deleted => "deleted",
            Self::Archived => "archived",
            Self::All => "all",
        };
        let mut chars = relation.chars();
        match chars.next() {
            Some(first) => format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
            None => prefix.to_string(),
        }
    }

    /// Decode an accessor name into its variant and base relation name.
    ///
    /// Names that do not start with a variant prefix followed by an
    /// uppercase letter are the active variant of themselves.
    pub fn from_accessor(accessor: &str) -> (RelationVariant, String) {
        for variant in [Self::Deleted, Self::Archived, Self::All] {
            let prefix = variant.as_str();
            if let Some(rest) = accessor.strip_prefix(prefix) {
                let mut chars = rest.chars();
                if let Some(first) = chars.next().filter(|c| c.is_uppercase()) {
                    let base = format!("{}{}", first.to_lowercase(), chars.as_str());
                    return (variant, base);
                }
            }
        }
        (Self::Active, accessor.to_string())
    }
}

impl fmt::Display for RelationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationVariant {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            "archived" => Ok(Self::Archived),
            "all" => Ok(Self::All),
            other => Err(crate::Error::InvalidCatalog(format!(
                "unknown relation variant: {other}"
            ))),
        }
    }
}

/// One named edge from a record type to its dependent records.
///
/// Dependents are the `target` rows whose `foreign_key` attribute equals the
/// parent's id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub name: String,
    pub target: String,
    pub foreign_key: String,
}

impl RelationSpec {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Whether `dependent` is reached from `parent` through this relation,
    /// ignoring status filters. The foreign key must hold a JSON integer.
    pub fn links(&self, parent: &Record, dependent: &Record) -> bool {
        dependent.entity_type == self.target
            && dependent
                .attribute(&self.foreign_key)
                .and_then(|v| v.as_i64())
                == Some(parent.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_filters() {
        assert!(RelationVariant::Active.matches(Some(false), Some(false)));
        assert!(RelationVariant::Active.matches(None, None));
        assert!(!RelationVariant::Active.matches(Some(true), Some(false)));
        assert!(RelationVariant::Deleted.matches(Some(true), Some(false)));
        assert!(!RelationVariant::Deleted.matches(Some(true), Some(true)));
        assert!(RelationVariant::Archived.matches(Some(false), Some(true)));
        assert!(RelationVariant::All.matches(Some(true), Some(true)));
    }

    #[test]
    fn test_accessor_names() {
        assert_eq!(RelationVariant::Active.accessor("items"), "items");
        assert_eq!(RelationVariant::Deleted.accessor("items"), "deletedItems");
        assert_eq!(RelationVariant::Archived.accessor("items"), "archivedItems");
        assert_eq!(RelationVariant::All.accessor("items"), "allItems");
    }

    #[test]
    fn test_from_accessor() {
        assert_eq!(
            RelationVariant::from_accessor("deletedItems"),
            (RelationVariant::Deleted, "items".to_string())
        );
        assert_eq!(
            RelationVariant::from_accessor("allItems"),
            (RelationVariant::All, "items".to_string())
        );
        // "allocations" starts with "all" but is a relation of its own.
        assert_eq!(
            RelationVariant::from_accessor("allocations"),
            (RelationVariant::Active, "allocations".to_string())
        );
    }

    #[test]
    fn test_relation_links_by_foreign_key() {
        let relation = RelationSpec::new("items", "order_items", "order_id");
        let order = Record::new("orders", 1);
        let item = Record::new("order_items", 10).with_attribute("order_id", 1);
        let other = Record::new("order_items", 11).with_attribute("order_id", 2);
        assert!(relation.links(&order, &item));
        assert!(!relation.links(&order, &other));
    }

    #[test]
    fn test_relation_links_need_integer_key() {
        let relation = RelationSpec::new("items", "order_items", "order_id");
        let order = Record::new("orders", 1);
        let text = Record::new("order_items", 10).with_attribute("order_id", "1");
        let float = Record::new("order_items", 11).with_attribute("order_id", 1.5);
        assert!(!relation.links(&order, &text));
        assert!(!relation.links(&order, &float));
    }
}
