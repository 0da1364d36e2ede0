//! Field-level validation run by the persistence layer before a save.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Validation failures keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of messages across all fields.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Flatten into a single message, optionally headed by `title`.
    pub fn human_readable(&self, title: Option<&str>) -> String {
        let messages: Vec<&str> = self
            .0
            .values()
            .flat_map(|messages| messages.iter().map(String::as_str))
            .collect();
        match title {
            Some(title) if messages.is_empty() => title.to_string(),
            Some(title) => format!("{title}\n{}", messages.join(",\n")),
            None => messages.join("\n"),
        }
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join("; ")))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// A rule checked against a record's attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// Attribute must be present, non-null and not an empty string.
    Required { field: String },
    /// String attribute, when present, is at most `max` characters.
    MaxLength { field: String, max: usize },
    /// Attribute, when present and non-null, is an integer.
    Integer { field: String },
}

impl FieldRule {
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field } | Self::MaxLength { field, .. } | Self::Integer { field } => {
                field
            }
        }
    }

    pub fn check(&self, record: &Record, errors: &mut ValidationErrors) {
        let value = record.attribute(self.field());
        match self {
            Self::Required { field } => {
                let missing = match value {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                };
                if missing {
                    errors.add(field, format!("{field} cannot be blank."));
                }
            }
            Self::MaxLength { field, max } => {
                if let Some(Value::String(s)) = value
                    && s.chars().count() > *max
                {
                    errors.add(
                        field,
                        format!("{field} should contain at most {max} characters."),
                    );
                }
            }
            Self::Integer { field } => {
                if let Some(v) = value
                    && !v.is_null()
                    && !v.is_i64()
                    && !v.is_u64()
                {
                    errors.add(field, format!("{field} must be an integer."));
                }
            }
        }
    }
}
