//! Configuration collection form.
//!
//! A pure, client-side validation state machine over the config fields the
//! question generator emitted. Required fields block submission until they
//! hold a valid value; optional fields validate only when non-empty. The
//! form never touches the network.

use crate::question::{ConfigField, ConfigFieldType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A field-level validation failure. Never escapes the form.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldError {
    #[error("A value is required")]
    Required,
    #[error("Must be a URL starting with http:// or https://")]
    InvalidUrl,
    #[error("Must be an email address like name@example.com")]
    InvalidEmail,
    #[error("Must be a number")]
    InvalidNumber,
}

/// Validation state machine over a fixed set of configuration fields.
#[derive(Debug, Clone)]
pub struct ConfigForm {
    fields: Vec<ConfigField>,
    values: BTreeMap<String, String>,
}

impl ConfigForm {
    /// Creates a form over the given field set.
    pub fn new(fields: Vec<ConfigField>) -> Self {
        Self {
            fields,
            values: BTreeMap::new(),
        }
    }

    /// Returns true when the form has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in display order: required first, then optional, preserving
    /// relative order within each partition. Validation is identical for
    /// both partitions.
    pub fn ordered_fields(&self) -> Vec<&ConfigField> {
        let required = self.fields.iter().filter(|f| f.required);
        let optional = self.fields.iter().filter(|f| !f.required);
        required.chain(optional).collect()
    }

    /// Records a value for a field. Unknown ids are ignored.
    pub fn set_value(&mut self, id: &str, value: impl Into<String>) {
        if self.fields.iter().any(|f| f.id == id) {
            self.values.insert(id.to_string(), value.into());
        }
    }

    /// Returns the currently recorded value for a field, if any.
    pub fn value(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    /// Validates a single field against its type and required flag.
    pub fn validate_field(&self, field: &ConfigField) -> Result<(), FieldError> {
        let value = self.value(&field.id).unwrap_or("").trim();

        if value.is_empty() {
            return if field.required {
                Err(FieldError::Required)
            } else {
                Ok(())
            };
        }

        match field.field_type {
            ConfigFieldType::Url => validate_url(value),
            ConfigFieldType::Email => validate_email(value),
            ConfigFieldType::Number => validate_number(value),
            ConfigFieldType::Text | ConfigFieldType::Password => Ok(()),
        }
    }

    /// Returns true when every field validates clean.
    pub fn is_complete(&self) -> bool {
        self.fields
            .iter()
            .all(|field| self.validate_field(field).is_ok())
    }

    /// Returns true when the user may skip the form entirely (every field
    /// is optional). Skipping yields an empty value map.
    pub fn can_skip(&self) -> bool {
        self.fields.iter().all(|f| !f.required)
    }

    /// Produces the flat `id -> value` map, or every outstanding field
    /// error. Optional fields left empty are omitted from the map.
    pub fn submit(&self) -> Result<BTreeMap<String, String>, Vec<(String, FieldError)>> {
        let errors: Vec<(String, FieldError)> = self
            .fields
            .iter()
            .filter_map(|field| {
                self.validate_field(field)
                    .err()
                    .map(|e| (field.id.clone(), e))
            })
            .collect();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(self
            .values
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.trim().to_string()))
            .collect())
    }
}

fn validate_url(value: &str) -> Result<(), FieldError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => Ok(()),
        _ => Err(FieldError::InvalidUrl),
    }
}

fn validate_email(value: &str) -> Result<(), FieldError> {
    if value.contains(char::is_whitespace) {
        return Err(FieldError::InvalidEmail);
    }
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    let domain_ok = {
        let (host, tld) = match domain.rsplit_once('.') {
            Some(split) => split,
            None => return Err(FieldError::InvalidEmail),
        };
        !host.is_empty() && !tld.is_empty()
    };
    if local.is_empty() || !domain_ok {
        return Err(FieldError::InvalidEmail);
    }
    Ok(())
}

fn validate_number(value: &str) -> Result<(), FieldError> {
    value
        .parse::<f64>()
        .map(|_| ())
        .map_err(|_| FieldError::InvalidNumber)
}
