//! Field catalog and extraction requests

use serde::{Deserialize, Serialize};

/// Type of an extracted field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
}

/// A field exported to the host's rule engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    #[serde(rename = "desc")]
    pub description: String,
}

impl FieldEntry {
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::String,
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A single field extraction request issued by the host
///
/// `field_id` is the position of the field in the extractor's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    field_id: u32,
    field: String,
    value: Option<String>,
}

impl ExtractRequest {
    pub fn new(field_id: u32, field: impl Into<String>) -> Self {
        Self {
            field_id,
            field: field.into(),
            value: None,
        }
    }

    pub fn field_id(&self) -> u32 {
        self.field_id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn take_value(&mut self) -> Option<String> {
        self.value.take()
    }
}
