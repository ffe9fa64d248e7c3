//! Field extractor
//!
//! Answers field queries against previously produced events by decoding the
//! stored bytes again. Nothing is cached between production and extraction.

use crate::decoder::EntryDecoder;
use crate::error::ExtractError;
use tlog_core::FieldEntry;

/// Fields exported to the host's rule engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Uuid,
}

impl Field {
    /// All fields, in catalog order
    pub const ALL: [Field; 2] = [Field::Email, Field::Uuid];

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Field::Email),
            1 => Some(Field::Uuid),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn id(self) -> u32 {
        match self {
            Field::Email => 0,
            Field::Uuid => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Email => "tlog.email",
            Field::Uuid => "tlog.uuid",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Field::Email => "The email value in the Rekor Transparency Log",
            Field::Uuid => "The UUID information of the entry",
        }
    }

    pub fn entry(self) -> FieldEntry {
        FieldEntry::string(self.name(), self.description())
    }
}

/// Field catalog declared to the host
pub fn field_catalog() -> Vec<FieldEntry> {
    Field::ALL.into_iter().map(Field::entry).collect()
}

/// Stateless extractor over stored event payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtractor {
    decoder: EntryDecoder,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a field by catalog id
    pub fn extract_id(&self, event: &[u8], field_id: u32) -> Result<String, ExtractError> {
        let field = Field::from_id(field_id)
            .ok_or_else(|| ExtractError::UnknownField(format!("id {}", field_id)))?;
        self.extract(event, field)
    }

    /// Extract a field by name
    pub fn extract_name(&self, event: &[u8], name: &str) -> Result<String, ExtractError> {
        let field =
            Field::from_name(name).ok_or_else(|| ExtractError::UnknownField(name.to_string()))?;
        self.extract(event, field)
    }

    /// Decode `event` and project `field`.
    ///
    /// An entry without public key content yields an empty value for every
    /// field, including the UUID.
    pub fn extract(&self, event: &[u8], field: Field) -> Result<String, ExtractError> {
        let facts = self.decoder.decode(event)?;
        if !facts.public_key {
            return Ok(String::new());
        }

        Ok(match field {
            Field::Email => facts.email.unwrap_or_default(),
            Field::Uuid => facts.uuid,
        })
    }
}
