use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod config;
pub mod highlight;
pub mod persist;
pub mod spread;
pub mod store;
pub mod tokenizer;

pub use analysis::{Analysis, TermEntry, TermMap, TermPredicate};
pub use config::{FieldSpec, IndexConfig};
pub use spread::Spread;
pub use store::{DocumentSource, IndexConfigSource, MemoryStore};

/// Opaque document identifier, unique within a scope.
pub type DocId = String;

/// Field name to value. Only string values are ever tokenized.
pub type Fields = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<DocId>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }

    /// Text of a field, if present and a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }
}
