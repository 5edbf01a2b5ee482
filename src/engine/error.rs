use thiserror::Error;

use crate::engine::records::RecordKind;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to serialize {kind} catalog: {source}")]
    Serialize {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse {kind} catalog blob: {source}")]
    Deserialize {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Inline form errors. Any of these blocks a save.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{label} is required")]
    Missing { key: &'static str, label: &'static str },
    #[error("id \"{0}\" is already in use")]
    DuplicateId(String),
    #[error("{label}: \"{input}\" is not a number")]
    NotANumber { key: &'static str, label: &'static str, input: String },
    #[error("{label}: \"{input}\" is not one of {options}")]
    BadChoice { key: &'static str, label: &'static str, input: String, options: String },
    #[error("{label}: cannot read \"{input}\" ({reason})")]
    BadList { key: &'static str, label: &'static str, input: String, reason: String },
    #[error("category \"{category}\" does not belong to item type {item_type}")]
    CategoryMismatch { category: String, item_type: String },
    #[error("unknown field {0}")]
    UnknownField(String),
}

impl ValidationError {
    /// Form field the error belongs to.
    pub fn field_key(&self) -> &str {
        match self {
            ValidationError::Missing { key, .. }
            | ValidationError::NotANumber { key, .. }
            | ValidationError::BadChoice { key, .. }
            | ValidationError::BadList { key, .. } => key,
            ValidationError::DuplicateId(_) => "id",
            ValidationError::CategoryMismatch { .. } => "category",
            ValidationError::UnknownField(key) => key,
        }
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("validation failed: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
    #[error("draft does not match the {kind} record shape: {source}")]
    Shape {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("dev mode is off")]
    DevModeOff,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}
