//! Error types for dwca-core

use crate::validate::ValidationReport;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dwca-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// The vocabulary source is missing or corrupt
    #[error("failed to load vocabulary '{source_name}': {message}")]
    VocabularyLoad {
        source_name: String,
        message: String,
    },

    /// A field name is not part of the controlled vocabulary
    #[error("unknown term '{term}' for row type {row_type}")]
    UnknownTerm { row_type: String, term: String },

    /// A row type name or URI that the registry does not know
    #[error("unknown row type '{0}'")]
    UnknownRowType(String),

    /// No key was declared and the row type has no default
    #[error("no key declared for row type {row_type} and none can be inferred")]
    MissingKey { row_type: String },

    /// A declared key column does not exist in the table
    #[error("key column '{column}' not found in {row_type} table")]
    KeyColumnNotFound { row_type: String, column: String },

    /// A key column cannot be dropped from its table
    #[error("column '{column}' is a key of the {row_type} table and cannot be removed")]
    ProtectedColumn { row_type: String, column: String },

    /// Two columns resolve to the same name
    #[error("duplicate column '{column}' in {row_type} table")]
    DuplicateColumn { row_type: String, column: String },

    /// A header cell is blank
    #[error("blank column header at index {index} in '{source_name}'")]
    BlankColumn { source_name: String, index: usize },

    /// No input can be identified as the core table
    #[error("cannot infer core table from inputs [{}]; expected an event or occurrence file", .inputs.join(", "))]
    AmbiguousCore { inputs: Vec<String> },

    /// An archive holds at most one extension per row type
    #[error("archive already has a {0} extension")]
    DuplicateExtension(String),

    /// An extension's foreign key does not line up with the core key
    #[error("{row_type} extension links {found} column(s) but the core key has {expected}")]
    ForeignKeyMismatch {
        row_type: String,
        expected: usize,
        found: usize,
    },

    /// Base and delta archives have different core row types
    #[error("core row type mismatch: base is {base}, delta is {delta}")]
    CoreMismatch { base: String, delta: String },

    /// Key validation found defects
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    /// The descriptor document is inconsistent with the data
    #[error("descriptor error: {0}")]
    Descriptor(String),

    /// A CSV dialect setting cannot be used
    #[error("invalid CSV dialect: {0}")]
    Dialect(String),

    /// The post-processing hook rejected the archive
    #[error("post-processing failed: {0}")]
    PostProcess(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// meta.xml could not be read or written
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Zip container error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
