//! Error types for the export pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Two configured export nodes are in an ancestor/descendant relationship.
    #[error(
        "{first} and {second} are ancestors or descendants of each other. \
         Please specify export paths that don't overlap"
    )]
    OverlappingRoots { first: String, second: String },

    /// Append mode was requested for a package destination.
    #[error("Cannot append to USDZ packages")]
    AppendToPackage,

    /// The generated temporary layer name is already taken.
    #[error("Temporary stage '{0}' already exists")]
    TempLayerExists(PathBuf),

    /// Export roots were configured but nothing below them was written.
    #[error("Given export root was neither a parent or child of any of the items to export")]
    RootsDoNotIntersect,

    /// Export roots cannot be combined with modeling variants.
    #[error("Export roots can't be used together with export to modeling variant")]
    ExportRootsWithModelingVariant,

    /// Two source nodes were mapped onto the same prim path.
    #[error("Multiple nodes map to the same prim path {path} after stripping namespaces: {first} - {second}")]
    NameClash {
        path: String,
        first: String,
        second: String,
    },

    /// Model kind assignment failed.
    #[error("Model hierarchy error: {0}")]
    ModelHierarchy(String),

    /// A chaser hook reported failure.
    #[error("Chaser '{name}' failed in {hook}")]
    ChaserFailed { name: String, hook: &'static str },

    /// Post-processing (instancing, skeleton fixups) failed.
    #[error("Post-process failed: {0}")]
    PostProcess(String),

    /// A prim writer failed to author its data.
    #[error("Prim writer for {node} failed: {message}")]
    WriterFailed { node: String, message: String },

    /// The package could not be assembled.
    #[error("Could not create package '{package}': {message}")]
    Package { package: PathBuf, message: String },

    /// Malformed prim path.
    #[error("Invalid prim path: {0}")]
    InvalidPath(String),

    /// No prim at the given path.
    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    /// Authoring through an edit target that cannot map the path.
    #[error("Edit target error: {0}")]
    EditTarget(String),

    /// Text layer parse failure.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Binary layer is malformed or truncated.
    #[error("Invalid layer: {0}")]
    InvalidLayer(String),

    /// Unknown option token.
    #[error("Invalid value '{value}' for option {option}")]
    InvalidOption { option: &'static str, value: String },

    /// Zip archive error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid layer error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidLayer(msg.into())
    }

    /// Create a writer failure for the given node.
    pub fn writer(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::WriterFailed {
            node: node.into(),
            message: msg.into(),
        }
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, Error>;
