//! Error types for mesh loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh file does not exist.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// The file extension does not name a supported mesh format.
    #[error(
        "unsupported mesh format: .{extension} (supported: {})",
        crate::io::SUPPORTED_EXTENSIONS.join(", ")
    )]
    UnsupportedFormat {
        /// The unrecognized extension.
        extension: String,
    },

    /// The file content could not be parsed.
    #[error("invalid mesh content: {0}")]
    InvalidContent(String),

    /// The file parsed but holds no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A numeric field failed to parse.
    #[error("float parsing error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
