//! Error types for slicing and export.

use stlslice_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur while slicing a mesh or exporting its layers.
#[derive(Error, Debug)]
pub enum SliceError {
    /// The mesh could not be loaded.
    #[error("failed to load mesh: {0}")]
    Load(#[from] MeshError),

    /// A parameter was out of range, or an operation needs a loaded mesh.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Export format string names no known format.
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    /// Cross-section has no polyline with at least two points.
    #[error("cross-section has no renderable geometry")]
    NoRenderableGeometry,

    /// I/O error while writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for slicer operations.
pub type Result<T> = std::result::Result<T, SliceError>;
