//! Mesh file loading.

mod obj;
mod stl;

pub use obj::parse_obj;
pub use stl::parse_stl;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use stlslice_math::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::{Mesh, DEFAULT_UNITS};

/// Mesh formats recognized by [`load`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["stl", "obj"];

/// A point from parsed coordinates, or `None` if any of them is NaN or
/// infinite.
pub(crate) fn finite_point(coords: [f64; 3]) -> Option<Point3> {
    coords
        .iter()
        .all(|c| c.is_finite())
        .then(|| Point3::new(coords[0], coords[1], coords[2]))
}

/// Load a mesh, choosing the parser from the file extension.
///
/// The returned mesh is tagged with millimetre units. STL files come back as
/// a triangle soup; weld them before checking watertightness.
pub fn load(path: impl AsRef<Path>) -> Result<Mesh> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MeshError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mut mesh = match extension.as_str() {
        "stl" => parse_stl(&std::fs::read(path)?)?,
        "obj" => parse_obj(BufReader::new(File::open(path)?))?,
        _ => return Err(MeshError::UnsupportedFormat { extension }),
    };

    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    mesh.units = DEFAULT_UNITS.to_string();
    info!(
        "Loaded {} ({} vertices, {} faces), units set to {}",
        path.display(),
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.units
    );
    Ok(mesh)
}
