//! Wavefront OBJ reader.
//!
//! Parsing is done by `tobj`, which fan-triangulates polygons and resolves
//! relative indices. Every model in the file is merged into one mesh;
//! materials are ignored.

use std::io::BufRead;

use log::debug;

use super::finite_point;
use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

/// Parse OBJ text into an indexed mesh.
pub fn parse_obj<R: BufRead>(mut reader: R) -> Result<Mesh> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj_buf(&mut reader, &options, |_| Ok(Default::default()))
        .map_err(|e| MeshError::InvalidContent(format!("OBJ: {e}")))?;

    let mut mesh = Mesh::new();
    for model in &models {
        let base = mesh.vertices.len() as u32;
        let positions = &model.mesh.positions;

        for chunk in positions.chunks_exact(3) {
            let coords = [f64::from(chunk[0]), f64::from(chunk[1]), f64::from(chunk[2])];
            let point = finite_point(coords).ok_or_else(|| {
                MeshError::InvalidContent(format!(
                    "OBJ model '{}': non-finite vertex {:?}",
                    model.name, coords
                ))
            })?;
            mesh.vertices.push(point);
        }

        let local_count = positions.len() / 3;
        for face in model.mesh.indices.chunks_exact(3) {
            if let Some(&bad) = face.iter().find(|&&i| i as usize >= local_count) {
                return Err(MeshError::InvalidContent(format!(
                    "OBJ model '{}': vertex index {} out of range",
                    model.name,
                    bad + 1
                )));
            }
            mesh.faces.push([base + face[0], base + face[1], base + face[2]]);
        }
        debug!(
            "OBJ model '{}': {} vertices, {} faces",
            model.name,
            local_count,
            model.mesh.indices.len() / 3
        );
    }

    Ok(mesh)
}
