//! Vertex welding.
//!
//! STL files store every triangle with its own copy of each corner. Welding
//! collapses coincident corners into shared vertices so adjacency and
//! watertightness checks see a connected surface.

use std::collections::HashMap;

use log::debug;
use stlslice_math::Point3;

use crate::mesh::Mesh;

type Cell = (i64, i64, i64);

fn cell_of(p: &Point3, cell_size: f64) -> Cell {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Merge vertices closer than `tolerance` and compact the vertex array.
///
/// Each vertex maps to the first earlier representative found within
/// `tolerance`. Faces that collapse to fewer than three distinct vertices are
/// dropped, as are vertices no face references afterwards. Returns the
/// number of vertices removed.
pub fn merge_vertices(mesh: &mut Mesh, tolerance: f64) -> usize {
    let original = mesh.vertices.len();
    if original == 0 {
        return 0;
    }

    let cell_size = tolerance.max(f64::EPSILON);
    let mut representatives: HashMap<Cell, Vec<u32>> = HashMap::new();
    let mut remap: Vec<u32> = Vec::with_capacity(original);

    for (idx, p) in mesh.vertices.iter().enumerate() {
        let (cx, cy, cz) = cell_of(p, cell_size);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = representatives.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &rep in candidates {
                        if (mesh.vertices[rep as usize] - *p).norm() <= tolerance {
                            found = Some(rep);
                            break 'search;
                        }
                    }
                }
            }
        }

        let target = found.unwrap_or_else(|| {
            let rep = idx as u32;
            representatives.entry((cx, cy, cz)).or_default().push(rep);
            rep
        });
        remap.push(target);
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v as usize];
        }
    }
    let before_faces = mesh.faces.len();
    mesh.faces.retain(|&[a, b, c]| a != b && b != c && a != c);
    let collapsed = before_faces - mesh.faces.len();

    compact(mesh);

    let removed = original - mesh.vertices.len();
    debug!(
        "Welded vertices: {} -> {} ({} collapsed faces dropped)",
        original,
        mesh.vertices.len(),
        collapsed
    );
    removed
}

/// Drop vertices no face references, renumbering faces to match.
fn compact(mesh: &mut Mesh) {
    let mut new_index = vec![u32::MAX; mesh.vertices.len()];
    let mut vertices = Vec::new();

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            let slot = &mut new_index[*v as usize];
            if *slot == u32::MAX {
                *slot = vertices.len() as u32;
                vertices.push(mesh.vertices[*v as usize]);
            }
            *v = *slot;
        }
    }

    mesh.vertices = vertices;
}
