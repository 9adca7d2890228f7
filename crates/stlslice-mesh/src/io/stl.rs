//! STL reader (ASCII and binary).
//!
//! Binary files are an 80-byte header, a little-endian `u32` triangle count
//! and 50 bytes per triangle. A file is read as binary whenever its size
//! matches that layout, even if the header happens to start with `solid`.

use stlslice_math::Point3;

use super::finite_point;
use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

/// Parse STL bytes into a triangle soup (three fresh vertices per facet).
pub fn parse_stl(bytes: &[u8]) -> Result<Mesh> {
    if is_binary(bytes) {
        return parse_binary(bytes);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| MeshError::InvalidContent("STL is neither valid binary nor ASCII".into()))?;
    if !text.trim_start().starts_with("solid") {
        return Err(MeshError::InvalidContent(
            "STL is neither valid binary nor ASCII".into(),
        ));
    }
    parse_ascii(text)
}

fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    bytes.len() == HEADER_SIZE + 4 + count * TRIANGLE_SIZE
}

fn parse_binary(bytes: &[u8]) -> Result<Mesh> {
    let body = &bytes[HEADER_SIZE + 4..];
    let mut mesh = Mesh::new();
    for (index, chunk) in body.chunks_exact(TRIANGLE_SIZE).enumerate() {
        // Skip the stored normal (12 bytes)
        let base = mesh.vertices.len() as u32;
        for corner in 0..3 {
            let offset = 12 + corner * 12;
            let vertex = read_vertex(&chunk[offset..offset + 12]).ok_or_else(|| {
                MeshError::InvalidContent(format!("triangle {index}: non-finite vertex"))
            })?;
            mesh.vertices.push(vertex);
        }
        mesh.faces.push([base, base + 1, base + 2]);
    }
    Ok(mesh)
}

fn read_vertex(buf: &[u8]) -> Option<Point3> {
    let coord = |i: usize| {
        f64::from(f32::from_le_bytes([
            buf[i * 4],
            buf[i * 4 + 1],
            buf[i * 4 + 2],
            buf[i * 4 + 3],
        ]))
    };
    finite_point([coord(0), coord(1), coord(2)])
}

fn parse_ascii(text: &str) -> Result<Mesh> {
    let mut mesh = Mesh::new();
    let mut corners: Vec<Point3> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("outer") => corners.clear(),
            Some("vertex") => {
                let coords: Vec<f64> = parts.map(str::parse).collect::<std::result::Result<_, _>>()?;
                if coords.len() != 3 {
                    return Err(MeshError::InvalidContent(format!(
                        "line {}: vertex needs 3 coordinates, found {}",
                        line_no + 1,
                        coords.len()
                    )));
                }
                let vertex = finite_point([coords[0], coords[1], coords[2]]).ok_or_else(|| {
                    MeshError::InvalidContent(format!("line {}: non-finite vertex", line_no + 1))
                })?;
                corners.push(vertex);
            }
            Some("endfacet") => {
                if corners.len() != 3 {
                    return Err(MeshError::InvalidContent(format!(
                        "line {}: facet has {} vertices",
                        line_no + 1,
                        corners.len()
                    )));
                }
                let base = mesh.vertices.len() as u32;
                mesh.vertices.append(&mut corners);
                mesh.faces.push([base, base + 1, base + 2]);
            }
            Some("endsolid") => break,
            _ => {}
        }
    }

    Ok(mesh)
}
