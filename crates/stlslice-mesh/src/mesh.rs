//! Indexed triangle mesh and its derived properties.

use stlslice_math::{Point3, Vec3};

use crate::adjacency::MeshAdjacency;

/// Units tag assigned to meshes whose source format carries none.
pub const DEFAULT_UNITS: &str = "mm";

/// An indexed triangle mesh.
///
/// Vertices live in one array and faces refer to them by index, so shared
/// vertices and adjacency are plain integers rather than references.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangles as counter-clockwise (outward facing) vertex index triples.
    pub faces: Vec<[u32; 3]>,
    /// Length units of the vertex coordinates.
    pub units: String,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb {
    /// Size along each axis.
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Mesh {
    /// Create an empty mesh in the default units.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            units: DEFAULT_UNITS.to_string(),
        }
    }

    /// Create a mesh from vertices and faces in the default units.
    pub fn from_parts(vertices: Vec<Point3>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            units: DEFAULT_UNITS.to_string(),
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// The three corner positions of face `index`.
    pub fn triangle(&self, index: usize) -> [Point3; 3] {
        let [a, b, c] = self.faces[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Iterate over all triangles as corner positions.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        (0..self.faces.len()).map(move |i| self.triangle(i))
    }

    /// Bounding box of the vertices referenced by faces.
    ///
    /// Returns `None` for a mesh without faces.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut iter = self.faces.iter().flatten().map(|&i| self.vertices[i as usize]);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (
                Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
                Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
            )
        });
        Some(Aabb { min, max })
    }

    /// Area-weighted centroid of the surface.
    ///
    /// Falls back to the mean of referenced vertices when every face has
    /// zero area. Returns `None` for a mesh without faces.
    pub fn centroid(&self) -> Option<Point3> {
        if self.faces.is_empty() {
            return None;
        }

        let mut weighted = Vec3::zeros();
        let mut total_area = 0.0;
        for [a, b, c] in self.triangles() {
            let area = (b - a).cross(&(c - a)).norm() * 0.5;
            let center = (a.coords + b.coords + c.coords) / 3.0;
            weighted += center * area;
            total_area += area;
        }

        if total_area > f64::EPSILON {
            return Some(Point3::from(weighted / total_area));
        }

        let count = (self.faces.len() * 3) as f64;
        let sum = self
            .faces
            .iter()
            .flatten()
            .fold(Vec3::zeros(), |acc, &i| acc + self.vertices[i as usize].coords);
        Some(Point3::from(sum / count))
    }

    /// Total surface area.
    pub fn area(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| (b - a).cross(&(c - a)).norm() * 0.5)
            .sum()
    }

    /// Signed enclosed volume (positive when faces wind outward).
    ///
    /// Only meaningful for closed meshes.
    pub fn signed_volume(&self) -> f64 {
        signed_volume_of(self, 0..self.faces.len())
    }

    /// True when every edge is shared by exactly two faces that traverse it
    /// in opposite directions.
    pub fn is_watertight(&self) -> bool {
        !self.faces.is_empty() && MeshAdjacency::build(&self.faces).is_watertight()
    }

    /// Reverse the winding of face `index`.
    pub fn flip_face(&mut self, index: usize) {
        self.faces[index].swap(1, 2);
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed volume of a subset of faces (divergence theorem).
pub(crate) fn signed_volume_of(mesh: &Mesh, faces: impl IntoIterator<Item = usize>) -> f64 {
    faces
        .into_iter()
        .map(|i| {
            let [a, b, c] = mesh.triangle(i);
            a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
        })
        .sum()
}

/// Axis-aligned box `[0, size]^3` with outward winding.
///
/// Test fixture shared across the workspace.
#[doc(hidden)]
pub fn cube(size: f64) -> Mesh {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(size, 0.0, 0.0),
        Point3::new(size, size, 0.0),
        Point3::new(0.0, size, 0.0),
        Point3::new(0.0, 0.0, size),
        Point3::new(size, 0.0, size),
        Point3::new(size, size, size),
        Point3::new(0.0, size, size),
    ];
    #[rustfmt::skip]
    let faces = vec![
        // Bottom (-Z)
        [0, 2, 1], [0, 3, 2],
        // Top (+Z)
        [4, 5, 6], [4, 6, 7],
        // Front (-Y)
        [0, 1, 5], [0, 5, 4],
        // Back (+Y)
        [2, 3, 7], [2, 7, 6],
        // Left (-X)
        [0, 4, 7], [0, 7, 3],
        // Right (+X)
        [1, 2, 6], [1, 6, 5],
    ];
    Mesh::from_parts(vertices, faces)
}

/// Every face of `mesh` on its own three vertices, as an STL file stores it.
#[doc(hidden)]
pub fn unwelded(mesh: &Mesh) -> Mesh {
    let mut vertices = Vec::with_capacity(mesh.faces.len() * 3);
    let mut faces = Vec::with_capacity(mesh.faces.len());
    for tri in mesh.triangles() {
        let base = vertices.len() as u32;
        vertices.extend_from_slice(&tri);
        faces.push([base, base + 1, base + 2]);
    }
    Mesh {
        vertices,
        faces,
        units: mesh.units.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_bounds() {
        let mesh = cube(10.0);
        let bounds = mesh.bounds().unwrap();
        assert!((bounds.min - Point3::origin()).norm() < 1e-12);
        assert!((bounds.max - Point3::new(10.0, 10.0, 10.0)).norm() < 1e-12);
        assert!((bounds.extents().z - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_cube_centroid_and_volume() {
        let mesh = cube(2.0);
        let c = mesh.centroid().unwrap();
        assert!((c - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        assert!((mesh.signed_volume() - 8.0).abs() < 1e-12);
        assert!((mesh.area() - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_cube_is_watertight() {
        assert!(cube(1.0).is_watertight());
    }

    #[test]
    fn test_flipped_face_breaks_watertight() {
        let mut mesh = cube(1.0);
        mesh.flip_face(3);
        assert!(!mesh.is_watertight());
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert!(mesh.bounds().is_none());
        assert!(mesh.centroid().is_none());
        assert!(!mesh.is_watertight());
        assert_eq!(mesh.units, "mm");
    }

    #[test]
    fn test_bounds_ignore_unreferenced_vertices() {
        let mut mesh = cube(1.0);
        mesh.vertices.push(Point3::new(100.0, 100.0, 100.0));
        let bounds = mesh.bounds().unwrap();
        assert!((bounds.max.x - 1.0).abs() < 1e-12);
    }
}
