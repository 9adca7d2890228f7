//! Edge-to-face adjacency for indexed meshes.

use std::collections::HashMap;

/// Undirected edge key with the smaller index first.
pub type EdgeKey = (u32, u32);

/// Normalize an edge so the smaller index comes first.
pub fn edge_key(a: u32, b: u32) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// True if `face` traverses the directed edge `a -> b`.
pub fn has_directed_edge(face: &[u32; 3], a: u32, b: u32) -> bool {
    (0..3).any(|i| face[i] == a && face[(i + 1) % 3] == b)
}

/// Edge adjacency of a face list.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    /// Faces incident to each undirected edge.
    pub edge_to_faces: HashMap<EdgeKey, Vec<usize>>,
    /// Number of faces traversing each directed edge.
    pub directed: HashMap<(u32, u32), u32>,
}

impl MeshAdjacency {
    /// Build adjacency for `faces`.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        let mut directed: HashMap<(u32, u32), u32> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                edge_to_faces.entry(edge_key(a, b)).or_default().push(face_idx);
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }

        Self {
            edge_to_faces,
            directed,
        }
    }

    /// Faces sharing the undirected edge `a`-`b`.
    pub fn faces_of_edge(&self, a: u32, b: u32) -> &[usize] {
        self.edge_to_faces
            .get(&edge_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Directed edges that belong to exactly one face, as that face traverses them.
    ///
    /// Sorted so hole tracing is deterministic.
    pub fn boundary_edges(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<(u32, u32)> = self
            .directed
            .iter()
            .filter(|&(&(a, b), _)| {
                self.edge_to_faces
                    .get(&edge_key(a, b))
                    .is_some_and(|faces| faces.len() == 1)
            })
            .map(|(&edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Number of edges shared by more than two faces.
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|f| f.len() > 2).count()
    }

    /// True when every edge has exactly two faces traversing it in opposite
    /// directions.
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.iter().all(|(&(a, b), faces)| {
            faces.len() == 2
                && self.directed.get(&(a, b)) == Some(&1)
                && self.directed.get(&(b, a)) == Some(&1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cube;

    #[test]
    fn test_cube_adjacency() {
        let mesh = cube(1.0);
        let adj = MeshAdjacency::build(&mesh.faces);
        // 12 box edges + 6 face diagonals
        assert_eq!(adj.edge_to_faces.len(), 18);
        assert!(adj.boundary_edges().is_empty());
        assert_eq!(adj.non_manifold_edge_count(), 0);
        assert!(adj.is_watertight());
    }

    #[test]
    fn test_single_triangle_boundary() {
        let adj = MeshAdjacency::build(&[[0, 1, 2]]);
        assert_eq!(adj.boundary_edges(), vec![(0, 1), (1, 2), (2, 0)]);
        assert!(!adj.is_watertight());
        assert_eq!(adj.faces_of_edge(2, 1), &[0]);
        assert!(adj.faces_of_edge(0, 5).is_empty());
    }

    #[test]
    fn test_inconsistent_winding_not_watertight() {
        // Two triangles sharing edge 1-2 in the same direction
        let adj = MeshAdjacency::build(&[[0, 1, 2], [3, 1, 2]]);
        assert_eq!(adj.faces_of_edge(1, 2).len(), 2);
        assert!(!adj.is_watertight());
    }

    #[test]
    fn test_has_directed_edge() {
        let face = [4, 7, 9];
        assert!(has_directed_edge(&face, 4, 7));
        assert!(has_directed_edge(&face, 9, 4));
        assert!(!has_directed_edge(&face, 7, 4));
    }
}
