//! Best-effort watertightness repair.
//!
//! [`repair`] runs a fixed policy: check, re-orient faces, fill small holes,
//! re-checking after each step. A mesh that stays open is not an error; the
//! caller records the returned flag and slices the mesh as it is.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};
use stlslice_math::{Plane, Point2, Point3, Vec3};

use crate::adjacency::{has_directed_edge, MeshAdjacency};
use crate::mesh::{signed_volume_of, Mesh};

/// Try to make `mesh` watertight. Returns the final watertight flag.
///
/// Holes bounded by more than `max_hole_edges` edges are left open.
pub fn repair(mesh: &mut Mesh, max_hole_edges: usize) -> bool {
    if mesh.is_watertight() {
        debug!("Mesh is already watertight");
        return true;
    }

    let flipped = fix_normals(mesh);
    debug!("Re-oriented {} faces", flipped);
    if mesh.is_watertight() {
        debug!("Mesh is watertight after fixing normals");
        return true;
    }

    let added = fill_holes(mesh, max_hole_edges);
    debug!("Added {} faces while filling holes", added);
    if mesh.is_watertight() {
        debug!("Mesh is watertight after filling holes");
        return true;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    debug!(
        "Mesh is still not watertight ({} boundary edges, {} non-manifold edges); slicing will proceed on the open mesh",
        adjacency.boundary_edges().len(),
        adjacency.non_manifold_edge_count()
    );
    false
}

/// Fewest faces that can bound a volume (a tetrahedron).
const MIN_CLOSED_FACES: usize = 4;

/// Make adjacent faces agree on winding, then point each component outward.
///
/// Orientation spreads breadth-first across edges shared by exactly two
/// faces. Components whose signed volume comes out negative are flipped as a
/// whole; a component with fewer than four faces encloses nothing and keeps
/// its winding. Returns the number of faces whose winding changed.
pub fn fix_normals(mesh: &mut Mesh) -> usize {
    let face_count = mesh.faces.len();
    if face_count == 0 {
        return 0;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let mut flip = vec![false; face_count];
    let mut visited = vec![false; face_count];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for seed in 0..face_count {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);

        while let Some(face_idx) = queue.pop_front() {
            let face = mesh.faces[face_idx];
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                let shared = adjacency.faces_of_edge(a, b);
                if shared.len() != 2 {
                    continue;
                }
                let Some(&other) = shared.iter().find(|&&f| f != face_idx) else {
                    continue;
                };
                if visited[other] {
                    continue;
                }
                // Consistent neighbours traverse the shared edge in reverse.
                let same_direction = has_directed_edge(&mesh.faces[other], a, b);
                flip[other] = flip[face_idx] ^ same_direction;
                visited[other] = true;
                component.push(other);
                queue.push_back(other);
            }
        }
        components.push(component);
    }

    for (face_idx, &should_flip) in flip.iter().enumerate() {
        if should_flip {
            mesh.flip_face(face_idx);
        }
    }

    for component in components.iter().filter(|c| c.len() >= MIN_CLOSED_FACES) {
        if signed_volume_of(mesh, component.iter().copied()) < 0.0 {
            for &face_idx in component {
                mesh.flip_face(face_idx);
                flip[face_idx] = !flip[face_idx];
            }
        }
    }

    flip.iter().filter(|&&f| f).count()
}

/// A closed loop of boundary vertices, ordered so that new faces traversing
/// it consecutively wind consistently with the surrounding surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Loop vertices in fill order.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges bounding the hole.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Trace hole boundaries.
///
/// Loops that cannot be closed (dangling or non-manifold boundaries) are
/// skipped.
pub fn find_boundary_loops(mesh: &Mesh) -> Vec<BoundaryLoop> {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let boundary = adjacency.boundary_edges();
    if boundary.is_empty() {
        return Vec::new();
    }

    // A fill face must traverse each boundary edge in reverse.
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in &boundary {
        outgoing.entry(b).or_default().push(a);
    }

    let mut used: HashSet<(u32, u32)> = HashSet::new();
    let mut loops = Vec::new();

    for &(a, b) in &boundary {
        if !used.insert((b, a)) {
            continue;
        }
        let start = b;
        let mut vertices = vec![start];
        let mut current = a;
        let mut closed = false;

        for _ in 0..boundary.len() {
            if current == start {
                closed = true;
                break;
            }
            vertices.push(current);
            let next = outgoing
                .get(&current)
                .and_then(|targets| targets.iter().find(|&&t| !used.contains(&(current, t))))
                .copied();
            match next {
                Some(next) => {
                    used.insert((current, next));
                    current = next;
                }
                None => break,
            }
        }

        if closed && vertices.len() >= 3 {
            loops.push(BoundaryLoop { vertices });
        } else {
            warn!("Boundary loop starting at vertex {} is not closed", start);
        }
    }

    loops
}

/// Fill holes bounded by at most `max_hole_edges` edges.
///
/// A loop whose fill would repeat an existing face (the outline of a stray
/// triangle, or of any face in an unwelded soup) is not a hole and stays
/// open. Returns the number of faces added.
pub fn fill_holes(mesh: &mut Mesh, max_hole_edges: usize) -> usize {
    let loops = find_boundary_loops(mesh);
    let mut existing: HashSet<[u32; 3]> = mesh.faces.iter().map(sorted_face).collect();
    debug!(
        "Found {} boundary loops, sizes: {:?}",
        loops.len(),
        loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>()
    );

    let mut added = 0;
    for hole in &loops {
        if hole.edge_count() > max_hole_edges {
            debug!(
                "Skipping hole with {} edges (max: {})",
                hole.edge_count(),
                max_hole_edges
            );
            continue;
        }
        let triangles = triangulate_loop(mesh, hole);
        if triangles.iter().any(|t| existing.contains(&sorted_face(t))) {
            debug!(
                "Skipping {}-edge loop at vertex {}: it outlines an existing face",
                hole.edge_count(),
                hole.vertices[0]
            );
            continue;
        }
        existing.extend(triangles.iter().map(sorted_face));
        added += triangles.len();
        mesh.faces.extend(triangles);
    }
    added
}

fn sorted_face(face: &[u32; 3]) -> [u32; 3] {
    let mut key = *face;
    key.sort_unstable();
    key
}

/// Triangulate a hole by ear clipping in its best-fit plane, falling back to
/// a fan when clipping gets stuck.
fn triangulate_loop(mesh: &Mesh, hole: &BoundaryLoop) -> Vec<[u32; 3]> {
    let n = hole.vertices.len();
    if n == 3 {
        return vec![[hole.vertices[0], hole.vertices[1], hole.vertices[2]]];
    }

    let positions: Vec<Point3> = hole
        .vertices
        .iter()
        .map(|&v| mesh.vertices[v as usize])
        .collect();
    let Some(projected) = project_loop(&positions) else {
        return fan(&hole.vertices);
    };

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let len = remaining.len();
        let ear = (0..len).find(|&i| {
            let prev = remaining[(i + len - 1) % len];
            let curr = remaining[i];
            let next = remaining[(i + 1) % len];
            is_ear(&projected, &remaining, prev, curr, next)
        });

        let Some(i) = ear else {
            warn!(
                "Ear clipping stuck with {} vertices remaining, using fan triangulation",
                remaining.len()
            );
            let rest: Vec<u32> = remaining.iter().map(|&i| hole.vertices[i]).collect();
            triangles.extend(fan(&rest));
            return triangles;
        };

        let prev = remaining[(i + len - 1) % len];
        let next = remaining[(i + 1) % len];
        triangles.push([
            hole.vertices[prev],
            hole.vertices[remaining[i]],
            hole.vertices[next],
        ]);
        remaining.remove(i);
    }

    triangles.push([
        hole.vertices[remaining[0]],
        hole.vertices[remaining[1]],
        hole.vertices[remaining[2]],
    ]);
    triangles
}

fn fan(vertices: &[u32]) -> Vec<[u32; 3]> {
    (1..vertices.len().saturating_sub(1))
        .map(|i| [vertices[0], vertices[i], vertices[i + 1]])
        .collect()
}

/// Project a loop onto the plane given by its Newell normal. The loop winds
/// counter-clockwise in the resulting 2D frame.
fn project_loop(positions: &[Point3]) -> Option<Vec<Point2>> {
    let n = positions.len();
    let mut normal = Vec3::zeros();
    for i in 0..n {
        let p = positions[i];
        let q = positions[(i + 1) % n];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    let centroid = positions.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n as f64;
    let plane = Plane::new(Point3::from(centroid), normal)?;
    Some(positions.iter().map(|p| plane.to_local(p)).collect())
}

fn cross2(o: &Point2, a: &Point2, b: &Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn is_ear(points: &[Point2], remaining: &[usize], prev: usize, curr: usize, next: usize) -> bool {
    let (a, b, c) = (&points[prev], &points[curr], &points[next]);
    if cross2(a, b, c) <= 1e-12 {
        return false;
    }
    remaining
        .iter()
        .filter(|&&i| i != prev && i != curr && i != next)
        .all(|&i| {
            let p = &points[i];
            !(cross2(a, b, p) >= 0.0 && cross2(b, c, p) >= 0.0 && cross2(c, a, p) >= 0.0)
        })
}
