//! Multi-plane sectioning.
//!
//! Every plane in a schedule is intersected with the mesh independently:
//! straddling triangles contribute one segment each, and the segments are
//! chained into polylines in the plane's local 2D frame.
//!
//! Vertices within `plane_tolerance` of a plane are snapped onto it and
//! counted as below, so only the half-space strictly above the plane is
//! "above". A closed mesh therefore yields its full footprint at its lowest
//! Z and nothing at its highest.

use std::collections::{HashMap, VecDeque};

use log::debug;
use rayon::prelude::*;
use serde_json::{Map, Value};
use stlslice_math::{Plane, Point2, Point3, Vec3};
use stlslice_mesh::Mesh;

use crate::error::{Result, SliceError};
use crate::layer::{CrossSection, Polyline2};

/// Numeric tolerances used while sectioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionParams {
    /// Vertices closer than this to a plane lie on it.
    pub plane_tolerance: f64,
    /// Endpoints closer than this are joined when chaining.
    pub chain_tolerance: f64,
}

impl Default for SectionParams {
    fn default() -> Self {
        Self {
            plane_tolerance: 1e-9,
            chain_tolerance: 1e-6,
        }
    }
}

/// Intersect `mesh` with the planes through `origin + h * normal` for each
/// `h` in `heights`.
///
/// The result has one slot per height, in the same order; `None` marks a
/// plane that meets the mesh in nothing of positive length.
pub fn section(
    mesh: &Mesh,
    origin: &Point3,
    normal: &Vec3,
    heights: &[f64],
    params: &SectionParams,
) -> Result<Vec<Option<CrossSection>>> {
    if heights.iter().any(|h| !h.is_finite()) {
        return Err(SliceError::InvalidParameter(
            "plane heights must be finite".into(),
        ));
    }
    if heights.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SliceError::InvalidParameter(
            "plane heights must be strictly increasing".into(),
        ));
    }
    let base = Plane::new(*origin, *normal).ok_or_else(|| {
        SliceError::InvalidParameter("slicing normal must be non-zero".into())
    })?;

    let distances: Vec<f64> = mesh
        .vertices
        .iter()
        .map(|v| base.signed_distance(v))
        .collect();
    let buckets = bucket_faces(mesh, &distances, heights, params.plane_tolerance);

    let sections: Vec<Option<CrossSection>> = heights
        .par_iter()
        .zip(buckets.par_iter())
        .enumerate()
        .map(|(index, (&height, faces))| {
            let plane = base.offset(height);
            let segments: Vec<(Point2, Point2)> = faces
                .iter()
                .filter_map(|&f| {
                    let (a, b) = intersect_face(mesh, &distances, f, height, params.plane_tolerance)?;
                    let (a, b) = (plane.to_local(&a), plane.to_local(&b));
                    ((b - a).norm() > params.chain_tolerance).then_some((a, b))
                })
                .collect();

            if segments.is_empty() {
                return None;
            }

            let segment_count = segments.len();
            let polylines = chain_segments(&segments, params.chain_tolerance);
            Some(CrossSection {
                polylines,
                to_3d: plane.to_3d(),
                metadata: section_metadata(index, height, &plane, segment_count),
            })
        })
        .collect();

    debug!(
        "Sectioned {} planes, {} non-empty",
        sections.len(),
        sections.iter().filter(|s| s.is_some()).count()
    );

    Ok(sections)
}

fn section_metadata(index: usize, height: f64, plane: &Plane, segments: usize) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("index".into(), Value::from(index));
    metadata.insert("height".into(), Value::from(height));
    metadata.insert(
        "plane_origin".into(),
        Value::from(vec![plane.origin.x, plane.origin.y, plane.origin.z]),
    );
    metadata.insert(
        "plane_normal".into(),
        Value::from(vec![plane.normal.x, plane.normal.y, plane.normal.z]),
    );
    metadata.insert("segment_count".into(), Value::from(segments));
    metadata
}

/// For each height, the faces whose extent along the normal can produce a
/// segment there: at least one vertex strictly above and one not above.
fn bucket_faces(mesh: &Mesh, distances: &[f64], heights: &[f64], tol: f64) -> Vec<Vec<usize>> {
    let mut buckets = vec![Vec::new(); heights.len()];
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        let d = face.map(|v| distances[v as usize]);
        let lo = d[0].min(d[1]).min(d[2]);
        let hi = d[0].max(d[1]).max(d[2]);
        let first = heights.partition_point(|&h| h < lo - tol);
        let last = heights.partition_point(|&h| h < hi - tol);
        for bucket in &mut buckets[first..last.max(first)] {
            bucket.push(face_idx);
        }
    }
    buckets
}

/// Where the edge `a`-`b` crosses the plane.
///
/// Always interpolates from the lexicographically smaller endpoint so both
/// faces sharing an edge produce the same point.
fn edge_crossing(a: Point3, da: f64, b: Point3, db: f64) -> Point3 {
    let ((p, dp), (q, dq)) = if (a.x, a.y, a.z) <= (b.x, b.y, b.z) {
        ((a, da), (b, db))
    } else {
        ((b, db), (a, da))
    };
    let t = dp / (dp - dq);
    p + (q - p) * t
}

/// Segment where face `face_idx` crosses the plane at `height`, if any.
fn intersect_face(
    mesh: &Mesh,
    distances: &[f64],
    face_idx: usize,
    height: f64,
    tol: f64,
) -> Option<(Point3, Point3)> {
    let face = mesh.faces[face_idx];
    let corners = mesh.triangle(face_idx);
    let d = face.map(|v| distances[v as usize] - height);

    let above = d.map(|x| x > tol);
    let on = d.map(|x| x.abs() <= tol);
    let above_count = above.iter().filter(|&&a| a).count();
    if above_count == 0 || above_count == 3 {
        return None;
    }

    let mut points: Vec<Point3> = Vec::with_capacity(2);
    for i in 0..3 {
        if on[i] {
            points.push(corners[i]);
        }
    }
    for i in 0..3 {
        let j = (i + 1) % 3;
        let below_i = !above[i] && !on[i];
        let below_j = !above[j] && !on[j];
        if (above[i] && below_j) || (below_i && above[j]) {
            points.push(edge_crossing(corners[i], d[i], corners[j], d[j]));
        }
    }

    match points.as_slice() {
        [a, b] => Some((*a, *b)),
        _ => None,
    }
}

type CellKey = (i64, i64);

/// Spatial hash over segment endpoints.
struct EndpointIndex {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<(usize, bool)>>,
}

impl EndpointIndex {
    fn build(segments: &[(Point2, Point2)], tolerance: f64) -> Self {
        let mut index = Self {
            cell_size: tolerance.max(f64::EPSILON),
            cells: HashMap::new(),
        };
        for (i, (a, b)) in segments.iter().enumerate() {
            let ka = index.key(a);
            let kb = index.key(b);
            index.cells.entry(ka).or_default().push((i, false));
            index.cells.entry(kb).or_default().push((i, true));
        }
        index
    }

    fn key(&self, p: &Point2) -> CellKey {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    /// Unused segment with an endpoint within `tolerance` of `p`.
    ///
    /// Returns the segment index and whether it matched at its end point. The
    /// lowest segment index wins so chaining is deterministic.
    fn find(
        &self,
        p: &Point2,
        segments: &[(Point2, Point2)],
        used: &[bool],
        tolerance: f64,
    ) -> Option<(usize, bool)> {
        let (cx, cy) = self.key(p);
        let mut best: Option<(usize, bool)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(entries) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &(seg, at_end) in entries {
                    if used[seg] {
                        continue;
                    }
                    let (a, b) = &segments[seg];
                    let endpoint = if at_end { b } else { a };
                    if (endpoint - p).norm() <= tolerance && best.map_or(true, |m| (seg, at_end) < m) {
                        best = Some((seg, at_end));
                    }
                }
            }
        }
        best
    }
}

/// Chain segments into polylines by joining endpoints within `tolerance`.
///
/// Each chain grows forward from its seed segment, then backward. A chain
/// whose ends meet becomes a closed polyline without a repeated point.
pub fn chain_segments(segments: &[(Point2, Point2)], tolerance: f64) -> Vec<Polyline2> {
    let index = EndpointIndex::build(segments, tolerance);
    let mut used = vec![false; segments.len()];
    let mut polylines = Vec::new();
    let meets = |a: &Point2, b: &Point2| (a - b).norm() <= tolerance;

    for seed in 0..segments.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let (a, b) = segments[seed];
        let mut chain = VecDeque::from([a, b]);
        let mut closed = false;

        while let Some(back) = chain.back().copied() {
            if chain.len() >= 4 && meets(&back, &chain[0]) {
                closed = true;
                break;
            }
            let Some((seg, at_end)) = index.find(&back, segments, &used, tolerance) else {
                break;
            };
            used[seg] = true;
            let (s0, s1) = segments[seg];
            chain.push_back(if at_end { s0 } else { s1 });
        }

        if !closed {
            while let Some(front) = chain.front().copied() {
                let Some((seg, at_end)) = index.find(&front, segments, &used, tolerance) else {
                    break;
                };
                used[seg] = true;
                let (s0, s1) = segments[seg];
                chain.push_front(if at_end { s0 } else { s1 });
            }
            let back = chain[chain.len() - 1];
            closed = chain.len() >= 4 && meets(&back, &chain[0]);
        }

        if closed {
            chain.pop_back();
        }
        polylines.push(Polyline2 {
            points: chain.into_iter().collect(),
            closed,
        });
    }

    polylines
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stlslice_mesh::cube;

    fn slice_cube(heights: &[f64]) -> Vec<Option<CrossSection>> {
        let origin = Point3::new(5.0, 5.0, 0.0);
        section(&cube(10.0), &origin, &Vec3::z(), heights, &SectionParams::default()).unwrap()
    }

    fn assert_square(section: &CrossSection) {
        assert_eq!(section.polylines.len(), 1);
        let polyline = &section.polylines[0];
        assert!(polyline.closed);
        assert_relative_eq!(polyline.signed_area().abs(), 100.0, epsilon = 1e-9);
        let (min, max) = section.bounds().unwrap();
        assert_relative_eq!(min.x, -5.0, epsilon = 1e-9);
        assert_relative_eq!(max.y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cube_mid_section() {
        let sections = slice_cube(&[5.0]);
        let section = sections[0].as_ref().unwrap();
        assert_square(section);
        assert_eq!(section.metadata["segment_count"], 8);

        // Lifted back into model space, every point sits on z = 5
        for p in section.polyline_3d(0) {
            assert_relative_eq!(p.z, 5.0, epsilon = 1e-12);
            assert!(p.x > -1e-9 && p.x < 10.0 + 1e-9);
        }
    }

    #[test]
    fn test_cube_boundary_planes() {
        let sections = slice_cube(&[0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(sections.len(), 5);
        for section in &sections[..4] {
            assert_square(section.as_ref().unwrap());
        }
        assert!(sections[4].is_none());
    }

    #[test]
    fn test_planes_outside_mesh_are_empty() {
        let sections = slice_cube(&[-3.0, 4.0, 12.0]);
        assert!(sections[0].is_none());
        assert!(sections[1].is_some());
        assert!(sections[2].is_none());
    }

    #[test]
    fn test_heights_must_increase() {
        let origin = Point3::origin();
        let params = SectionParams::default();
        let mesh = cube(1.0);
        for heights in [[0.5, 0.5], [0.7, 0.2]] {
            assert!(matches!(
                section(&mesh, &origin, &Vec3::z(), &heights, &params),
                Err(SliceError::InvalidParameter(_))
            ));
        }
        assert!(section(&mesh, &origin, &Vec3::zeros(), &[0.5], &params).is_err());
        assert!(section(&mesh, &origin, &Vec3::z(), &[], &params).unwrap().is_empty());
    }

    #[test]
    fn test_shared_edge_points_identical() {
        // Both faces sharing the front-wall diagonal must produce the same point
        let mesh = cube(10.0);
        let distances: Vec<f64> = mesh.vertices.iter().map(|v| v.z).collect();
        let (a0, a1) = intersect_face(&mesh, &distances, 4, 3.3, 1e-9).unwrap();
        let (b0, b1) = intersect_face(&mesh, &distances, 5, 3.3, 1e-9).unwrap();
        let shared = [a0, a1].into_iter().filter(|p| *p == b0 || *p == b1).count();
        assert_eq!(shared, 1);
    }

    #[test]
    fn test_touching_vertex_yields_nothing() {
        // Single triangle whose lowest vertex touches the plane
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
            ],
            vec![[0, 1, 2]],
        );
        let distances: Vec<f64> = mesh.vertices.iter().map(|v| v.z).collect();
        assert!(intersect_face(&mesh, &distances, 0, 0.0, 1e-9).is_none());
        // ... and at the top the edge lies in the plane but nothing is above
        assert!(intersect_face(&mesh, &distances, 0, 1.0, 1e-9).is_none());
        assert!(intersect_face(&mesh, &distances, 0, 0.5, 1e-9).is_some());
    }

    #[test]
    fn test_on_plane_edge_with_apex_above() {
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 3.0),
            ],
            vec![[0, 1, 2]],
        );
        let distances: Vec<f64> = mesh.vertices.iter().map(|v| v.z).collect();
        let (a, b) = intersect_face(&mesh, &distances, 0, 0.0, 1e-9).unwrap();
        assert_relative_eq!((a - b).norm(), 2.0);
    }

    #[test]
    fn test_chain_open_and_closed() {
        let p = |x: f64, y: f64| Point2::new(x, y);
        // Unordered, mixed-direction square plus a separate open two-segment path
        let segments = vec![
            (p(1.0, 0.0), p(1.0, 1.0)),
            (p(5.0, 5.0), p(6.0, 5.0)),
            (p(0.0, 1.0), p(0.0, 0.0)),
            (p(1.0, 1.0), p(0.0, 1.0)),
            (p(7.0, 6.0), p(6.0, 5.0)),
            (p(1.0, 0.0), p(0.0, 0.0)),
        ];
        let polylines = chain_segments(&segments, 1e-6);
        assert_eq!(polylines.len(), 2);

        let square = &polylines[0];
        assert!(square.closed);
        assert_eq!(square.points.len(), 4);
        assert_relative_eq!(square.signed_area().abs(), 1.0);

        let path = &polylines[1];
        assert!(!path.closed);
        assert_eq!(path.points.len(), 3);
        assert_relative_eq!(path.length(), 1.0 + 2f64.sqrt());
    }

    #[test]
    fn test_chain_within_tolerance() {
        let p = |x: f64, y: f64| Point2::new(x, y);
        let segments = vec![
            (p(0.0, 0.0), p(1.0, 0.0)),
            (p(1.0 + 5e-7, 0.0), p(1.0, 1.0)),
            (p(1.0, 1.0), p(0.0, 3e-7)),
        ];
        let polylines = chain_segments(&segments, 1e-6);
        assert_eq!(polylines.len(), 1);
        assert!(polylines[0].closed);
        assert_eq!(polylines[0].points.len(), 3);
    }

    #[test]
    fn test_idempotent() {
        let first = slice_cube(&[1.0, 3.0, 9.0]);
        let second = slice_cube(&[1.0, 3.0, 9.0]);
        assert_eq!(first, second);
    }
}
