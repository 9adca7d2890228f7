//! Plane schedule: where the cutting planes go.

use log::debug;
use stlslice_math::{Point3, Vec3};
use stlslice_mesh::Mesh;

use crate::error::{Result, SliceError};

/// Upper bound on planes in one schedule.
const MAX_PLANES: usize = 10_000_000;

/// Ordered set of parallel cutting planes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSchedule {
    /// Point the heights are measured from.
    pub origin: Point3,
    /// Slicing direction (always +Z).
    pub normal: Vec3,
    /// Offsets along `normal` from `origin`, strictly increasing from 0.
    pub heights: Vec<f64>,
}

impl PlaneSchedule {
    /// Number of planes.
    pub fn len(&self) -> usize {
        self.heights.len()
    }

    /// True when there are no planes.
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Absolute Z of plane `index`.
    pub fn absolute_height(&self, index: usize) -> f64 {
        self.origin.z + self.heights[index] * self.normal.z
    }
}

/// Build the plane schedule for `mesh`.
///
/// Planes start at the mesh's minimum Z (or `origin_z` when given) and are
/// `pitch` apart. The origin's X and Y come from the mesh centroid, so the
/// cross-sections' 2D coordinates are centred on the part.
pub fn build_schedule(mesh: &Mesh, pitch: f64, origin_z: Option<f64>) -> Result<PlaneSchedule> {
    if !(pitch.is_finite() && pitch > 0.0) {
        return Err(SliceError::InvalidParameter(format!(
            "pitch must be a positive finite number, got {pitch}"
        )));
    }

    let bounds = mesh.bounds().ok_or(SliceError::EmptyMesh)?;
    let centroid = mesh.centroid().ok_or(SliceError::EmptyMesh)?;

    let start = origin_z.unwrap_or(bounds.min.z);
    if !start.is_finite() {
        return Err(SliceError::InvalidParameter(format!(
            "origin_z must be finite, got {start}"
        )));
    }

    let span = (bounds.max.z - start).max(0.0);
    let steps = (span / pitch).floor();
    if steps >= MAX_PLANES as f64 {
        return Err(SliceError::InvalidParameter(format!(
            "pitch {pitch} would produce more than {MAX_PLANES} planes"
        )));
    }
    let mut count = steps as usize + 1;
    // `i * pitch` can round past the top even when the quotient did not.
    while count > 1 && start + (count - 1) as f64 * pitch > bounds.max.z {
        count -= 1;
    }
    let heights: Vec<f64> = (0..count).map(|i| i as f64 * pitch).collect();

    let schedule = PlaneSchedule {
        origin: Point3::new(centroid.x, centroid.y, start),
        normal: Vec3::z(),
        heights,
    };

    debug!(
        "Plane schedule: {} planes, pitch {} {}, z from {} to {}",
        schedule.len(),
        pitch,
        mesh.units,
        start,
        schedule.absolute_height(schedule.len() - 1)
    );
    debug!("Slice heights: {:?}", schedule.heights);

    Ok(schedule)
}
