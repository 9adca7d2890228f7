#![warn(missing_docs)]

//! Math types for the stlslice workspace.
//!
//! Thin wrappers around nalgebra providing the points, vectors, section
//! planes and the rigid 4x4 transform that maps a 2D cross-section back
//! into model space.

use nalgebra::{Matrix4, Unit, Vector3, Vector4};

/// A point in 3D model space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in a section plane's local 2D frame.
pub type Point2 = nalgebra::Point2<f64>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Transform whose columns are the given axes and origin.
    ///
    /// Maps local `(u, v, w)` coordinates to `origin + u*x_axis + v*y_axis + w*z_axis`.
    pub fn from_frame(origin: &Point3, x_axis: &Vec3, y_axis: &Vec3, z_axis: &Vec3) -> Self {
        let mut m = Matrix4::identity();
        for row in 0..3 {
            m[(row, 0)] = x_axis[row];
            m[(row, 1)] = y_axis[row];
            m[(row, 2)] = z_axis[row];
            m[(row, 3)] = origin[row];
        }
        Self { matrix: m }
    }

    /// Build a transform from row-major nested arrays.
    pub fn from_rows(rows: &[[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                m[(r, c)] = *value;
            }
        }
        Self { matrix: m }
    }

    /// Row-major nested arrays, the layout used in exported documents.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.matrix[(r, c)];
            }
        }
        rows
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Lift a planar point (local `w = 0`) into 3D.
    pub fn apply_point2(&self, p: &Point2) -> Point3 {
        self.apply_point(&Point3::new(p.x, p.y, 0.0))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// An oriented cutting plane with an orthonormal in-plane frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Point on the plane; the origin of the local 2D frame.
    pub origin: Point3,
    /// Unit plane normal.
    pub normal: Dir3,
    /// Local 2D x axis.
    pub x_axis: Vec3,
    /// Local 2D y axis (`normal × x_axis`).
    pub y_axis: Vec3,
}

impl Plane {
    /// Create a plane through `origin` with the given normal.
    ///
    /// The in-plane x axis is world X projected onto the plane, or world Y
    /// when the normal is close to X. Returns `None` for a zero normal.
    pub fn new(origin: Point3, normal: Vec3) -> Option<Self> {
        let normal = Dir3::try_new(normal, 1e-12)?;
        let reference = if normal.x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x_axis = (reference - normal.as_ref() * reference.dot(normal.as_ref())).normalize();
        let y_axis = normal.cross(&x_axis);
        Some(Self {
            origin,
            normal,
            x_axis,
            y_axis,
        })
    }

    /// The same plane shifted by `offset` along its normal.
    pub fn offset(&self, offset: f64) -> Self {
        Self {
            origin: self.origin + self.normal.as_ref() * offset,
            ..self.clone()
        }
    }

    /// Signed distance of `p` from the plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&(p - self.origin))
    }

    /// Project a point onto the local 2D frame.
    pub fn to_local(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(&self.x_axis), d.dot(&self.y_axis))
    }

    /// Transform from local 2D (with `w = 0`) back into model space.
    pub fn to_3d(&self) -> Transform {
        Transform::from_frame(&self.origin, &self.x_axis, &self.y_axis, self.normal.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result.x - 11.0).abs() < 1e-12);
        assert!((result.y - 22.0).abs() < 1e-12);
        assert!((result.z - 33.0).abs() < 1e-12);
    }

    #[test]
    fn test_rows_roundtrip() {
        let t = Transform::translation(1.0, 2.0, 3.0);
        let rows = t.to_rows();
        assert_eq!(rows[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rows[2], [0.0, 0.0, 1.0, 3.0]);
        assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(Transform::from_rows(&rows), t);
    }

    #[test]
    fn test_horizontal_plane_frame() {
        let plane = Plane::new(Point3::new(5.0, 5.0, 2.0), Vec3::z()).unwrap();
        assert!((plane.x_axis - Vec3::x()).norm() < 1e-12);
        assert!((plane.y_axis - Vec3::y()).norm() < 1e-12);

        let local = plane.to_local(&Point3::new(7.0, 4.0, 2.0));
        assert!((local.x - 2.0).abs() < 1e-12);
        assert!((local.y + 1.0).abs() < 1e-12);

        let back = plane.to_3d().apply_point2(&local);
        assert!((back - Point3::new(7.0, 4.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_tilted_plane_roundtrip() {
        let plane = Plane::new(Point3::new(1.0, -2.0, 0.5), Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!(plane.x_axis.dot(plane.normal.as_ref()).abs() < 1e-12);
        assert!(plane.y_axis.dot(&plane.x_axis).abs() < 1e-12);

        // Points on the plane survive local -> 3D
        let p = plane.origin + plane.x_axis * 3.0 - plane.y_axis * 1.5;
        let back = plane.to_3d().apply_point2(&plane.to_local(&p));
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn test_plane_offset_and_distance() {
        let plane = Plane::new(Point3::origin(), Vec3::z()).unwrap().offset(2.5);
        assert!((plane.origin.z - 2.5).abs() < 1e-12);
        assert!((plane.signed_distance(&Point3::new(3.0, 3.0, 4.0)) - 1.5).abs() < 1e-12);
        assert!(Plane::new(Point3::origin(), Vec3::zeros()).is_none());
    }
}
