//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A unit surface normal fitted to a local neighborhood
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceNormal {
    pub normal: Vector3f,
    /// Surface variation `λ0 / (λ0 + λ1 + λ2)` of the neighborhood covariance
    pub curvature: f32,
}

impl SurfaceNormal {
    pub fn new(normal: Vector3f, curvature: f32) -> Self {
        Self { normal, curvature }
    }

    /// Whether both the normal and the curvature are finite
    pub fn is_finite(&self) -> bool {
        self.normal.iter().all(|c| c.is_finite()) && self.curvature.is_finite()
    }
}

impl Default for SurfaceNormal {
    fn default() -> Self {
        Self {
            normal: Vector3f::new(0.0, 0.0, 1.0),
            curvature: 0.0,
        }
    }
}

/// Returns true when all three coordinates are finite
pub fn is_finite_point(point: &Point3f) -> bool {
    point.x.is_finite() && point.y.is_finite() && point.z.is_finite()
}
