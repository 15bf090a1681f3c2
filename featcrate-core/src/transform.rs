//! 3D transformation utilities

use nalgebra::{Point3, Vector3, Matrix4, Isometry3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// A homogeneous 4x4 transformation applied to points and point clouds.
///
/// Calibration matrices are loaded into this type as-is; nothing checks that
/// the upper-left block is a proper rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Create a transformation from translation and rotation
    pub fn from_translation_rotation(
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Self {
        let isometry = Isometry3::from_parts(translation.into(), rotation);
        Self {
            matrix: isometry.to_homogeneous(),
        }
    }

    /// Build from 16 values in row-major order
    pub fn from_row_major(values: &[f32; 16]) -> Self {
        Self {
            matrix: Matrix4::from_row_slice(values),
        }
    }

    /// Apply the transformation to a point.
    ///
    /// The projective row is ignored, as with a rigid calibration transform.
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        let m = &self.matrix;
        Point3::new(
            m[(0, 0)] * point.x + m[(0, 1)] * point.y + m[(0, 2)] * point.z + m[(0, 3)],
            m[(1, 0)] * point.x + m[(1, 1)] * point.y + m[(1, 2)] * point.z + m[(1, 3)],
            m[(2, 0)] * point.x + m[(2, 1)] * point.y + m[(2, 2)] * point.z + m[(2, 3)],
        )
    }

    /// Compose this transformation with another
    pub fn compose(self, other: Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Get the inverse transformation
    pub fn inverse(self) -> Option<Self> {
        self.matrix.try_inverse().map(|inv_matrix| Self {
            matrix: inv_matrix,
        })
    }

    /// Check if this is approximately the identity transformation
    pub fn is_identity(&self, epsilon: f32) -> bool {
        let identity = Matrix4::identity();
        (self.matrix - identity).norm() < epsilon
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Matrix4<f32>> for Transform3D {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }
}
