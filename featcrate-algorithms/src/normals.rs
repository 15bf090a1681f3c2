//! Normal estimation algorithms

use featcrate_core::{
    Error, NearestNeighborSearch, NormalField, Point3f, PointCloud, Result, SurfaceNormal, Vector3f,
};
use crate::nearest_neighbor::KdTree;
use log::debug;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Minimum neighborhood size, the query point included, for a plane fit
const MIN_NEIGHBORS: usize = 3;

/// Configuration for normal estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalEstimationConfig {
    /// Neighbor count used when no radius is set
    pub k_neighbors: usize,
    /// Search radius. Takes precedence over `k_neighbors` when set.
    pub radius: Option<f32>,
    /// Normals are flipped to face this point
    pub viewpoint: Point3f,
}

impl Default for NormalEstimationConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 10,
            radius: Some(0.03),
            viewpoint: Point3f::origin(),
        }
    }
}

/// Estimate normals for a point cloud using k-nearest neighbors.
///
/// The neighborhood of each point is the point itself plus its `k - 1`
/// nearest neighbors. Normals face the origin.
pub fn estimate_normals(cloud: &PointCloud<Point3f>, k: usize) -> Result<NormalField> {
    estimate_normals_with_config(
        cloud,
        &NormalEstimationConfig {
            k_neighbors: k,
            radius: None,
            viewpoint: Point3f::origin(),
        },
    )
}

/// Estimate normals from all neighbors within `radius` of each point.
///
/// Points with fewer than three points in their neighborhood (self included)
/// get no normal. Every normal is flipped to face `viewpoint`.
///
/// # Example
/// ```rust
/// use featcrate_core::{PointCloud, Point3f};
/// use featcrate_algorithms::estimate_normals_radius;
///
/// fn main() -> featcrate_core::Result<()> {
///     let mut cloud = PointCloud::new();
///     for i in 0..5 {
///         for j in 0..5 {
///             cloud.push(Point3f::new(i as f32 * 0.01, j as f32 * 0.01, -1.0));
///         }
///     }
///
///     let normals = estimate_normals_radius(&cloud, 0.03, Point3f::origin())?;
///     assert_eq!(normals.len(), cloud.len());
///     let n = normals.get(12).unwrap();
///     assert!(n.normal.z > 0.99);
///     Ok(())
/// }
/// ```
pub fn estimate_normals_radius(
    cloud: &PointCloud<Point3f>,
    radius: f32,
    viewpoint: Point3f,
) -> Result<NormalField> {
    estimate_normals_with_config(
        cloud,
        &NormalEstimationConfig {
            k_neighbors: NormalEstimationConfig::default().k_neighbors,
            radius: Some(radius),
            viewpoint,
        },
    )
}

/// Estimate normals with full control over the neighborhood and orientation
pub fn estimate_normals_with_config(
    cloud: &PointCloud<Point3f>,
    config: &NormalEstimationConfig,
) -> Result<NormalField> {
    match config.radius {
        Some(radius) if radius <= 0.0 || !radius.is_finite() => {
            return Err(Error::InvalidData("normal radius must be positive".to_string()));
        }
        None if config.k_neighbors < MIN_NEIGHBORS => {
            return Err(Error::InvalidData(format!(
                "k_neighbors must be at least {}",
                MIN_NEIGHBORS
            )));
        }
        _ => {}
    }

    if cloud.is_empty() {
        return Ok(NormalField::default());
    }

    let tree = KdTree::new(&cloud.points)?;

    let normals: Vec<Option<SurfaceNormal>> = cloud.points
        .iter()
        .map(|point| {
            let neighbors = match config.radius {
                Some(radius) => tree.find_radius_neighbors(point, radius),
                None => tree.find_k_nearest(point, config.k_neighbors),
            };
            let indices: Vec<usize> = neighbors.into_iter().map(|(idx, _)| idx).collect();

            fit_plane_normal(&cloud.points, &indices)
                .map(|normal| orient_towards_viewpoint(normal, point, &config.viewpoint))
        })
        .collect();

    let field = NormalField::from_normals(normals);
    debug!(
        "estimated {} of {} normals",
        field.valid_count(),
        field.len()
    );
    Ok(field)
}

/// Fit a plane to the indexed points and return its normal and surface variation.
///
/// The normal is the eigenvector of the smallest eigenvalue of the
/// neighborhood covariance.
fn fit_plane_normal(points: &[Point3f], indices: &[usize]) -> Option<SurfaceNormal> {
    if indices.len() < MIN_NEIGHBORS {
        return None;
    }

    let n = indices.len() as f64;
    let mut centroid = Vector3::<f64>::zeros();
    for &i in indices {
        centroid += points[i].coords.cast::<f64>();
    }
    centroid /= n;

    let mut covariance = Matrix3::<f64>::zeros();
    for &i in indices {
        let d = points[i].coords.cast::<f64>() - centroid;
        covariance += d * d.transpose();
    }
    covariance /= n;

    let eigen = covariance.symmetric_eigen();

    let mut min_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }

    let eigen_sum = eigen.eigenvalues.iter().sum::<f64>();
    let curvature = if eigen_sum > 0.0 {
        (eigen.eigenvalues[min_idx].max(0.0) / eigen_sum) as f32
    } else {
        0.0
    };

    let normal: Vector3f = eigen.eigenvectors.column(min_idx).into_owned().cast::<f32>();
    let norm = normal.norm();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    let surface = SurfaceNormal::new(normal / norm, curvature);
    surface.is_finite().then_some(surface)
}

fn orient_towards_viewpoint(mut surface: SurfaceNormal, point: &Point3f, viewpoint: &Point3f) -> SurfaceNormal {
    if (viewpoint - point).dot(&surface.normal) < 0.0 {
        surface.normal = -surface.normal;
    }
    surface
}
