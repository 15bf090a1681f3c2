//! Rigid calibration transform and centroid-based centering

use featcrate_core::{is_finite_point, Point3f, PointCloud, Transform3D, Vector3f};

/// Output of [`normalize_pose`]: the calibrated cloud before and after centering
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPose {
    /// Cloud after applying the calibration transform
    pub transformed: PointCloud<Point3f>,
    /// `transformed` shifted so that its centroid sits at the origin
    pub centered: PointCloud<Point3f>,
    /// Centroid of `transformed`, `None` for an empty cloud
    pub centroid: Option<Point3f>,
}

/// Apply a transform to every point. Cardinality and order are preserved.
pub fn transform_point_cloud(cloud: &PointCloud<Point3f>, transform: &Transform3D) -> PointCloud<Point3f> {
    cloud.transformed(transform)
}

/// Mean of the finite points of the cloud.
///
/// Returns `None` when the cloud holds no finite point.
pub fn compute_centroid(cloud: &PointCloud<Point3f>) -> Option<Point3f> {
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;

    for point in cloud.iter().filter(|p| is_finite_point(p)) {
        sum[0] += point.x as f64;
        sum[1] += point.y as f64;
        sum[2] += point.z as f64;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let n = count as f64;
    Some(Point3f::new(
        (sum[0] / n) as f32,
        (sum[1] / n) as f32,
        (sum[2] / n) as f32,
    ))
}

/// Subtract `centroid` from every point
pub fn demean_point_cloud(cloud: &PointCloud<Point3f>, centroid: &Point3f) -> PointCloud<Point3f> {
    let offset: Vector3f = centroid.coords;
    cloud.iter().map(|p| p - offset).collect()
}

/// Transform the cloud into the calibrated frame, then center it on its centroid.
///
/// An empty cloud yields empty `transformed` and `centered` clouds and no centroid.
pub fn normalize_pose(cloud: &PointCloud<Point3f>, transform: &Transform3D) -> NormalizedPose {
    let transformed = transform_point_cloud(cloud, transform);
    let centroid = compute_centroid(&transformed);
    let centered = match &centroid {
        Some(c) => demean_point_cloud(&transformed, c),
        None => transformed.clone(),
    };

    NormalizedPose {
        transformed,
        centered,
        centroid,
    }
}
