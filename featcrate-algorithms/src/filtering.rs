//! Filtering algorithms

use featcrate_core::{is_finite_point, Error, NearestNeighborSearch, Point3f, PointCloud, Result};
use crate::nearest_neighbor::KdTree;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Voxel grid filtering
///
/// This algorithm reduces the density of a point cloud by binning points into
/// a grid of cubic cells of edge `voxel_size`, anchored at the origin, and
/// replacing the points of every occupied cell by their centroid.
///
/// Non-finite points are dropped before binning. Cells are emitted in
/// ascending `(z, y, x)` index order, so the output is deterministic.
///
/// # Arguments
/// * `cloud` - Input point cloud
/// * `voxel_size` - Edge length of each voxel cube
///
/// # Returns
/// * `Result<PointCloud<Point3f>>` - Downsampled point cloud
///
/// # Example
/// ```rust
/// use featcrate_core::{PointCloud, Point3f};
/// use featcrate_algorithms::voxel_grid_filter;
///
/// fn main() -> featcrate_core::Result<()> {
///     let cloud = PointCloud::from_points(vec![
///         Point3f::new(0.01, 0.01, 0.01),
///         Point3f::new(0.03, 0.03, 0.03),
///         Point3f::new(0.5, 0.0, 0.0),
///     ]);
///
///     let filtered = voxel_grid_filter(&cloud, 0.1)?;
///     assert_eq!(filtered.len(), 2);
///     Ok(())
/// }
/// ```
pub fn voxel_grid_filter(cloud: &PointCloud<Point3f>, voxel_size: f32) -> Result<PointCloud<Point3f>> {
    if voxel_size <= 0.0 || !voxel_size.is_finite() {
        return Err(Error::InvalidData(
            "voxel_size must be positive".to_string()
        ));
    }

    if cloud.is_empty() {
        return Ok(PointCloud::new());
    }

    let inverse = 1.0 / voxel_size as f64;
    let voxel_of = |point: &Point3f| -> (i64, i64, i64) {
        (
            (point.z as f64 * inverse).floor() as i64,
            (point.y as f64 * inverse).floor() as i64,
            (point.x as f64 * inverse).floor() as i64,
        )
    };

    // (sum x, sum y, sum z, count) per occupied voxel
    let mut voxels: BTreeMap<(i64, i64, i64), ([f64; 3], usize)> = BTreeMap::new();
    let mut skipped = 0usize;

    for point in cloud.iter() {
        if !is_finite_point(point) {
            skipped += 1;
            continue;
        }
        let entry = voxels.entry(voxel_of(point)).or_insert(([0.0; 3], 0));
        entry.0[0] += point.x as f64;
        entry.0[1] += point.y as f64;
        entry.0[2] += point.z as f64;
        entry.1 += 1;
    }

    if skipped > 0 {
        debug!("voxel grid dropped {} non-finite points", skipped);
    }

    let filtered: PointCloud<Point3f> = voxels
        .values()
        .map(|(sum, count)| {
            let n = *count as f64;
            Point3f::new((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32)
        })
        .collect();

    Ok(filtered)
}

/// Per-point statistics computed by the statistical outlier filter
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierStatistics {
    /// Mean distance from each point to its k nearest neighbors
    pub mean_distances: Vec<f32>,
    /// Mean of `mean_distances`
    pub mean: f32,
    /// Sample standard deviation of `mean_distances`
    pub std_dev: f32,
    /// Points with a mean distance above this value are outliers
    pub threshold: f32,
}

/// Compute the neighbor-distance statistics used by [`statistical_outlier_removal`].
///
/// For each point the mean Euclidean distance to its `k_neighbors` nearest
/// neighbors (the point itself excluded) is computed. The cloud must contain
/// more than `k_neighbors` points.
pub fn statistical_outlier_distances(
    cloud: &PointCloud<Point3f>,
    k_neighbors: usize,
    std_dev_multiplier: f32,
) -> Result<OutlierStatistics> {
    validate_outlier_parameters(k_neighbors, std_dev_multiplier)?;

    if cloud.len() <= k_neighbors {
        return Err(Error::InsufficientPoints {
            needed: k_neighbors + 1,
            found: cloud.len(),
        });
    }

    let tree = KdTree::new(&cloud.points)?;

    let mean_distances: Vec<f32> = cloud.points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            // +1 because the query point is its own nearest neighbor
            let neighbors = tree.find_k_nearest(point, k_neighbors + 1);
            let distances: Vec<f32> = neighbors
                .iter()
                .filter(|(idx, _)| *idx != i)
                .take(k_neighbors)
                .map(|(_, distance)| *distance)
                .collect();

            if distances.is_empty() {
                return 0.0;
            }
            distances.iter().sum::<f32>() / distances.len() as f32
        })
        .collect();

    let n = mean_distances.len() as f64;
    let sum: f64 = mean_distances.iter().map(|&d| d as f64).sum();
    let sq_sum: f64 = mean_distances.iter().map(|&d| (d as f64) * (d as f64)).sum();
    let mean = sum / n;
    let variance = ((sq_sum - sum * sum / n) / (n - 1.0)).max(0.0);
    let std_dev = variance.sqrt();
    let threshold = mean + std_dev_multiplier as f64 * std_dev;

    Ok(OutlierStatistics {
        mean_distances,
        mean: mean as f32,
        std_dev: std_dev as f32,
        threshold: threshold as f32,
    })
}

/// Statistical outlier removal filter
///
/// This algorithm removes points that are statistical outliers based on the distance
/// to their k-nearest neighbors. For each point, it computes the mean distance to
/// its k nearest neighbors. Points whose mean distance exceeds the global mean by
/// more than `std_dev_multiplier` sample standard deviations are removed.
///
/// A cloud with `k_neighbors` points or fewer cannot provide a full
/// neighborhood for every point; it is returned unchanged.
///
/// # Arguments
/// * `cloud` - Input point cloud
/// * `k_neighbors` - Number of nearest neighbors to consider for each point
/// * `std_dev_multiplier` - Standard deviation multiplier for outlier detection
///
/// # Returns
/// * `Result<PointCloud<Point3f>>` - Filtered point cloud with outliers removed
///
/// # Example
/// ```rust
/// use featcrate_core::{PointCloud, Point3f};
/// use featcrate_algorithms::statistical_outlier_removal;
///
/// fn main() -> featcrate_core::Result<()> {
///     let mut points: Vec<Point3f> = (0..20)
///         .map(|i| Point3f::new((i % 5) as f32 * 0.1, (i / 5) as f32 * 0.1, 0.0))
///         .collect();
///     points.push(Point3f::new(10.0, 10.0, 10.0)); // outlier
///     let cloud = PointCloud::from_points(points);
///
///     let filtered = statistical_outlier_removal(&cloud, 3, 1.0)?;
///     assert_eq!(filtered.len(), 20);
///     Ok(())
/// }
/// ```
pub fn statistical_outlier_removal(
    cloud: &PointCloud<Point3f>,
    k_neighbors: usize,
    std_dev_multiplier: f32,
) -> Result<PointCloud<Point3f>> {
    validate_outlier_parameters(k_neighbors, std_dev_multiplier)?;

    if cloud.is_empty() {
        return Ok(PointCloud::new());
    }

    if cloud.len() <= k_neighbors {
        warn!(
            "outlier filter needs more than {} points, got {}; passing cloud through",
            k_neighbors,
            cloud.len()
        );
        return Ok(cloud.clone());
    }

    let stats = statistical_outlier_distances(cloud, k_neighbors, std_dev_multiplier)?;

    let filtered: PointCloud<Point3f> = cloud.points
        .iter()
        .zip(stats.mean_distances.iter())
        .filter(|(_, &mean_dist)| mean_dist <= stats.threshold)
        .map(|(point, _)| *point)
        .collect();

    debug!(
        "outlier filter: mean {:.5}, std {:.5}, threshold {:.5}, removed {}",
        stats.mean,
        stats.std_dev,
        stats.threshold,
        cloud.len() - filtered.len()
    );

    Ok(filtered)
}

fn validate_outlier_parameters(k_neighbors: usize, std_dev_multiplier: f32) -> Result<()> {
    if k_neighbors == 0 {
        return Err(Error::InvalidData(
            "k_neighbors must be greater than 0".to_string()
        ));
    }

    if std_dev_multiplier <= 0.0 || !std_dev_multiplier.is_finite() {
        return Err(Error::InvalidData(
            "std_dev_multiplier must be positive".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(n: usize, spacing: f32) -> Vec<Point3f> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    points.push(Point3f::new(
                        i as f32 * spacing,
                        j as f32 * spacing,
                        k as f32 * spacing,
                    ));
                }
            }
        }
        points
    }

    #[test]
    fn test_statistical_outlier_removal_empty_cloud() {
        let cloud = PointCloud::<Point3f>::new();
        let result = statistical_outlier_removal(&cloud, 5, 1.0);
        assert!(result.is_ok());
        assert_eq!(result.unwrap().len(), 0);
    }

    #[test]
    fn test_statistical_outlier_removal_too_few_points_passes_through() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(50.0, 0.0, 0.0),
        ]);
        let filtered = statistical_outlier_removal(&cloud, 3, 0.1).unwrap();
        assert_eq!(filtered, cloud);
    }

    #[test]
    fn test_statistical_outlier_removal_with_outliers() {
        let mut points = cube(10, 0.1);

        points.push(Point3f::new(10.0, 10.0, 10.0));
        points.push(Point3f::new(-10.0, -10.0, -10.0));
        points.push(Point3f::new(5.0, 5.0, 5.0));

        let cloud = PointCloud::from_points(points);
        let original_count = cloud.len();

        let filtered = statistical_outlier_removal(&cloud, 5, 1.0).unwrap();
        assert!(filtered.len() < original_count);
        assert!(filtered.len() >= 1000);

        let has_far_point = filtered.points.iter().any(|p| p.coords.norm() > 3.0);
        assert!(!has_far_point);
    }

    #[test]
    fn test_retained_points_respect_threshold() {
        let mut points = cube(6, 0.05);
        points.push(Point3f::new(1.0, 0.2, 0.1));
        points.push(Point3f::new(0.1, 0.9, -0.4));
        let cloud = PointCloud::from_points(points);

        let stats = statistical_outlier_distances(&cloud, 10, 0.7).unwrap();
        let filtered = statistical_outlier_removal(&cloud, 10, 0.7).unwrap();

        assert_eq!(stats.mean_distances.len(), cloud.len());
        let expected: usize = stats.mean_distances.iter().filter(|&&d| d <= stats.threshold).count();
        assert_eq!(filtered.len(), expected);

        for point in filtered.iter() {
            let idx = cloud.points.iter().position(|p| p == point).unwrap();
            assert!(stats.mean_distances[idx] <= stats.threshold);
        }
    }

    #[test]
    fn test_uniform_cube_keeps_every_point_with_permissive_multiplier() {
        let cloud = PointCloud::from_points(cube(5, 0.1));
        let filtered = statistical_outlier_removal(&cloud, 8, 10.0).unwrap();
        assert_eq!(filtered.len(), cloud.len());
    }

    #[test]
    fn test_statistical_outlier_removal_invalid_parameters() {
        let cloud = PointCloud::from_points(vec![Point3f::new(0.0, 0.0, 0.0)]);
        assert!(statistical_outlier_removal(&cloud, 0, 1.0).is_err());
        assert!(statistical_outlier_removal(&cloud, 5, 0.0).is_err());
        assert!(statistical_outlier_removal(&cloud, 5, -1.0).is_err());
    }

    #[test]
    fn test_voxel_grid_filter_empty_cloud() {
        let cloud = PointCloud::<Point3f>::new();
        let result = voxel_grid_filter(&cloud, 0.1);
        assert!(result.is_ok());
        assert_eq!(result.unwrap().len(), 0);
    }

    #[test]
    fn test_voxel_grid_filter_averages_cell() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.01, 0.02, 0.03),
            Point3f::new(0.03, 0.04, 0.05),
        ]);
        let filtered = voxel_grid_filter(&cloud, 0.1).unwrap();
        assert_eq!(filtered.len(), 1);
        assert!((filtered[0] - Point3f::new(0.02, 0.03, 0.04)).norm() < 1e-6);
    }

    #[test]
    fn test_voxel_grid_filter_with_duplicates() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.0, 0.0, 0.0), // duplicate
            Point3f::new(0.1, 0.0, 0.0),
            Point3f::new(0.1, 0.0, 0.0), // duplicate
            Point3f::new(0.0, 0.1, 0.0),
        ]);

        let filtered = voxel_grid_filter(&cloud, 0.05).unwrap();
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_voxel_grid_filter_drops_non_finite() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(f32::NAN, 0.0, 0.0),
            Point3f::new(0.0, f32::INFINITY, 0.0),
        ]);
        let filtered = voxel_grid_filter(&cloud, 0.05).unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_voxel_grid_filter_bounds_and_order() {
        let input = cube(10, 0.01);
        let cloud = PointCloud::from_points(input.clone());
        let voxel = 0.005;

        let filtered = voxel_grid_filter(&cloud, voxel).unwrap();
        // grid spacing exceeds the cell size, so no two points share a cell
        assert_eq!(filtered.len(), input.len());

        for out in filtered.iter() {
            let nearest = input
                .iter()
                .map(|p| (p - out).norm())
                .fold(f32::INFINITY, f32::min);
            assert!(nearest <= voxel);
        }

        // ascending z, then y, then x
        let keys: Vec<(i64, i64, i64)> = filtered
            .iter()
            .map(|p| {
                (
                    (p.z / voxel).floor() as i64,
                    (p.y / voxel).floor() as i64,
                    (p.x / voxel).floor() as i64,
                )
            })
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_voxel_grid_filter_is_deterministic() {
        let cloud = PointCloud::from_points(cube(7, 0.013));
        let a = voxel_grid_filter(&cloud, 0.02).unwrap();
        let b = voxel_grid_filter(&cloud, 0.02).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= cloud.len());
    }

    #[test]
    fn test_voxel_grid_filter_invalid_voxel_size() {
        let cloud = PointCloud::from_points(vec![Point3f::new(0.0, 0.0, 0.0)]);
        assert!(voxel_grid_filter(&cloud, 0.0).is_err());
        assert!(voxel_grid_filter(&cloud, -1.0).is_err());
    }
}
