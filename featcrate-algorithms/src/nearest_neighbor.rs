//! Nearest neighbor search implementations

use featcrate_core::{Error, NearestNeighborSearch, Point3f, Result};
use kdtree::distance::squared_euclidean;

/// KD-Tree backed nearest neighbor search.
///
/// Point indices into the slice the tree was built from are stored as the
/// payload, so results map directly back onto the source cloud.
pub struct KdTree {
    tree: kdtree::KdTree<f32, usize, [f32; 3]>,
}

impl KdTree {
    /// Build a tree over `points`. Fails on non-finite coordinates.
    pub fn new(points: &[Point3f]) -> Result<Self> {
        let mut tree = kdtree::KdTree::with_capacity(3, 16);
        for (idx, point) in points.iter().enumerate() {
            tree.add([point.x, point.y, point.z], idx)
                .map_err(|e| Error::Algorithm(format!("failed to index point {}: {}", idx, e)))?;
        }
        Ok(Self { tree })
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl NearestNeighborSearch for KdTree {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        match self.tree.nearest(&[query.x, query.y, query.z], k, &squared_euclidean) {
            Ok(found) => found
                .into_iter()
                .map(|(dist_sq, &idx)| (idx, dist_sq.sqrt()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        if radius <= 0.0 || self.is_empty() {
            return Vec::new();
        }
        // the tree compares against the squared metric
        match self.tree.within(&[query.x, query.y, query.z], radius * radius, &squared_euclidean) {
            Ok(found) => found
                .into_iter()
                .map(|(dist_sq, &idx)| (idx, dist_sq.sqrt()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch {
    points: Vec<Point3f>,
}

impl BruteForceSearch {
    pub fn new(points: &[Point3f]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }
}

impl NearestNeighborSearch for BruteForceSearch {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        let mut distances: Vec<(usize, f32)> = self.points
            .iter()
            .enumerate()
            .map(|(idx, point)| (idx, (point - query).norm()))
            .collect();

        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        distances.truncate(k);
        distances
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        let radius_squared = radius * radius;
        let mut found: Vec<(usize, f32)> = self.points
            .iter()
            .enumerate()
            .filter_map(|(idx, point)| {
                let distance_squared = (point - query).norm_squared();
                if distance_squared <= radius_squared {
                    Some((idx, distance_squared.sqrt()))
                } else {
                    None
                }
            })
            .collect();
        found.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, spacing: f32) -> Vec<Point3f> {
        let mut points = Vec::with_capacity(n * n * n);
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
    fn test_kdtree_matches_brute_force_distances() {
        let points = grid(6, 0.1);
        let kdtree = KdTree::new(&points).unwrap();
        let brute = BruteForceSearch::new(&points);

        let query = Point3f::new(0.23, 0.31, 0.05);
        let a = kdtree.find_k_nearest(&query, 10);
        let b = brute.find_k_nearest(&query, 10);

        assert_eq!(a.len(), 10);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x.1 - y.1).abs() < 1e-5);
        }
        // sorted by distance
        assert!(a.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_kdtree_radius_matches_brute_force() {
        let points = grid(5, 0.1);
        let kdtree = KdTree::new(&points).unwrap();
        let brute = BruteForceSearch::new(&points);

        let query = Point3f::new(0.2, 0.2, 0.2);
        let mut a: Vec<usize> = kdtree.find_radius_neighbors(&query, 0.12).into_iter().map(|(i, _)| i).collect();
        let mut b: Vec<usize> = brute.find_radius_neighbors(&query, 0.12).into_iter().map(|(i, _)| i).collect();
        a.sort_unstable();
        b.sort_unstable();

        // center plus its six face neighbors
        assert_eq!(a.len(), 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_larger_than_cloud() {
        let points = grid(2, 1.0);
        let kdtree = KdTree::new(&points).unwrap();
        let found = kdtree.find_k_nearest(&Point3f::origin(), 50);
        assert_eq!(found.len(), points.len());
        assert_eq!(found[0], (0, 0.0));
    }

    #[test]
    fn test_non_finite_point_rejected() {
        let points = vec![Point3f::new(0.0, 0.0, 0.0), Point3f::new(f32::NAN, 0.0, 0.0)];
        assert!(KdTree::new(&points).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let kdtree = KdTree::new(&[]).unwrap();
        assert!(kdtree.is_empty());
        assert!(kdtree.find_k_nearest(&Point3f::origin(), 3).is_empty());
        assert!(kdtree.find_radius_neighbors(&Point3f::origin(), 1.0).is_empty());
    }
}
