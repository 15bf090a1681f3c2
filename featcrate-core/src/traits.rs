//! Core traits for featcrate

use crate::point::*;

/// Trait for nearest neighbor search functionality.
///
/// Results are `(index, distance)` pairs sorted by ascending Euclidean
/// distance, where `index` refers to the point slice the search was built on.
pub trait NearestNeighborSearch {
    /// Find the k nearest neighbors to a query point
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;

    /// Find all neighbors within a given radius
    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)>;
}
