//! Point cloud data structures and functionality

use crate::point::*;
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A generic point cloud container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
        }
    }

    /// Create a new point cloud with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}

impl PointCloud<Point3f> {
    /// Return a new cloud with the transformation applied to every point
    pub fn transformed(&self, transform: &Transform3D) -> Self {
        self.points
            .iter()
            .map(|point| transform.transform_point(point))
            .collect()
    }
}

/// Per-point surface normals, index-aligned with the cloud they were estimated on.
///
/// Entries are `None` where the neighborhood was too small to fit a plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalField {
    pub normals: Vec<Option<SurfaceNormal>>,
}

impl NormalField {
    pub fn from_normals(normals: Vec<Option<SurfaceNormal>>) -> Self {
        Self { normals }
    }

    pub fn len(&self) -> usize {
        self.normals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }

    /// Number of points that received a normal
    pub fn valid_count(&self) -> usize {
        self.normals.iter().filter(|n| n.is_some()).count()
    }

    pub fn get(&self, index: usize) -> Option<&SurfaceNormal> {
        self.normals.get(index).and_then(|n| n.as_ref())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Option<SurfaceNormal>> {
        self.normals.iter()
    }
}
