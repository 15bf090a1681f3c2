//! Recorded capture frames

use crate::point::Point3f;
use crate::point_cloud::PointCloud;

/// One timestamped capture from a recorded session
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Capture time in seconds
    pub timestamp: f64,
    pub points: PointCloud<Point3f>,
}

impl Frame {
    pub fn new(timestamp: f64, points: PointCloud<Point3f>) -> Self {
        Self { timestamp, points }
    }

    /// Seconds elapsed since `start`, the timestamp of the session's first frame
    pub fn elapsed_since(&self, start: f64) -> f64 {
        self.timestamp - start
    }
}
