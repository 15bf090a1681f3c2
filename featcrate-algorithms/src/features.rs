//! Pair features and the Viewpoint Feature Histogram

use featcrate_core::{
    Error, NormalField, Point3f, PointCloud, Result, Vector3f, VfhSignature, VFH_SIZE,
};
use crate::pose::compute_centroid;
use log::debug;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Bins per angular and distance component
pub const VFH_PAIR_BINS: usize = 45;

/// Bins in the viewpoint component
pub const VFH_VIEWPOINT_BINS: usize = 128;

const VIEWPOINT_EPSILON: f32 = 1e-6;

/// Darboux-frame features between two oriented points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairFeatures {
    /// Angle of the second normal in the frame of the first, in `[-π, π]`
    pub f1: f32,
    /// Component of the second normal along the frame's `v` axis
    pub f2: f32,
    /// Cosine between the source normal and the connecting line
    pub f3: f32,
    /// Euclidean distance between the two points
    pub f4: f32,
}

/// Compute the pair features between `(p1, n1)` and `(p2, n2)`.
///
/// The point whose normal makes the smaller angle with the connecting line
/// is used as the source of the frame. Returns `None` for coincident points
/// and when the source normal is parallel to the connecting line.
pub fn compute_pair_features(p1: &Point3f, n1: &Vector3f, p2: &Point3f, n2: &Vector3f) -> Option<PairFeatures> {
    let mut dp = p2 - p1;
    let f4 = dp.norm();
    if f4 == 0.0 {
        return None;
    }

    let mut n1 = *n1;
    let mut n2 = *n2;

    let angle1 = n1.dot(&dp) / f4;
    let angle2 = n2.dot(&dp) / f4;
    let f3 = if angle1.abs().acos() > angle2.abs().acos() {
        std::mem::swap(&mut n1, &mut n2);
        dp = -dp;
        -angle2
    } else {
        angle1
    };

    let v = dp.cross(&n1);
    let v_norm = v.norm();
    if v_norm == 0.0 {
        return None;
    }
    let v = v / v_norm;
    let w = n1.cross(&v);

    let f2 = v.dot(&n2);
    let f1 = w.dot(&n2).atan2(n1.dot(&n2));

    Some(PairFeatures { f1, f2, f3, f4 })
}

/// Configuration for VFH computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VfhConfig {
    /// Viewpoint used for the viewpoint component.
    ///
    /// The default origin coincides with the centroid of a centered cloud.
    /// The viewpoint direction is then zero and the whole component sits in
    /// the middle bin for every frame.
    pub viewpoint: Point3f,
    /// Scale the bins so each component sums to 100
    pub normalize_bins: bool,
    /// Bin distances relative to the farthest point from the centroid
    pub normalize_distances: bool,
    /// Accumulate the distance component; it stays empty otherwise
    pub size_component: bool,
}

impl Default for VfhConfig {
    fn default() -> Self {
        Self {
            viewpoint: Point3f::origin(),
            normalize_bins: true,
            normalize_distances: false,
            size_component: false,
        }
    }
}

fn clamp_bin(value: f32, bins: usize) -> usize {
    if value.is_nan() || value < 0.0 {
        0
    } else {
        (value as usize).min(bins - 1)
    }
}

/// Compute the Viewpoint Feature Histogram of a cloud.
///
/// Pair features are taken between the cloud centroid (oriented by the mean
/// of the valid normals) and every point with a valid normal. Layout is
/// `f1[45] f2[45] f3[45] f4[45] viewpoint[128]`.
///
/// Requires at least two points with a valid normal.
pub fn compute_vfh(cloud: &PointCloud<Point3f>, normals: &NormalField, config: &VfhConfig) -> Result<VfhSignature> {
    if cloud.len() != normals.len() {
        return Err(Error::InvalidData(format!(
            "normal field has {} entries for {} points",
            normals.len(),
            cloud.len()
        )));
    }

    let oriented: Vec<(Point3f, Vector3f)> = cloud
        .iter()
        .zip(normals.iter())
        .filter_map(|(point, normal)| normal.map(|n| (*point, n.normal)))
        .collect();

    if oriented.len() < 2 {
        return Err(Error::InsufficientPoints {
            needed: 2,
            found: oriented.len(),
        });
    }

    let centroid = compute_centroid(cloud).ok_or_else(|| {
        Error::InvalidData("cloud has no finite points".to_string())
    })?;

    let mut normal_centroid = Vector3f::zeros();
    for (_, normal) in &oriented {
        normal_centroid += normal;
    }
    normal_centroid /= oriented.len() as f32;

    let n = oriented.len() as f32;
    let pair_incr = if config.normalize_bins { 100.0 / (n - 1.0) } else { 1.0 };
    let size_incr = if config.size_component { pair_incr } else { 0.0 };

    let max_dist = if config.normalize_distances {
        cloud.iter()
            .map(|p| (p - centroid).norm())
            .filter(|d| d.is_finite())
            .fold(0.0f32, f32::max)
    } else {
        0.0
    };

    let mut histogram = [0.0f32; VFH_SIZE];
    let (f1_hist, rest) = histogram.split_at_mut(VFH_PAIR_BINS);
    let (f2_hist, rest) = rest.split_at_mut(VFH_PAIR_BINS);
    let (f3_hist, rest) = rest.split_at_mut(VFH_PAIR_BINS);
    let (f4_hist, vp_hist) = rest.split_at_mut(VFH_PAIR_BINS);

    let bins = VFH_PAIR_BINS as f32;
    let mut skipped = 0usize;
    for (point, normal) in &oriented {
        let Some(features) = compute_pair_features(&centroid, &normal_centroid, point, normal) else {
            skipped += 1;
            continue;
        };

        f1_hist[clamp_bin((bins * (features.f1 + PI) / (2.0 * PI)).floor(), VFH_PAIR_BINS)] += pair_incr;
        f2_hist[clamp_bin((bins * (features.f2 + 1.0) * 0.5).floor(), VFH_PAIR_BINS)] += pair_incr;
        f3_hist[clamp_bin((bins * (features.f3 + 1.0) * 0.5).floor(), VFH_PAIR_BINS)] += pair_incr;

        let f4_bin = if config.normalize_distances {
            if max_dist > 0.0 {
                (bins * features.f4 / max_dist).floor()
            } else {
                0.0
            }
        } else {
            (features.f4 * 100.0).round()
        };
        f4_hist[clamp_bin(f4_bin, VFH_PAIR_BINS)] += size_incr;
    }

    // a viewpoint at the centroid has no direction; every normal then lands mid-range
    let to_viewpoint = config.viewpoint - centroid;
    let d_vp = if to_viewpoint.norm() > VIEWPOINT_EPSILON {
        to_viewpoint.normalize()
    } else {
        Vector3f::zeros()
    };

    let vp_incr = if config.normalize_bins { 100.0 / n } else { 1.0 };
    for (_, normal) in &oriented {
        let alpha = (normal.dot(&d_vp) + 1.0) * 0.5;
        vp_hist[clamp_bin((alpha * VFH_VIEWPOINT_BINS as f32).floor(), VFH_VIEWPOINT_BINS)] += vp_incr;
    }

    debug!(
        "vfh over {} oriented points, {} degenerate pairs",
        oriented.len(),
        skipped
    );

    Ok(VfhSignature { histogram })
}
