//! Ensemble of Shape Functions global descriptor
//!
//! Random point triples are drawn from the cloud after it has been centered
//! and scaled into a 64³ occupancy grid. Each triple contributes its three
//! angles (A3), its area (D3) and its three edge lengths (D2), split by
//! whether the edges run inside, outside or across the sampled surface.

use featcrate_core::{is_finite_point, EsfSignature, Error, Point3f, PointCloud, Result, ESF_SIZE};
use crate::pose::compute_centroid;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Bins per shape-function histogram
pub const ESF_BINS: usize = 64;

const GRID_SIZE: usize = 64;
const GRID_HALF: f32 = 32.0;

/// Seed used when none is configured
pub const DEFAULT_ESF_SEED: u64 = 0x5eed_e5f0;

/// Configuration for ESF computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsfConfig {
    /// Number of accepted point triples
    pub sample_size: usize,
    /// Seed of the triple sampler
    pub seed: u64,
}

impl Default for EsfConfig {
    fn default() -> Self {
        Self {
            sample_size: 20_000,
            seed: DEFAULT_ESF_SEED,
        }
    }
}

/// How a sampled edge relates to the occupied voxels it crosses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeClass {
    In,
    Out,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LineTrace {
    class: EdgeClass,
    /// Occupied voxels on the line
    inside: usize,
    /// Voxels visited
    count: usize,
    /// `inside / count`, only meaningful for mixed edges
    ratio: f32,
}

/// Binary occupancy grid over the scaled cloud
struct OccupancyGrid {
    cells: Vec<bool>,
}

impl OccupancyGrid {
    fn new() -> Self {
        Self {
            cells: vec![false; GRID_SIZE * GRID_SIZE * GRID_SIZE],
        }
    }

    fn offset(x: usize, y: usize, z: usize) -> usize {
        (x * GRID_SIZE + y) * GRID_SIZE + z
    }

    fn set(&mut self, x: usize, y: usize, z: usize) {
        self.cells[Self::offset(x, y, z)] = true;
    }

    fn is_occupied(&self, x: i32, y: i32, z: i32) -> bool {
        let range = 0..GRID_SIZE as i32;
        if !range.contains(&x) || !range.contains(&y) || !range.contains(&z) {
            return false;
        }
        self.cells[Self::offset(x as usize, y as usize, z as usize)]
    }

    /// Grid cell of a scaled coordinate in `[-32, 32]`
    fn cell_of(value: f32) -> i32 {
        let cell = if value < 0.0 {
            value.floor() as i32 + GRID_HALF as i32
        } else {
            value.ceil() as i32 + GRID_HALF as i32 - 1
        };
        cell.clamp(0, GRID_SIZE as i32 - 1)
    }

    fn cell(point: &Point3f) -> [i32; 3] {
        [Self::cell_of(point.x), Self::cell_of(point.y), Self::cell_of(point.z)]
    }

    /// Mark the 3x3x3 block of cells around the point
    fn mark_neighborhood(&mut self, point: &Point3f) {
        let [cx, cy, cz] = Self::cell(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let (x, y, z) = (cx + dx, cy + dy, cz + dz);
                    let range = 0..GRID_SIZE as i32;
                    if range.contains(&x) && range.contains(&y) && range.contains(&z) {
                        self.set(x as usize, y as usize, z as usize);
                    }
                }
            }
        }
    }

    /// Walk the voxels between two cells with a 3-D Bresenham line and
    /// classify the line by how many of them are occupied.
    fn trace(&self, from: [i32; 3], to: [i32; 3]) -> LineTrace {
        let delta = [to[0] - from[0], to[1] - from[1], to[2] - from[2]];
        let step = delta.map(|d| if d < 0 { -1 } else { 1 });
        let length = delta.map(i32::abs);

        // axis with the largest extent drives the walk
        let major = if length[0] >= length[1] && length[0] >= length[2] {
            0
        } else if length[1] >= length[0] && length[1] >= length[2] {
            1
        } else {
            2
        };
        let minor = [(major + 1) % 3, (major + 2) % 3];

        let mut voxel = from;
        let mut count = 0usize;
        let mut inside = 0usize;

        let major_len = length[major];
        let mut err_a = 2 * length[minor[0]] - major_len;
        let mut err_b = 2 * length[minor[1]] - major_len;

        for _ in 1..major_len {
            count += 1;
            if self.is_occupied(voxel[0], voxel[1], voxel[2]) {
                inside += 1;
            }
            if err_a > 0 {
                voxel[minor[0]] += step[minor[0]];
                err_a -= 2 * major_len;
            }
            if err_b > 0 {
                voxel[minor[1]] += step[minor[1]];
                err_b -= 2 * major_len;
            }
            err_a += 2 * length[minor[0]];
            err_b += 2 * length[minor[1]];
            voxel[major] += step[major];
        }

        count += 1;
        if self.is_occupied(voxel[0], voxel[1], voxel[2]) {
            inside += 1;
        }

        let class = if inside + 1 >= count {
            EdgeClass::In
        } else if inside <= 7 {
            EdgeClass::Out
        } else {
            EdgeClass::Mixed
        };

        LineTrace {
            class,
            inside,
            count,
            ratio: inside as f32 / count as f32,
        }
    }
}

/// Center the finite points on their centroid and scale them so the
/// farthest one lies at distance 32.
fn scale_into_grid(cloud: &PointCloud<Point3f>) -> Result<Vec<Point3f>> {
    let finite: PointCloud<Point3f> = cloud.iter().filter(|p| is_finite_point(p)).copied().collect();
    if finite.len() < 3 {
        return Err(Error::InsufficientPoints {
            needed: 3,
            found: finite.len(),
        });
    }

    let centroid = compute_centroid(&finite).ok_or(Error::InsufficientPoints {
        needed: 3,
        found: 0,
    })?;

    let max_distance = finite
        .iter()
        .map(|p| (p - centroid).norm())
        .fold(0.0f32, f32::max);
    if max_distance <= 0.0 {
        // every point coincides
        return Err(Error::InsufficientPoints {
            needed: 3,
            found: 1,
        });
    }

    let scale = GRID_HALF / max_distance;
    Ok(finite
        .iter()
        .map(|p| Point3f::from((p - centroid) * scale))
        .collect())
}

fn angle_bin(a: &Point3f, b: &Point3f, c: &Point3f) -> Option<usize> {
    // angle at `a`, folded into [0, π/2]
    let ab = (b - a).normalize();
    let ac = (c - a).normalize();
    let th = (ab.dot(&ac).abs().min(1.0).acos() / FRAC_PI_2 * (ESF_BINS - 1) as f32).round();
    if (0.0..=(ESF_BINS - 1) as f32).contains(&th) {
        Some(th as usize)
    } else {
        None
    }
}

fn distance_bin(value: f32, max: f32) -> Option<usize> {
    if max <= 0.0 {
        return Some(0);
    }
    let bin = (value / max * (ESF_BINS - 1) as f32).round();
    if (0.0..=(ESF_BINS - 1) as f32).contains(&bin) {
        Some(bin as usize)
    } else {
        None
    }
}

/// Compute the Ensemble of Shape Functions descriptor.
///
/// Sampling is driven by a seeded generator, so identical input and
/// configuration produce a bit-identical signature. At most 100 draws per
/// requested sample are attempted; a cloud without any triangle of non-zero
/// area yields `Error::InsufficientPoints`.
///
/// Layout: A3 in/out/mixed, D3 in/out/mixed, D2 in/out/mixed, D2 mixed
/// ratio, 64 bins each. The result sums to one.
///
/// # Example
/// ```rust
/// use featcrate_core::{PointCloud, Point3f};
/// use featcrate_algorithms::{compute_esf, EsfConfig};
///
/// fn main() -> featcrate_core::Result<()> {
///     let mut cloud = PointCloud::new();
///     for i in 0..6 {
///         for j in 0..6 {
///             cloud.push(Point3f::new(i as f32 * 0.02, j as f32 * 0.02, (i * j) as f32 * 0.001));
///         }
///     }
///     let config = EsfConfig { sample_size: 2000, ..EsfConfig::default() };
///     let esf = compute_esf(&cloud, &config)?;
///     let total: f32 = esf.as_slice().iter().sum();
///     assert!((total - 1.0).abs() < 1e-3);
///     Ok(())
/// }
/// ```
pub fn compute_esf(cloud: &PointCloud<Point3f>, config: &EsfConfig) -> Result<EsfSignature> {
    if config.sample_size == 0 {
        return Err(Error::InvalidData("sample_size must be greater than 0".to_string()));
    }

    let points = scale_into_grid(cloud)?;

    let mut grid = OccupancyGrid::new();
    for point in &points {
        grid.mark_neighborhood(point);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let max_attempts = config.sample_size.saturating_mul(100);

    let mut a3_in = [0.0f32; ESF_BINS];
    let mut a3_out = [0.0f32; ESF_BINS];
    let mut a3_mix = [0.0f32; ESF_BINS];
    let mut mix_ratio = [0.0f32; ESF_BINS];

    let mut d2: Vec<(f32, EdgeClass)> = Vec::with_capacity(config.sample_size * 3);
    let mut d3: Vec<(f32, f32)> = Vec::with_capacity(config.sample_size);

    let n = points.len();
    let mut attempts = 0usize;
    while d3.len() < config.sample_size && attempts < max_attempts {
        attempts += 1;

        let i1 = rng.gen_range(0..n);
        let i2 = rng.gen_range(0..n);
        let i3 = rng.gen_range(0..n);
        if i1 == i2 || i1 == i3 || i2 == i3 {
            continue;
        }
        let (p1, p2, p3) = (&points[i1], &points[i2], &points[i3]);

        let a = (p1 - p2).norm();
        let b = (p1 - p3).norm();
        let c = (p2 - p3).norm();
        let s = (a + b + c) * 0.5;
        let heron = s * (s - a) * (s - b) * (s - c);
        if heron <= 0.001 {
            continue;
        }

        let (Some(th1), Some(th2), Some(th3)) = (
            angle_bin(p1, p2, p3),
            angle_bin(p2, p1, p3),
            angle_bin(p3, p1, p2),
        ) else {
            continue;
        };

        let (c1, c2, c3) = (OccupancyGrid::cell(p1), OccupancyGrid::cell(p2), OccupancyGrid::cell(p3));
        let traces = [grid.trace(c1, c2), grid.trace(c1, c3), grid.trace(c2, c3)];

        let mut inside_sum = 0usize;
        let mut visited_sum = 0usize;
        for (trace, length) in traces.iter().zip([a, b, c]) {
            if trace.class == EdgeClass::Mixed {
                if let Some(bin) = distance_bin(trace.ratio, 1.0) {
                    mix_ratio[bin] += 1.0;
                }
            }
            d2.push((length, trace.class));
            inside_sum += trace.inside;
            visited_sum += trace.count;
        }

        let [t12, t13, t23] = traces.map(|t| t.count as f32 / GRID_HALF);
        let (a3, weight) = if inside_sum <= 21 {
            (&mut a3_out, 0.0)
        } else if visited_sum - inside_sum < 4 {
            (&mut a3_in, 1.0)
        } else {
            (&mut a3_mix, inside_sum as f32 / visited_sum as f32)
        };
        a3[th1] += t23;
        a3[th2] += t12;
        a3[th3] += t13;

        d3.push((heron.sqrt().sqrt(), weight));
    }

    if d3.is_empty() {
        return Err(Error::InsufficientPoints {
            needed: 3,
            found: 0,
        });
    }
    if d3.len() < config.sample_size {
        debug!(
            "esf accepted {} of {} triples after {} draws",
            d3.len(),
            config.sample_size,
            attempts
        );
    }

    let max_d2 = d2.iter().map(|(d, _)| *d).fold(0.0f32, f32::max);
    let max_d3 = d3.iter().map(|(d, _)| *d).fold(0.0f32, f32::max);

    let mut d3_in = [0.0f32; ESF_BINS];
    let mut d3_out = [0.0f32; ESF_BINS];
    let mut d3_mix = [0.0f32; ESF_BINS];
    for &(area, weight) in &d3 {
        let Some(bin) = distance_bin(area, max_d3) else { continue };
        if weight >= 0.999 {
            d3_in[bin] += 1.0;
        } else if weight <= 0.001 {
            d3_out[bin] += 1.0;
        } else {
            d3_mix[bin] += 1.0;
        }
    }

    let mut d2_in = [0.0f32; ESF_BINS];
    let mut d2_out = [0.0f32; ESF_BINS];
    let mut d2_mix = [0.0f32; ESF_BINS];
    for &(length, class) in &d2 {
        let Some(bin) = distance_bin(length, max_d2) else { continue };
        match class {
            EdgeClass::In => d2_in[bin] += 1.0,
            EdgeClass::Out => d2_out[bin] += 1.0,
            EdgeClass::Mixed => d2_mix[bin] += 1.0,
        }
    }

    let sections: [(&[f32; ESF_BINS], f32); 10] = [
        (&a3_in, 0.5),
        (&a3_out, 0.5),
        (&a3_mix, 0.5),
        (&d3_in, 0.5),
        (&d3_out, 0.5),
        (&d3_mix, 1.0),
        (&d2_in, 0.5),
        (&d2_out, 2.0),
        (&d2_mix, 2.0),
        (&mix_ratio, 1.0),
    ];

    let mut histogram = [0.0f32; ESF_SIZE];
    for (chunk, (section, weight)) in histogram.chunks_exact_mut(ESF_BINS).zip(sections.iter()) {
        for (out, value) in chunk.iter_mut().zip(section.iter()) {
            *out = value * weight;
        }
    }

    let total: f32 = histogram.iter().sum();
    if total > 0.0 {
        for value in histogram.iter_mut() {
            *value /= total;
        }
    }

    Ok(EsfSignature { histogram })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(n: usize, spacing: f32) -> PointCloud<Point3f> {
        let mut cloud = PointCloud::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    cloud.push(Point3f::new(i as f32 * spacing, j as f32 * spacing, k as f32 * spacing));
                }
            }
        }
        cloud
    }

    #[test]
    fn test_esf_layout_and_normalization() {
        let esf = compute_esf(&cube(10, 0.01), &EsfConfig::default()).unwrap();
        assert_eq!(esf.as_slice().len(), ESF_SIZE);
        assert!(esf.as_slice().iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_relative_eq!(esf.as_slice().iter().sum::<f32>(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_esf_is_deterministic() {
        let cloud = cube(6, 0.02);
        let config = EsfConfig {
            sample_size: 5000,
            ..EsfConfig::default()
        };
        let a = compute_esf(&cloud, &config).unwrap();
        let b = compute_esf(&cloud, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_esf_requires_three_points() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
        ]);
        assert!(matches!(
            compute_esf(&cloud, &EsfConfig::default()),
            Err(Error::InsufficientPoints { needed: 3, found: 2 })
        ));
    }

    #[test]
    fn test_esf_coincident_points() {
        let cloud = PointCloud::from_points(vec![Point3f::new(1.0, 1.0, 1.0); 5]);
        assert!(matches!(
            compute_esf(&cloud, &EsfConfig::default()),
            Err(Error::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn test_esf_ignores_non_finite_points() {
        let mut cloud = cube(4, 0.1);
        cloud.push(Point3f::new(f32::NAN, 0.0, 0.0));
        let esf = compute_esf(&cloud, &EsfConfig { sample_size: 500, ..EsfConfig::default() }).unwrap();
        assert!(esf.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cell_mapping_covers_grid() {
        assert_eq!(OccupancyGrid::cell_of(-32.0), 0);
        assert_eq!(OccupancyGrid::cell_of(-0.5), 31);
        assert_eq!(OccupancyGrid::cell_of(0.0), 31);
        assert_eq!(OccupancyGrid::cell_of(0.5), 32);
        assert_eq!(OccupancyGrid::cell_of(32.0), 63);
        assert_eq!(OccupancyGrid::cell_of(32.5), 63);
    }

    #[test]
    fn test_trace_through_empty_grid() {
        let grid = OccupancyGrid::new();
        let trace = grid.trace([0, 0, 0], [10, 0, 0]);
        assert_eq!(trace.count, 10);
        assert_eq!(trace.inside, 0);
        assert_eq!(trace.class, EdgeClass::Out);
    }

    #[test]
    fn test_trace_through_full_line() {
        let mut grid = OccupancyGrid::new();
        for x in 0..20 {
            grid.set(x, 5, 5);
        }
        let trace = grid.trace([0, 5, 5], [19, 5, 5]);
        assert_eq!(trace.count, 19);
        assert_eq!(trace.inside, 19);
        assert_eq!(trace.class, EdgeClass::In);
    }

    #[test]
    fn test_trace_mixed_ratio() {
        let mut grid = OccupancyGrid::new();
        for x in 0..10 {
            grid.set(x, 0, 0);
        }
        let trace = grid.trace([0, 0, 0], [20, 0, 0]);
        assert_eq!(trace.count, 20);
        assert_eq!(trace.inside, 10);
        assert_eq!(trace.class, EdgeClass::Mixed);
        assert_relative_eq!(trace.ratio, 0.5);
    }

    #[test]
    fn test_mark_neighborhood() {
        let mut grid = OccupancyGrid::new();
        grid.mark_neighborhood(&Point3f::new(0.5, 0.5, 0.5));
        assert!(grid.is_occupied(32, 32, 32));
        assert!(grid.is_occupied(31, 33, 31));
        assert!(!grid.is_occupied(30, 32, 32));
        assert_eq!(grid.cells.iter().filter(|&&c| c).count(), 27);
    }
}
