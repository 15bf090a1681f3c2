//! Per-frame feature extraction pipeline
//!
//! Runs the fixed stage chain on one raw capture: voxel downsampling,
//! statistical outlier removal, calibration transform and centering, normal
//! estimation, then the VFH and ESF descriptors.

use featcrate_core::{
    EsfSignature, Error, NormalField, Point3f, PointCloud, Result, Transform3D, VfhSignature,
};
use crate::esf::{compute_esf, EsfConfig, DEFAULT_ESF_SEED};
use crate::features::{compute_vfh, VfhConfig};
use crate::filtering::{statistical_outlier_removal, voxel_grid_filter};
use crate::normals::estimate_normals_radius;
use crate::pose::normalize_pose;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Configuration for the feature pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Edge length of the downsampling voxels
    pub voxel_size: f32,
    /// Neighbors considered by the outlier filter
    pub outlier_k: usize,
    /// Standard deviation multiplier of the outlier filter
    pub outlier_std_mul: f32,
    /// Neighborhood radius for normal estimation
    pub normal_radius: f32,
    /// Viewpoint for normal orientation and the VFH viewpoint component
    pub viewpoint: Point3f,
    /// Triples sampled per ESF descriptor
    pub esf_sample_size: usize,
    /// Seed of the ESF sampler
    pub esf_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.005,
            outlier_k: 100,
            outlier_std_mul: 0.7,
            normal_radius: 0.03,
            viewpoint: Point3f::origin(),
            esf_sample_size: 20_000,
            esf_seed: DEFAULT_ESF_SEED,
        }
    }
}

impl PipelineConfig {
    /// Check that every parameter is usable
    pub fn validate(&self) -> Result<()> {
        if !(self.voxel_size > 0.0 && self.voxel_size.is_finite()) {
            return Err(Error::InvalidData(format!("voxel_size must be positive, got {}", self.voxel_size)));
        }
        if self.outlier_k == 0 {
            return Err(Error::InvalidData("outlier_k must be greater than 0".to_string()));
        }
        if !(self.outlier_std_mul > 0.0 && self.outlier_std_mul.is_finite()) {
            return Err(Error::InvalidData(format!(
                "outlier_std_mul must be positive, got {}",
                self.outlier_std_mul
            )));
        }
        if !(self.normal_radius > 0.0 && self.normal_radius.is_finite()) {
            return Err(Error::InvalidData(format!(
                "normal_radius must be positive, got {}",
                self.normal_radius
            )));
        }
        if self.esf_sample_size == 0 {
            return Err(Error::InvalidData("esf_sample_size must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn vfh_config(&self) -> VfhConfig {
        VfhConfig {
            viewpoint: self.viewpoint,
            ..VfhConfig::default()
        }
    }

    pub fn esf_config(&self) -> EsfConfig {
        EsfConfig {
            sample_size: self.esf_sample_size,
            seed: self.esf_seed,
        }
    }
}

/// Point counts after each stage of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub input_points: usize,
    pub downsampled_points: usize,
    pub filtered_points: usize,
    pub valid_normals: usize,
    /// Number of VFH signatures computed (0 when a zero signature was substituted)
    pub vfh_count: usize,
    /// Number of ESF signatures computed (0 when a zero signature was substituted)
    pub esf_count: usize,
}

/// Everything the pipeline produces for one frame
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Filtered cloud in the calibrated frame, before centering
    pub transformed: PointCloud<Point3f>,
    /// `transformed` centered on its centroid
    pub centered: PointCloud<Point3f>,
    pub centroid: Option<Point3f>,
    /// One entry per point of `centered`
    pub normals: NormalField,
    pub vfh: VfhSignature,
    pub esf: EsfSignature,
    pub stats: FrameStats,
}

/// The per-frame feature extraction pipeline
pub struct FeaturePipeline {
    config: PipelineConfig,
}

impl FeaturePipeline {
    /// Create a pipeline, rejecting an invalid configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one raw cloud.
    ///
    /// Descriptors that cannot be computed because too few points survived
    /// the filters are replaced by all-zero signatures, so every frame yields
    /// exactly one of each.
    pub fn process(&self, cloud: &PointCloud<Point3f>, calibration: &Transform3D) -> Result<ProcessedFrame> {
        let downsampled = voxel_grid_filter(cloud, self.config.voxel_size)?;
        let filtered = statistical_outlier_removal(
            &downsampled,
            self.config.outlier_k,
            self.config.outlier_std_mul,
        )?;

        let pose = normalize_pose(&filtered, calibration);
        debug!(
            "centroid {:?} of {} points",
            pose.centroid.map(|c| [c.x, c.y, c.z]),
            pose.centered.len()
        );

        let normals = estimate_normals_radius(&pose.centered, self.config.normal_radius, self.config.viewpoint)?;

        let (vfh, vfh_count) = match compute_vfh(&pose.centered, &normals, &self.config.vfh_config()) {
            Ok(signature) => (signature, 1),
            Err(Error::InsufficientPoints { needed, found }) => {
                warn!(
                    "VFH needs {} points with normals, found {}; writing zero signature",
                    needed, found
                );
                (VfhSignature::zeroed(), 0)
            }
            Err(e) => return Err(e),
        };

        let (esf, esf_count) = match compute_esf(&pose.centered, &self.config.esf_config()) {
            Ok(signature) => (signature, 1),
            Err(Error::InsufficientPoints { needed, found }) => {
                warn!(
                    "ESF needs {} usable points, found {}; writing zero signature",
                    needed, found
                );
                (EsfSignature::zeroed(), 0)
            }
            Err(e) => return Err(e),
        };

        let stats = FrameStats {
            input_points: cloud.len(),
            downsampled_points: downsampled.len(),
            filtered_points: filtered.len(),
            valid_normals: normals.valid_count(),
            vfh_count,
            esf_count,
        };

        Ok(ProcessedFrame {
            transformed: pose.transformed,
            centered: pose.centered,
            centroid: pose.centroid,
            normals,
            vfh,
            esf,
            stats,
        })
    }
}
