//! # featcrate Algorithms
//!
//! Geometric processing for recorded depth-sensor clouds.
//!
//! This crate provides the stages of the per-frame feature pipeline: voxel
//! downsampling, statistical outlier removal, pose normalization, normal
//! estimation and the VFH and ESF global shape descriptors, plus the
//! [`FeaturePipeline`] that chains them.

pub mod filtering;
pub mod normals;
pub mod nearest_neighbor;
pub mod pose;
pub mod features;
pub mod esf;
pub mod pipeline;

// Re-export commonly used items
pub use filtering::*;
pub use normals::*;
pub use nearest_neighbor::*;
pub use pose::*;
pub use features::*;
pub use esf::*;
pub use pipeline::*;
