//! Core data structures and traits for featcrate
//!
//! This crate provides the fundamental types shared by the feature extraction
//! pipeline: points, point clouds, recorded frames, rigid transforms, normal
//! fields and the fixed-length shape descriptor signatures.

pub mod point;
pub mod point_cloud;
pub mod frame;
pub mod descriptor;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use frame::*;
pub use descriptor::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4};
