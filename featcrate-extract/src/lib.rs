//! Session replay and feature extraction
//!
//! Drives the [`featcrate_algorithms::FeaturePipeline`] over every frame of a
//! recorded session and writes the per-frame VFH, ESF and cloud records.

pub mod cli;
pub mod driver;
pub mod rate;

pub use cli::Cli;
pub use driver::{extract_session, run_session, DriverConfig, FrameObserver, NoopObserver, SessionSummary};
pub use rate::Rate;
