//! I/O for recorded sessions and extracted features
//!
//! This crate replays recorded capture sessions frame by frame, loads the
//! calibration transform of the capturing sensor and writes the per-frame
//! descriptor and cloud records produced by the feature pipeline.

pub mod session;
pub mod calibration;
pub mod frame_writer;
pub mod error;

pub use error::*;
pub use session::{session_path, SessionReader, DEFAULT_CHANNEL};
pub use calibration::{parse_calibration, read_calibration};
pub use frame_writer::{FrameWriter, OutputPaths, OutputStreams};
