//! Command line arguments

use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Replay a recorded point cloud session and extract VFH and ESF features per frame
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "featcrate-extract")]
#[command(about = "Replay a recorded point cloud session and extract VFH and ESF features per frame")]
pub struct Cli {
    /// Session name; frames are read from <SESSION>Cloud.txt
    pub session: String,

    /// Calibration file: four rows of four comma-separated values
    pub calibration: PathBuf,
}

impl Cli {
    /// Parse the given arguments, the first being the program name.
    ///
    /// Returns `None` for anything but exactly two positional arguments,
    /// including a help request.
    pub fn parse_from_args<I, T>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).ok()
    }

    /// Rendered help text
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }
}
