//! Per-frame feature output
//!
//! Every processed frame appends one record to each of four text streams:
//!
//! * VFH: `elapsed,d0,...,d307`
//! * ESF: `elapsed,d0,...,d639`
//! * Centered: `elapsed,count` then `count` lines `x,y,z`
//! * Filtered: same shape as Centered, holding the calibrated cloud before centering

use crate::error::{IoError, IoResult};
use featcrate_core::{EsfSignature, Point3f, PointCloud, VfhSignature};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Locations of the four output streams of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub vfh: PathBuf,
    pub esf: PathBuf,
    pub centered: PathBuf,
    pub filtered: PathBuf,
}

impl OutputPaths {
    /// `<dir>/<session>VFH`, `<dir>/<session>ESF`, `<dir>/<session>Centered`, `<dir>/<session>Filtered`
    pub fn for_session<P: AsRef<Path>>(session: &str, dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            vfh: dir.join(format!("{}VFH", session)),
            esf: dir.join(format!("{}ESF", session)),
            centered: dir.join(format!("{}Centered", session)),
            filtered: dir.join(format!("{}Filtered", session)),
        }
    }
}

/// The four sinks a [`FrameWriter`] appends to
#[derive(Debug)]
pub struct OutputStreams<W: Write> {
    pub vfh: W,
    pub esf: W,
    pub centered: W,
    pub filtered: W,
}

/// Appends per-frame descriptor and cloud records to the output streams
pub struct FrameWriter<W: Write> {
    streams: OutputStreams<W>,
    frames_written: usize,
}

fn create_stream(path: &Path) -> IoResult<BufWriter<File>> {
    let file = File::create(path).map_err(|e| IoError::WriteError {
        message: format!("cannot create {}: {}", path.display(), e),
    })?;
    Ok(BufWriter::new(file))
}

impl FrameWriter<BufWriter<File>> {
    /// Create (truncating) the four output files
    pub fn create(paths: &OutputPaths) -> IoResult<Self> {
        let streams = OutputStreams {
            vfh: create_stream(&paths.vfh)?,
            esf: create_stream(&paths.esf)?,
            centered: create_stream(&paths.centered)?,
            filtered: create_stream(&paths.filtered)?,
        };
        debug!("writing features to {}", paths.vfh.display());
        Ok(Self::new(streams))
    }
}

impl<W: Write> FrameWriter<W> {
    pub fn new(streams: OutputStreams<W>) -> Self {
        Self {
            streams,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Append one frame to every stream and flush them
    pub fn write_frame(
        &mut self,
        elapsed: f64,
        vfh: &VfhSignature,
        esf: &EsfSignature,
        centered: &PointCloud<Point3f>,
        transformed: &PointCloud<Point3f>,
    ) -> IoResult<()> {
        let elapsed = round_elapsed(elapsed);
        write_descriptor(&mut self.streams.vfh, elapsed, vfh.as_slice())?;
        write_descriptor(&mut self.streams.esf, elapsed, esf.as_slice())?;
        write_cloud(&mut self.streams.centered, elapsed, centered)?;
        write_cloud(&mut self.streams.filtered, elapsed, transformed)?;

        self.streams.vfh.flush()?;
        self.streams.esf.flush()?;
        self.streams.centered.flush()?;
        self.streams.filtered.flush()?;

        self.frames_written += 1;
        Ok(())
    }

    /// Flush and hand back the underlying streams
    pub fn finish(mut self) -> IoResult<OutputStreams<W>> {
        self.streams.vfh.flush()?;
        self.streams.esf.flush()?;
        self.streams.centered.flush()?;
        self.streams.filtered.flush()?;
        Ok(self.streams)
    }
}

/// Elapsed seconds are written at microsecond resolution
fn round_elapsed(elapsed: f64) -> f64 {
    (elapsed * 1e6).round() / 1e6
}

fn write_descriptor<W: Write>(out: &mut W, elapsed: f64, values: &[f32]) -> IoResult<()> {
    write!(out, "{}", elapsed)?;
    for value in values {
        write!(out, ",{}", value)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_cloud<W: Write>(out: &mut W, elapsed: f64, cloud: &PointCloud<Point3f>) -> IoResult<()> {
    writeln!(out, "{},{}", elapsed, cloud.len())?;
    for point in cloud.iter() {
        writeln!(out, "{},{},{}", point.x, point.y, point.z)?;
    }
    Ok(())
}
