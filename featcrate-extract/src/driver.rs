//! Session replay driver
//!
//! Reads frames in order, runs each one through the feature pipeline, writes
//! the results and paces the loop. One frame is fully written before the
//! next one is read.

use crate::rate::Rate;
use anyhow::{Context, Result};
use featcrate_algorithms::{FeaturePipeline, PipelineConfig};
use featcrate_core::{Frame, Point3f, PointCloud, Transform3D};
use featcrate_io::{
    read_calibration, session_path, FrameWriter, IoResult, OutputPaths, SessionReader, DEFAULT_CHANNEL,
};
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Settings of a replay run
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Target loop rate; `None` replays as fast as frames are processed
    pub rate_hz: Option<f64>,
    /// Directory holding the session file
    pub input_dir: PathBuf,
    /// Directory receiving the four output files
    pub output_dir: PathBuf,
    /// Channel whose records are replayed
    pub channel: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rate_hz: Some(30.0),
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from(".."),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

/// Receives every centered cloud, e.g. to display it.
///
/// Observers see the data after it was written and cannot change outputs.
pub trait FrameObserver {
    fn on_frame(&mut self, _index: usize, _elapsed: f64, _centered: &PointCloud<Point3f>) {}
}

/// Observer that ignores every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FrameObserver for NoopObserver {}

/// Totals of a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: usize,
    /// Elapsed time of the last frame relative to the first
    pub duration: f64,
}

/// Replay `frames` through `pipeline`, appending every result to `writer`.
///
/// Elapsed times are taken relative to the first frame's timestamp. The
/// first read, processing or write error ends the run.
pub fn run_session<I, W, O>(
    frames: I,
    pipeline: &FeaturePipeline,
    calibration: &Transform3D,
    writer: &mut FrameWriter<W>,
    observer: &mut O,
    mut rate: Option<Rate>,
) -> Result<SessionSummary>
where
    I: IntoIterator<Item = IoResult<Frame>>,
    W: Write,
    O: FrameObserver + ?Sized,
{
    let mut summary = SessionSummary::default();
    let mut start: Option<f64> = None;

    for (index, frame) in frames.into_iter().enumerate() {
        let frame = frame.with_context(|| format!("failed to read frame {}", index))?;
        let begin = *start.get_or_insert(frame.timestamp);
        let elapsed = frame.elapsed_since(begin);

        let processed = pipeline
            .process(&frame.points, calibration)
            .with_context(|| format!("failed to process frame {}", index))?;

        writer
            .write_frame(
                elapsed,
                &processed.vfh,
                &processed.esf,
                &processed.centered,
                &processed.transformed,
            )
            .with_context(|| format!("failed to write frame {}", index))?;

        let stats = &processed.stats;
        info!("frame {} at {:.3}s", index, elapsed);
        info!(
            "points {}, voxel grid {}, outlier filter {}, vfh {}, esf {}",
            stats.input_points, stats.downsampled_points, stats.filtered_points, stats.vfh_count, stats.esf_count
        );

        observer.on_frame(index, elapsed, &processed.centered);

        summary.frames += 1;
        summary.duration = elapsed;

        if let Some(rate) = rate.as_mut() {
            rate.sleep();
        }
    }

    Ok(summary)
}

/// Replay the recorded session `session` with the calibration at `calibration`.
///
/// Inputs are opened before any output file is created, so a missing session
/// or calibration leaves earlier results untouched.
pub fn extract_session<O: FrameObserver + ?Sized>(
    session: &str,
    calibration: &Path,
    config: &DriverConfig,
    pipeline_config: PipelineConfig,
    observer: &mut O,
) -> Result<SessionSummary> {
    let pipeline = FeaturePipeline::new(pipeline_config).context("invalid pipeline configuration")?;

    let transform = read_calibration(calibration)
        .with_context(|| format!("failed to load calibration {}", calibration.display()))?;

    let input = config.input_dir.join(session_path(session));
    let frames = SessionReader::open(&input, &config.channel)
        .with_context(|| format!("failed to open session {}", input.display()))?;
    info!("replaying {} on channel {}", input.display(), config.channel);

    let paths = OutputPaths::for_session(session, &config.output_dir);
    let mut writer = FrameWriter::create(&paths)
        .with_context(|| format!("failed to create outputs in {}", config.output_dir.display()))?;

    let rate = config.rate_hz.and_then(Rate::new);
    let summary = run_session(frames, &pipeline, &transform, &mut writer, observer, rate)?;
    writer.finish().context("failed to flush outputs")?;

    Ok(summary)
}
