//! Recorded session replay
//!
//! A session file holds a sequence of records. Each record starts with a
//! header line `channel,timestamp,count` followed by `count` lines `x,y,z`.
//! Blank lines and lines starting with `#` are ignored anywhere in the file.

use crate::error::{IoError, IoResult};
use featcrate_core::{Frame, Point3f, PointCloud};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Channel carrying the depth clouds of a capture
pub const DEFAULT_CHANNEL: &str = "/cloth/cloud";

/// Upper bound on the points preallocated for one record; larger records grow as they are read
const MAX_PREALLOCATED_POINTS: usize = 1 << 16;

/// Path of the session file recorded for `session`
pub fn session_path(session: &str) -> PathBuf {
    PathBuf::from(format!("{}Cloud.txt", session))
}

/// Streaming reader yielding the frames of one channel in file order.
///
/// Records on other channels are skipped. Timestamps of yielded frames must
/// not decrease. After the first error the reader yields nothing more.
pub struct SessionReader<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
    channel: String,
    last_timestamp: Option<f64>,
    finished: bool,
}

impl SessionReader<BufReader<File>> {
    /// Open a session file for replay of `channel`
    pub fn open<P: AsRef<Path>>(path: P, channel: &str) -> IoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IoError::from_open(e, path))?;
        debug!("replaying {} on channel {}", path.display(), channel);
        Ok(Self::new(BufReader::new(file), channel))
    }
}

impl<R: BufRead> SessionReader<R> {
    pub fn new(reader: R, channel: &str) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            channel: channel.to_string(),
            last_timestamp: None,
            finished: false,
        }
    }

    /// Next line with content, as `(line number, trimmed text)`
    fn next_content_line(&mut self) -> IoResult<Option<(usize, String)>> {
        for line in self.lines.by_ref() {
            self.line_number += 1;
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some((self.line_number, trimmed.to_string())));
        }
        Ok(None)
    }

    fn read_record(&mut self) -> IoResult<Option<(String, Frame)>> {
        let Some((header_line, header)) = self.next_content_line()? else {
            return Ok(None);
        };

        let fields: Vec<&str> = header.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(IoError::parse(
                header_line,
                format!("expected record header 'channel,timestamp,count', got '{}'", header),
            ));
        }

        let channel = fields[0].to_string();
        let timestamp: f64 = fields[1].parse().map_err(|_| {
            IoError::parse(header_line, format!("invalid timestamp '{}'", fields[1]))
        })?;
        if !timestamp.is_finite() {
            return Err(IoError::parse(header_line, format!("invalid timestamp '{}'", fields[1])));
        }
        let count: usize = fields[2].parse().map_err(|_| {
            IoError::parse(header_line, format!("invalid point count '{}'", fields[2]))
        })?;

        let mut points = PointCloud::with_capacity(count.min(MAX_PREALLOCATED_POINTS));
        for _ in 0..count {
            let Some((line, text)) = self.next_content_line()? else {
                return Err(IoError::parse(
                    self.line_number,
                    format!("record at line {} ends after {} of {} points", header_line, points.len(), count),
                ));
            };
            points.push(parse_point(line, &text)?);
        }

        Ok(Some((channel, Frame::new(timestamp, points))))
    }
}

fn parse_point(line: usize, text: &str) -> IoResult<Point3f> {
    let mut coords = [0.0f32; 3];
    let mut fields = text.split(',');
    for coord in coords.iter_mut() {
        let field = fields
            .next()
            .ok_or_else(|| IoError::parse(line, format!("expected 'x,y,z', got '{}'", text)))?;
        *coord = field
            .trim()
            .parse()
            .map_err(|_| IoError::parse(line, format!("invalid coordinate '{}'", field.trim())))?;
    }
    if fields.next().is_some() {
        return Err(IoError::parse(line, format!("expected 'x,y,z', got '{}'", text)));
    }
    Ok(Point3f::new(coords[0], coords[1], coords[2]))
}

impl<R: BufRead> Iterator for SessionReader<R> {
    type Item = IoResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.read_record() {
                Ok(Some((channel, frame))) => {
                    if channel != self.channel {
                        continue;
                    }
                    if let Some(last) = self.last_timestamp {
                        if frame.timestamp < last {
                            self.finished = true;
                            return Some(Err(IoError::parse(
                                self.line_number,
                                format!("timestamp {} precedes previous frame at {}", frame.timestamp, last),
                            )));
                        }
                    }
                    self.last_timestamp = Some(frame.timestamp);
                    return Some(Ok(frame));
                }
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
