use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::{DynamicImage, RgbImage};
use serde::Deserialize;
use tracing::{debug, warn};

use super::FrameSource;
use crate::error::{PipelineError, Result};

// ffprobe JSON response, only the fields we read

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    streams: Option<Vec<FFprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    side_data_list: Option<Vec<FFprobeSideData>>,
    tags: Option<FFprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FFprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FFprobeTags {
    rotate: Option<String>,
}

impl FFprobeStream {
    /// Display rotation in degrees, normalized to `0..360`
    fn rotation(&self) -> i64 {
        let from_side_data = self
            .side_data_list
            .iter()
            .flatten()
            .find_map(|d| d.rotation);
        let from_tags = || {
            self.tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        };

        let degrees = from_side_data.or_else(from_tags).unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

/// Stream properties reported by ffprobe.
/// `width`/`height` are the dimensions of the frames ffmpeg emits, i.e. after autorotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
}

impl StreamInfo {
    /// Parse `ffprobe -print_format json -show_streams` output for the first video stream
    pub fn from_json(json: &str) -> Option<Self> {
        let output: FFprobeOutput = serde_json::from_str(json).ok()?;
        let stream = output.streams?.into_iter().next()?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return None,
        };
        // ffmpeg autorotates, so quarter turns swap the emitted dimensions
        let (width, height) = match stream.rotation() {
            90 | 270 => (height, width),
            _ => (width, height),
        };

        let frame_rate = stream.r_frame_rate.as_deref().and_then(parse_rational);

        Some(Self { width, height, frame_rate })
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// `30000/1001` -> 29.97
fn parse_rational(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse::<f64>().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

/// Splits a raw rgb24 byte stream into fixed-size frames
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Next full frame, or `None` at end of stream.
    /// A truncated trailing frame counts as end of stream.
    pub fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(PipelineError::Decode(e.to_string())),
        }

        let image = RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| PipelineError::Decode("frame buffer size mismatch".to_string()))?;
        self.frames_read += 1;
        Ok(Some(image))
    }
}

/// A decoder that fails before emitting anything is an error, not an empty video
fn check_exit(success: bool, frames_read: u64, path: &Path) -> Result<()> {
    if success {
        return Ok(());
    }
    if frames_read == 0 {
        return Err(PipelineError::Decode(format!(
            "ffmpeg failed before producing any frame from {}",
            path.display()
        )));
    }
    warn!(
        "ffmpeg exited with an error after {} frames of {}",
        frames_read,
        path.display()
    );
    Ok(())
}

/// Decodes a video file through an `ffmpeg` child process emitting raw rgb24 frames
pub struct FfmpegSource {
    path: PathBuf,
    info: StreamInfo,
    child: Child,
    frames: RawFrameReader<ChildStdout>,
    finished: bool,
}

impl FfmpegSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let source_err = |reason: String| PipelineError::SourceOpen {
            path: path.clone(),
            reason,
        };

        if !path.is_file() {
            return Err(source_err("file not found".to_string()));
        }

        let info = read_stream_info(&path)?;
        debug!(
            "{}: {}x{} @ {:?} fps",
            path.display(),
            info.width,
            info.height,
            info.frame_rate
        );

        let mut child = Command::new("ffmpeg")
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(&path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| source_err(format!("failed to run ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| source_err("ffmpeg stdout unavailable".to_string()))?;

        Ok(Self {
            frames: RawFrameReader::new(stdout, info.width, info.height),
            path,
            info,
            child,
            finished: false,
        })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }
}

fn read_stream_info(path: &Path) -> Result<StreamInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| PipelineError::SourceOpen {
            path: path.to_path_buf(),
            reason: format!("failed to run ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(PipelineError::SourceOpen {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    StreamInfo::from_json(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        PipelineError::SourceOpen {
            path: path.to_path_buf(),
            reason: "no decodable video stream".to_string(),
        }
    })
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        if self.finished {
            return Ok(None);
        }

        match self.frames.read_frame()? {
            Some(image) => Ok(Some(DynamicImage::ImageRgb8(image))),
            None => {
                self.finished = true;
                let status = self.child.wait()?;
                check_exit(status.success(), self.frames.frames_read(), &self.path)?;
                Ok(None)
            }
        }
    }

    fn frame_rate(&self) -> Option<f64> {
        self.info.frame_rate
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
