use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};

use super::FrameSource;
use crate::error::{PipelineError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Still images decoded in order, standing in for a video stream
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    frame_rate: Option<f64>,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
            frame_rate: None,
        }
    }

    /// All images in `dir`, ordered by file name
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::SourceOpen {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(Self::new(paths))
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let image = ImageReader::open(&path)?
            .decode()
            .map_err(|source| PipelineError::ImageRead { path, source })?;

        Ok(Some(image))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }
}
