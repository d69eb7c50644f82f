use std::collections::VecDeque;
use std::sync::Mutex;

use image::{DynamicImage, Rgb, RgbImage};
use prelabel::error::Result;
use prelabel::{Detector, FrameSource, RawDetection};

/// In-memory frame source yielding solid-color frames of the given sizes
pub struct VecSource {
    frames: VecDeque<DynamicImage>,
}

impl VecSource {
    pub fn uniform(count: usize, width: u32, height: u32) -> Self {
        Self::sized(&vec![(width, height); count])
    }

    pub fn sized(sizes: &[(u32, u32)]) -> Self {
        let frames = sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| {
                let shade = (i * 40 % 256) as u8;
                DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([shade, 128, 255 - shade])))
            })
            .collect();
        Self { frames }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Detector test double returning scripted results, one entry per call
pub struct ScriptedDetector {
    script: Mutex<VecDeque<anyhow::Result<Vec<RawDetection>>>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<anyhow::Result<Vec<RawDetection>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    pub fn ok(script: Vec<Vec<RawDetection>>) -> Self {
        Self::new(script.into_iter().map(Ok).collect())
    }
}

impl Detector for ScriptedDetector {
    fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Person box in absolute pixels
pub fn person(cx: f32, cy: f32, w: f32, h: f32) -> RawDetection {
    RawDetection::new(0, cx, cy, w, h).with_confidence(0.9)
}

/// Read a file in the output directory as a string
pub fn read(dir: &std::path::Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).expect("Failed to read output file")
}
