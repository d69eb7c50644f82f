pub mod ffmpeg;
pub mod sequence;

use std::path::Path;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{frame_stem, Frame, FrameManifest, FRAME_DEPTH};

pub use ffmpeg::FfmpegSource;
pub use sequence::ImageSequenceSource;

pub const DEFAULT_INTERVAL: u64 = 30;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Anything that yields decoded frames in stream order
pub trait FrameSource {
    /// Next decoded frame, or `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;

    /// Frames per second, when the source knows it
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: u64,
    pub jpeg_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Decode `source` from the start and write every `interval`-th frame to `output_dir`
pub fn sample(
    source: &mut dyn FrameSource,
    output_dir: &Path,
    interval: u64,
) -> Result<FrameManifest> {
    sample_with_config(
        source,
        output_dir,
        &SamplerConfig {
            interval,
            ..Default::default()
        },
    )
}

pub fn sample_with_config(
    source: &mut dyn FrameSource,
    output_dir: &Path,
    config: &SamplerConfig,
) -> Result<FrameManifest> {
    if config.interval == 0 {
        return Err(PipelineError::InvalidInterval);
    }

    create_output_dir(output_dir)?;

    let frame_rate = source.frame_rate().filter(|fps| *fps > 0.0);
    let mut manifest = FrameManifest::new(output_dir, config.interval);
    let mut ordinal: u64 = 0;

    while let Some(image) = source.next_frame()? {
        if ordinal % config.interval == 0 {
            let path = output_dir.join(format!("{}.jpg", frame_stem(ordinal)));
            let rgb = image.to_rgb8();
            write_jpeg(&rgb, &path, config.jpeg_quality)?;

            debug!("Wrote {} ({}x{})", path.display(), rgb.width(), rgb.height());

            manifest.frames.push(Frame {
                ordinal,
                path,
                width: rgb.width(),
                height: rgb.height(),
                depth: FRAME_DEPTH,
                timestamp: frame_rate.map(|fps| Duration::from_secs_f64(ordinal as f64 / fps)),
            });
        }
        ordinal += 1;
    }

    manifest.decoded = ordinal;
    info!(
        "Extracted {} of {} frames to {}",
        manifest.len(),
        manifest.decoded,
        output_dir.display()
    );

    Ok(manifest)
}

pub fn create_output_dir(output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir).map_err(|source| PipelineError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })
}

fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|source| PipelineError::ImageWrite {
            path: path.to_path_buf(),
            source,
        })
}
