pub mod nms;
pub mod preprocessing;
pub mod yolo;

use std::io::Write;
use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::{DetectionRecord, Frame, RawDetection};

pub use yolo::{YoloConfig, YoloDetector};

/// COCO class id for "person"
pub const PERSON_CLASS_ID: u32 = 0;
pub const PERSON_LABEL: &str = "person";

/// Detection oracle: boxes for one image, in absolute pixel units
pub trait Detector {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>>;

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// Which detector class survives filtering and how its objects are labeled
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub class_id: u32,
    pub label: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            class_id: PERSON_CLASS_ID,
            label: PERSON_LABEL.to_string(),
        }
    }
}

/// Runs the injected detector and keeps only the target class, normalized by frame size
pub struct DetectionAdapter<'a> {
    detector: &'a dyn Detector,
    class_id: u32,
}

impl<'a> DetectionAdapter<'a> {
    pub fn new(detector: &'a dyn Detector, class_id: u32) -> Self {
        Self { detector, class_id }
    }

    /// Records for one frame image
    pub fn detect(&self, image: &DynamicImage, frame_path: &Path) -> Result<Vec<DetectionRecord>> {
        let raw = self
            .detector
            .detect(image)
            .map_err(|e| PipelineError::Detector {
                path: frame_path.to_path_buf(),
                reason: format!("{:#}", e),
            })?;

        let total = raw.len();
        let records = filter_and_normalize(&raw, self.class_id, image.width(), image.height());

        debug!(
            "{}: {} of {} detections are class {}",
            frame_path.display(),
            records.len(),
            total,
            self.class_id
        );

        Ok(records)
    }

    /// Load the frame image, detect, and write its sidecar
    pub fn process_frame(&self, frame: &Frame) -> Result<Vec<DetectionRecord>> {
        let image = image::open(&frame.path).map_err(|source| PipelineError::ImageRead {
            path: frame.path.clone(),
            source,
        })?;

        let records = self.detect(&image, &frame.path)?;
        write_sidecar(&frame.sidecar_path(), &records)?;
        Ok(records)
    }
}

pub fn filter_and_normalize(
    raw: &[RawDetection],
    class_id: u32,
    frame_width: u32,
    frame_height: u32,
) -> Vec<DetectionRecord> {
    raw.iter()
        .filter(|d| d.class_id == class_id)
        .map(|d| DetectionRecord::from_raw(d, class_id, frame_width, frame_height))
        .collect()
}

/// One record per line; an empty record set leaves an empty file
pub fn write_sidecar(path: &Path, records: &[DetectionRecord]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        writeln!(file, "{}", record)?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Vec<RawDetection>);

    impl Detector for FixedDetector {
        fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
            anyhow::bail!("inference exploded")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_filters_other_classes() {
        let detector = FixedDetector(vec![
            RawDetection::new(0, 50.0, 40.0, 20.0, 10.0),
            RawDetection::new(2, 10.0, 10.0, 5.0, 5.0),
            RawDetection::new(0, 100.0, 80.0, 100.0, 80.0),
        ]);
        let adapter = DetectionAdapter::new(&detector, PERSON_CLASS_ID);
        let image = DynamicImage::new_rgb8(200, 160);

        let records = adapter.detect(&image, Path::new("frame_0000.jpg")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].x_center, 0.25);
        assert_eq!(records[0].y_center, 0.25);
        assert_eq!(records[1].width, 0.5);
        assert_eq!(records[1].height, 0.5);
    }

    #[test]
    fn test_detector_failure_is_reported() {
        let adapter = DetectionAdapter::new(&FailingDetector, PERSON_CLASS_ID);
        let image = DynamicImage::new_rgb8(10, 10);
        let err = adapter.detect(&image, Path::new("frame_0000.jpg")).unwrap_err();
        assert!(err.is_per_frame());
        assert!(err.to_string().contains("inference exploded"));
    }

    #[test]
    fn test_write_sidecar_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame_0000.txt");
        let raw = [RawDetection::new(0, 100.0, 100.0, 50.0, 50.0)];
        let records = filter_and_normalize(&raw, 0, 200, 200);

        write_sidecar(&path, &records).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0 0.5 0.5 0.25 0.25\n");

        write_sidecar(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
