use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::annotation::AnnotationFormatter;
use crate::detection::{DetectionAdapter, DetectionConfig, Detector};
use crate::error::{PipelineError, Result};
use crate::models::{frame_stem, AnnotationDocument, DetectionRecord, Frame, FrameManifest};
use crate::sampler::{self, FrameSource, SamplerConfig};

/// Per-frame state carried through the steps
#[derive(Debug, Clone)]
pub struct FrameWork {
    pub frame: Frame,
    pub records: Option<Vec<DetectionRecord>>,
    pub document: Option<AnnotationDocument>,
}

impl FrameWork {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            records: None,
            document: None,
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Directory receiving box previews
    pub output_dir: PathBuf,
}

/// Context available to all frame steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// One stage of per-frame work
pub trait FrameStep {
    fn process(&self, work: &mut FrameWork, context: &PipelineContext) -> Result<()>;

    /// Human-readable name for this step (used in logs and failure reports)
    fn name(&self) -> &str;
}

/// Runs the detector and writes the normalized sidecar
pub struct DetectStep {
    pub detector: Arc<dyn Detector>,
    pub class_id: u32,
}

impl FrameStep for DetectStep {
    fn process(&self, work: &mut FrameWork, _context: &PipelineContext) -> Result<()> {
        let adapter = DetectionAdapter::new(self.detector.as_ref(), self.class_id);
        work.records = Some(adapter.process_frame(&work.frame)?);
        Ok(())
    }

    fn name(&self) -> &str {
        "Detection"
    }
}

/// Converts the sidecar into a VOC document next to the frame
pub struct FormatStep {
    pub formatter: AnnotationFormatter,
}

impl FrameStep for FormatStep {
    fn process(&self, work: &mut FrameWork, _context: &PipelineContext) -> Result<()> {
        work.document = Some(self.formatter.process_frame(&work.frame)?);
        Ok(())
    }

    fn name(&self) -> &str {
        "Annotation"
    }
}

/// Draws the document's boxes onto a copy of the frame (debug mode only)
pub struct PreviewStep;

impl FrameStep for PreviewStep {
    fn process(&self, work: &mut FrameWork, context: &PipelineContext) -> Result<()> {
        let (Some(debug_config), Some(doc)) = (&context.debug, &work.document) else {
            return Ok(());
        };

        let mut img = image::open(&work.frame.path)
            .map_err(|source| PipelineError::ImageRead {
                path: work.frame.path.clone(),
                source,
            })?
            .to_rgb8();

        for object in &doc.objects {
            let b = object.bndbox;
            if b.width() <= 0 || b.height() <= 0 {
                continue;
            }
            let rect = Rect::at(b.x_min as i32, b.y_min as i32)
                .of_size(b.width() as u32, b.height() as u32);
            draw_hollow_rect_mut(&mut img, rect, Rgb([0, 255, 0]));
        }

        let output_path = debug_config
            .output_dir
            .join(format!("{}.png", frame_stem(work.frame.ordinal)));
        img.save(&output_path)
            .map_err(|source| PipelineError::ImageWrite {
                path: output_path.clone(),
                source,
            })?;

        debug!("Debug: saved {}", output_path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "Preview"
    }
}

/// A frame that did not make it through every step
#[derive(Debug)]
pub struct FrameFailure {
    pub ordinal: u64,
    pub step: String,
    pub error: PipelineError,
}

/// Outcome of a full run
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub manifest: FrameManifest,
    /// Frames that completed every step
    pub completed: usize,
    /// Completed frames that produced an annotation document
    pub annotated: usize,
    pub objects: usize,
    pub failures: Vec<FrameFailure>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn annotated(&self) -> usize {
        self.annotated
    }

    pub fn object_count(&self) -> usize {
        self.objects
    }

    /// Count a finished frame; its records and document are not retained
    fn record_completed(&mut self, work: &FrameWork) {
        self.completed += 1;
        if let Some(doc) = &work.document {
            self.annotated += 1;
            self.objects += doc.objects.len();
        }
    }
}

/// Composable pipeline builder: sample frames, then run every step on each frame
pub struct Pipeline {
    steps: Vec<Arc<dyn FrameStep>>,
    context: PipelineContext,
    sampler: SamplerConfig,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
            sampler: SamplerConfig::default(),
        }
    }

    /// Detect, format, and preview (when debug is enabled)
    pub fn standard(detector: Arc<dyn Detector>, detection: DetectionConfig) -> Self {
        Pipeline::new()
            .add_step(Arc::new(DetectStep {
                detector,
                class_id: detection.class_id,
            }))
            .add_step(Arc::new(FormatStep {
                formatter: AnnotationFormatter::new(detection.label),
            }))
            .add_step(Arc::new(PreviewStep))
    }

    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.sampler.interval = interval;
        self
    }

    /// Enable debug previews.
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn FrameStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Sample `source` into `output_dir` and process every sampled frame.
    /// Batch-level failures abort; per-frame failures are collected in the report.
    pub fn run(&self, source: &mut dyn FrameSource, output_dir: &Path) -> Result<PipelineReport> {
        let manifest = sampler::sample_with_config(source, output_dir, &self.sampler)?;
        Ok(self.process_manifest(manifest))
    }

    /// Run the steps over an existing manifest, in manifest order
    pub fn process_manifest(&self, manifest: FrameManifest) -> PipelineReport {
        let mut report = PipelineReport::default();

        if !self.steps.is_empty() {
            info!(
                "Processing {} frames: {}",
                manifest.len(),
                self.step_names().join(" -> ")
            );
        }

        for frame in &manifest.frames {
            let mut work = FrameWork::new(frame.clone());
            let mut failed = false;

            for step in &self.steps {
                if let Err(error) = step.process(&mut work, &self.context) {
                    warn!("Skipping frame {} after {} error: {}", frame.ordinal, step.name(), error);
                    report.failures.push(FrameFailure {
                        ordinal: frame.ordinal,
                        step: step.name().to_string(),
                        error,
                    });
                    failed = true;
                    break;
                }
            }

            if !failed {
                debug!(
                    "Frame {} done: {} objects",
                    frame.ordinal,
                    work.document.as_ref().map(|d| d.objects.len()).unwrap_or(0)
                );
                report.record_completed(&work);
            }
        }

        report.manifest = manifest;
        report
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageSize, ObjectEntry, PixelBox};

    fn work(ordinal: u64, objects: Option<usize>) -> FrameWork {
        let mut work = FrameWork::new(Frame {
            ordinal,
            path: PathBuf::from(format!("{}.jpg", frame_stem(ordinal))),
            width: 10,
            height: 10,
            depth: 3,
            timestamp: None,
        });
        work.document = objects.map(|n| {
            let mut doc = AnnotationDocument::new(
                work.frame.file_name(),
                ImageSize { width: 10, height: 10, depth: 3 },
            );
            let bndbox = PixelBox { x_min: 1, y_min: 1, x_max: 5, y_max: 5 };
            doc.objects = vec![ObjectEntry::new("person", bndbox); n];
            doc
        });
        work
    }

    #[test]
    fn test_report_keeps_counts_only() {
        let mut report = PipelineReport::default();
        report.record_completed(&work(0, Some(2)));
        report.record_completed(&work(1, Some(0)));
        report.record_completed(&work(2, None));

        assert_eq!(report.completed, 3);
        assert_eq!(report.annotated(), 2);
        assert_eq!(report.object_count(), 2);
        assert!(report.is_success());
    }
}
