pub mod annotation;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sampler;

pub use annotation::AnnotationFormatter;
pub use detection::{DetectionAdapter, DetectionConfig, Detector, YoloConfig, YoloDetector};
pub use error::PipelineError;
pub use models::{
    AnnotationDocument, DetectionRecord, Frame, FrameManifest, ImageSize, ObjectEntry, PixelBox,
    RawDetection,
};
pub use pipeline::{
    DetectStep, FormatStep, FrameStep, FrameWork, Pipeline, PipelineContext, PipelineReport,
    PreviewStep,
};
pub use sampler::{FfmpegSource, FrameSource, ImageSequenceSource, SamplerConfig};
