mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from prelabel for tests
pub use prelabel::{
    AnnotationFormatter, DetectionConfig, Detector, FrameSource, Pipeline, PipelineError,
    RawDetection,
};
