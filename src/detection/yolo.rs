use std::path::{Path, PathBuf};

use image::DynamicImage;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, NdTensorView};

use super::Detector;
use super::nms::non_max_suppression;
use super::preprocessing::{self, Letterbox};
use crate::error::{PipelineError, Result};
use crate::models::RawDetection;

#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    /// Side of the square model input
    pub input_size: u32,
    pub confidence: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("yolov8n.rten"),
            input_size: 640,
            confidence: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// YOLOv8 detector running an exported `.rten` model
pub struct YoloDetector {
    model: Model,
    config: YoloConfig,
}

impl YoloDetector {
    pub fn load(config: YoloConfig) -> Result<Self> {
        let path = &config.model_path;

        if !path.exists() {
            return Err(PipelineError::ModelLoad(format!(
                "Model not found: {}\n\
                 Export one with: yolo export model=yolov8n.pt format=onnx && rten-convert yolov8n.onnx",
                path.display()
            )));
        }

        let model = Model::load_file(path)
            .map_err(|e| PipelineError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Ok(Self { model, config })
    }

    pub fn model_path(&self) -> &Path {
        &self.config.model_path
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        let (canvas, lb) = preprocessing::letterbox(image, self.config.input_size);
        let input = preprocessing::to_input_tensor(&canvas);

        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| anyhow::anyhow!("Inference failed: {}", e))?
            .try_into()
            .map_err(|e| anyhow::anyhow!("Unexpected model output: {:?}", e))?;

        let candidates = decode_output(output.view(), &lb, self.config.confidence);
        Ok(non_max_suppression(
            candidates,
            self.config.iou_threshold,
            self.config.max_detections,
        ))
    }

    fn name(&self) -> &str {
        "YOLOv8"
    }
}

/// Decode a `[1, 4 + classes, anchors]` YOLOv8 head into frame-space boxes
pub fn decode_output(
    output: NdTensorView<f32, 3>,
    lb: &Letterbox,
    confidence: f32,
) -> Vec<RawDetection> {
    let rows = output.size(1);
    let anchors = output.size(2);
    if rows <= 4 {
        return Vec::new();
    }

    let mut detections = Vec::new();

    for i in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::MIN;
        for c in 4..rows {
            let score = output[[0, c, i]];
            if score > best_score {
                best_score = score;
                best_class = c - 4;
            }
        }

        if best_score < confidence {
            continue;
        }

        let (cx, cy, w, h) = lb.unmap(
            output[[0, 0, i]],
            output[[0, 1, i]],
            output[[0, 2, i]],
            output[[0, 3, i]],
        );

        detections.push(
            RawDetection::new(best_class as u32, cx, cy, w, h).with_confidence(best_score),
        );
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_load_error() {
        let config = YoloConfig {
            model_path: PathBuf::from("/no/such/model.rten"),
            ..Default::default()
        };
        let err = YoloDetector::load(config).err().unwrap();
        assert!(matches!(err, PipelineError::ModelLoad(_)));
    }

    #[test]
    fn test_decode_output_picks_best_class() {
        // 2 anchors, 3 classes: rows = cx, cy, w, h, c0, c1, c2
        #[rustfmt::skip]
        let data = vec![
            320.0, 100.0,
            320.0, 100.0,
            50.0,  10.0,
            100.0, 10.0,
            0.9,   0.1,
            0.2,   0.1,
            0.1,   0.2,
        ];
        let output = NdTensor::from_data([1, 7, 2], data);
        let lb = Letterbox::for_size(1280, 720, 640);

        let dets = decode_output(output.view(), &lb, 0.25);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 0);
        assert_eq!(dets[0].center_x, 640.0);
        assert_eq!(dets[0].center_y, 360.0);
        assert_eq!(dets[0].width, 100.0);
        assert_eq!(dets[0].height, 200.0);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
    }
}
