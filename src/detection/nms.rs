use crate::models::RawDetection;

/// Class-wise non-maximum suppression, highest confidence first
pub fn non_max_suppression(
    mut detections: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();

    'outer: for det in detections {
        for k in &kept {
            if k.class_id == det.class_id && k.iou(&det) >= iou_threshold {
                continue 'outer;
            }
        }
        kept.push(det);
        if kept.len() >= max_detections {
            break;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppresses_overlapping_same_class() {
        let dets = vec![
            RawDetection::new(0, 10.0, 10.0, 10.0, 10.0).with_confidence(0.6),
            RawDetection::new(0, 11.0, 10.0, 10.0, 10.0).with_confidence(0.9),
            RawDetection::new(1, 11.0, 10.0, 10.0, 10.0).with_confidence(0.5),
            RawDetection::new(0, 80.0, 80.0, 10.0, 10.0).with_confidence(0.3),
        ];

        let kept = non_max_suppression(dets, 0.45, 100);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 1);
        assert_eq!(kept[2].center_x, 80.0);
    }

    #[test]
    fn test_respects_max_detections() {
        let dets = (0..10)
            .map(|i| RawDetection::new(0, i as f32 * 100.0, 0.0, 10.0, 10.0))
            .collect();
        assert_eq!(non_max_suppression(dets, 0.45, 4).len(), 4);
    }
}
