/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Short-range model: 128×128 input, 896 anchors, no keypoints used.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::execution_provider::{build_session, Device};
use crate::detection::infrastructure::image_tensor::{
    bbox_iou, input_shape, sigmoid, to_square_tensor, TensorLayout,
};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    layout: TensorLayout,
    input_size: u32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(
        model_path: &Path,
        confidence: f64,
        device: Device,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, device)?;
        let (layout, input_size) = input_shape(&session)
            .map(|shape| TensorLayout::from_shape(&shape, INPUT_SIZE))
            .unwrap_or((TensorLayout::Nchw, INPUT_SIZE));
        Ok(Self {
            session,
            confidence,
            layout,
            input_size,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let input_tensor = to_square_tensor(frame, self.input_size, self.layout);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut dets = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            self.input_size as f32,
            (frame.width() as f32, frame.height() as f32),
        );
        Ok(nms(&mut dets, NMS_IOU_THRESH)
            .into_iter()
            .map(|d| FaceBox::from_corners(d[0], d[1], d[2], d[3], d[4]))
            .collect())
    }
}

/// Decodes anchor-relative boxes into frame pixels, as `[x1, y1, x2, y2, score]`.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    input_size: f32,
    (fw, fh): (f32, f32),
) -> Vec<[f64; 5]> {
    let mut dets = Vec::new();
    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }
        let anchor = anchors[i];
        let cx = anchor[0] + reg_data[offset] / input_size;
        let cy = anchor[1] + reg_data[offset + 1] / input_size;
        let w = reg_data[offset + 2] / input_size;
        let h = reg_data[offset + 3] / input_size;

        let x1 = ((cx - w / 2.0) * fw).max(0.0);
        let y1 = ((cy - h / 2.0) * fh).max(0.0);
        let x2 = ((cx + w / 2.0) * fw).min(fw);
        let y2 = ((cy + h / 2.0) * fh).min(fh);
        dets.push([x1 as f64, y1 as f64, x2 as f64, y2 as f64, score as f64]);
    }
    dets
}

/// Short-range anchors: a 16×16 grid with 2 anchors per cell and an
/// 8×8 grid with 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

/// Greedy NMS. Output is sorted by descending score.
fn nms(dets: &mut [[f64; 5]], iou_thresh: f64) -> Vec<[f64; 5]> {
    dets.sort_by(|a, b| b[4].partial_cmp(&a[4]).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<[f64; 5]> = Vec::new();
    for det in dets.iter() {
        let corners = [det[0], det[1], det[2], det[3]];
        let overlaps = keep
            .iter()
            .any(|k| bbox_iou(&[k[0], k[1], k[2], k[3]], &corners) > iou_thresh);
        if !overlaps {
            keep.push(*det);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_anchors_count() {
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_decode_filters_by_confidence() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let mut reg = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        // 64px box centred on the first anchor
        reg[2] = 64.0;
        reg[3] = 64.0;
        let scores = vec![5.0f32, -5.0];
        let dets = decode(&reg, &scores, &anchors, 0.5, 128.0, (256.0, 256.0));
        assert_eq!(dets.len(), 1);
        let d = dets[0];
        assert!((d[0] - 64.0).abs() < 1e-3);
        assert!((d[2] - 192.0).abs() < 1e-3);
        assert!(d[4] > 0.99);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let anchors = vec![[0.05, 0.05]];
        let mut reg = vec![0.0f32; REGRESSOR_STRIDE];
        reg[2] = 64.0;
        reg[3] = 64.0;
        let dets = decode(&reg, &[5.0], &anchors, 0.5, 128.0, (100.0, 100.0));
        assert_eq!(dets[0][0], 0.0);
        assert_eq!(dets[0][1], 0.0);
    }

    #[test]
    fn test_nms_suppresses_overlap_and_sorts() {
        let mut dets = vec![
            [200.0, 200.0, 250.0, 250.0, 0.6],
            [5.0, 5.0, 105.0, 105.0, 0.7],
            [0.0, 0.0, 100.0, 100.0, 0.9],
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0][4], 0.9);
        assert_eq!(kept[1][4], 0.6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(&mut [], 0.3).is_empty());
    }
}
