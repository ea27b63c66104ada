//! MediaPipe-style 468-point face mesh using ONNX Runtime via `ort`.

use std::path::Path;

use crate::detection::domain::landmark_model::{LandmarkModel, RawLandmarks};
use crate::detection::domain::landmark_set::LANDMARK_COUNT;
use crate::detection::infrastructure::execution_provider::{build_session, Device};
use crate::detection::infrastructure::image_tensor::{
    input_shape, sigmoid, to_square_tensor, TensorLayout,
};
use crate::shared::frame::Frame;

/// Face mesh input resolution.
const INPUT_SIZE: u32 = 192;

/// `x, y, z` per landmark.
const MESH_VALUES: usize = LANDMARK_COUNT * 3;

pub struct OnnxFaceMesh {
    session: ort::session::Session,
    layout: TensorLayout,
    input_size: u32,
}

impl OnnxFaceMesh {
    pub fn new(model_path: &Path, device: Device) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, device)?;
        let (layout, input_size) = input_shape(&session)
            .map(|shape| TensorLayout::from_shape(&shape, INPUT_SIZE))
            .unwrap_or((TensorLayout::Nhwc, INPUT_SIZE));
        log::debug!("Face mesh input: {layout:?} {input_size}x{input_size}");
        Ok(Self {
            session,
            layout,
            input_size,
        })
    }
}

impl LandmarkModel for OnnxFaceMesh {
    fn infer(&mut self, crop: &Frame) -> Result<Option<RawLandmarks>, Box<dyn std::error::Error>> {
        if crop.width() == 0 || crop.height() == 0 {
            return Ok(None);
        }
        let input_tensor = to_square_tensor(crop, self.input_size, self.layout);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // Outputs are told apart by size: 1404 mesh values and a 1-element logit.
        let mut mesh: Option<Vec<f32>> = None;
        let mut presence: Option<f32> = None;
        for i in 0..outputs.len() {
            let array = outputs[i].try_extract_array::<f32>()?;
            match array.len() {
                MESH_VALUES => mesh = Some(array.iter().copied().collect()),
                1 => presence = array.iter().next().copied(),
                _ => {}
            }
        }
        let mesh = mesh.ok_or("face mesh model produced no 1404-value landmark output")?;
        let presence = presence.ok_or("face mesh model produced no presence score")?;

        Ok(Some(decode(&mesh, presence, self.input_size as f32)))
    }
}

/// Converts input-pixel mesh coordinates to crop-normalized points.
fn decode(mesh: &[f32], presence_logit: f32, input_size: f32) -> RawLandmarks {
    let points = mesh
        .chunks_exact(3)
        .map(|xyz| (xyz[0] / input_size, xyz[1] / input_size))
        .collect();
    RawLandmarks {
        points,
        confidence: sigmoid(presence_logit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_normalizes_by_input_size() {
        let mut mesh = vec![0.0f32; MESH_VALUES];
        mesh[0] = 96.0;
        mesh[1] = 48.0;
        mesh[2] = -7.0;
        mesh[3] = 192.0;
        let raw = decode(&mesh, 0.0, 192.0);
        assert_eq!(raw.points.len(), LANDMARK_COUNT);
        assert_eq!(raw.points[0], (0.5, 0.25));
        assert_eq!(raw.points[1].0, 1.0);
        assert!((raw.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_low_logit_gives_low_confidence() {
        let raw = decode(&vec![0.0; MESH_VALUES], -6.0, 192.0);
        assert!(raw.confidence < 0.01);
    }
}
