//! Tensor helpers shared by the ONNX face models.

use ndarray::Array4;

use crate::shared::frame::Frame;

/// Memory layout of a model's image input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

impl TensorLayout {
    /// Infers layout and square input size from a model input shape.
    ///
    /// Dynamic dimensions (`<= 0`) fall back to `default_size`.
    pub fn from_shape(shape: &[i64], default_size: u32) -> (TensorLayout, u32) {
        if shape.len() != 4 {
            return (TensorLayout::Nchw, default_size);
        }
        let size = |dim: i64| if dim > 0 { dim as u32 } else { default_size };
        if shape[3] == 3 && shape[1] != 3 {
            (TensorLayout::Nhwc, size(shape[1]))
        } else {
            (TensorLayout::Nchw, size(shape[2]))
        }
    }
}

/// Reads the first input's shape from an ONNX session.
pub fn input_shape(session: &ort::session::Session) -> Option<Vec<i64>> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            Some(shape.iter().copied().collect())
        } else {
            None
        }
    })
}

/// Nearest-neighbour resize to `size × size`, scaled to `[0, 1]`.
pub fn to_square_tensor(frame: &Frame, size: u32, layout: TensorLayout) -> Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = match layout {
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
    };
    if src_h == 0 || src_w == 0 {
        return tensor;
    }

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                let value = src[[src_y, src_x, c]] as f32 / 255.0;
                match layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                }
            }
        }
    }

    tensor
}

/// IoU between two boxes given as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::nchw(&[1, 3, 192, 192], TensorLayout::Nchw, 192)]
    #[case::nhwc(&[1, 192, 192, 3], TensorLayout::Nhwc, 192)]
    #[case::dynamic_nchw(&[-1, 3, -1, -1], TensorLayout::Nchw, 128)]
    #[case::dynamic_nhwc(&[1, -1, -1, 3], TensorLayout::Nhwc, 128)]
    #[case::wrong_rank(&[1, 3], TensorLayout::Nchw, 128)]
    fn test_layout_from_shape(
        #[case] shape: &[i64],
        #[case] layout: TensorLayout,
        #[case] size: u32,
    ) {
        assert_eq!(TensorLayout::from_shape(shape, 128), (layout, size));
    }

    #[test]
    fn test_square_tensor_shapes() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 0);
        assert_eq!(
            to_square_tensor(&frame, 128, TensorLayout::Nchw).shape(),
            &[1, 3, 128, 128]
        );
        assert_eq!(
            to_square_tensor(&frame, 64, TensorLayout::Nhwc).shape(),
            &[1, 64, 64, 3]
        );
    }

    #[test]
    fn test_square_tensor_keeps_channel_order() {
        let mut data = Vec::with_capacity(4 * 4 * 3);
        for _ in 0..16 {
            data.extend_from_slice(&[255, 0, 51]);
        }
        let frame = Frame::new(data, 4, 4, 0);
        let nchw = to_square_tensor(&frame, 8, TensorLayout::Nchw);
        let nhwc = to_square_tensor(&frame, 8, TensorLayout::Nhwc);
        assert!((nchw[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert!(nchw[[0, 1, 3, 3]].abs() < 1e-6);
        assert!((nhwc[[0, 3, 3, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        assert!((bbox_iou(&a, &a) - 1.0).abs() < 1e-9);
        assert!((bbox_iou(&a, &b) - 25.0 / 175.0).abs() < 1e-9);
        assert_eq!(bbox_iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(-10.0) < 0.001);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
    }
}
