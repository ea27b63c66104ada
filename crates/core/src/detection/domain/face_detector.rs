use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Domain interface for full-frame face detection.
///
/// Boxes come back in the detector's own order; choosing one is the
/// [`FaceLocator`](super::face_locator::FaceLocator)'s job. Inference
/// sessions need exclusive access, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}
