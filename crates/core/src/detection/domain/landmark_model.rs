use crate::detection::domain::landmark_set::{LandmarkSet, LANDMARK_COUNT};
use crate::shared::constants::DEFAULT_MIN_LANDMARK_CONFIDENCE;
use crate::shared::frame::Frame;

/// Raw output of a dense landmark model for a single face.
#[derive(Clone, Debug, PartialEq)]
pub struct RawLandmarks {
    /// Crop-normalized `(x, y)` in `[0, 1]`, in model order.
    pub points: Vec<(f32, f32)>,
    /// Face-presence probability.
    pub confidence: f32,
}

/// Domain interface for dense face-mesh inference on one face crop.
pub trait LandmarkModel: Send {
    /// `Ok(None)` when the model finds no face at all.
    fn infer(&mut self, crop: &Frame) -> Result<Option<RawLandmarks>, Box<dyn std::error::Error>>;
}

/// Turns model output into a pixel [`LandmarkSet`], rejecting low-confidence faces.
#[derive(Clone, Debug)]
pub struct LandmarkExtractor {
    min_confidence: f32,
}

impl LandmarkExtractor {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// `Ok(None)` is a detection miss.
    pub fn extract(
        &self,
        model: &mut dyn LandmarkModel,
        crop: &Frame,
    ) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>> {
        let Some(raw) = model.infer(crop)? else {
            return Ok(None);
        };
        if raw.confidence < self.min_confidence {
            log::trace!(
                "Frame {}: landmark confidence {:.3} below {:.3}",
                crop.index(),
                raw.confidence,
                self.min_confidence
            );
            return Ok(None);
        }
        let set = LandmarkSet::from_normalized(&raw.points, crop.width(), crop.height())
            .ok_or_else(|| {
                format!(
                    "landmark model returned {} points, expected at least {LANDMARK_COUNT}",
                    raw.points.len()
                )
            })?;
        Ok(Some(set))
    }
}

impl Default for LandmarkExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LANDMARK_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::landmark_set::{Landmark, Point};

    struct StubModel(Option<RawLandmarks>);

    impl LandmarkModel for StubModel {
        fn infer(&mut self, _crop: &Frame) -> Result<Option<RawLandmarks>, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    fn crop() -> Frame {
        Frame::new(vec![0u8; 200 * 100 * 3], 200, 100, 0)
    }

    fn raw(confidence: f32, count: usize) -> RawLandmarks {
        RawLandmarks {
            points: vec![(0.25, 0.75); count],
            confidence,
        }
    }

    #[test]
    fn test_extract_scales_to_crop_pixels() {
        let mut model = StubModel(Some(raw(0.9, LANDMARK_COUNT)));
        let set = LandmarkExtractor::default()
            .extract(&mut model, &crop())
            .unwrap()
            .unwrap();
        assert_eq!(set.point(Landmark::Chin), Point::new(50, 75));
    }

    #[test]
    fn test_no_face_is_a_miss() {
        let mut model = StubModel(None);
        assert!(LandmarkExtractor::default()
            .extract(&mut model, &crop())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_low_confidence_is_a_miss() {
        let mut model = StubModel(Some(raw(0.29, LANDMARK_COUNT)));
        assert!(LandmarkExtractor::default()
            .extract(&mut model, &crop())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut model = StubModel(Some(raw(0.3, LANDMARK_COUNT)));
        assert!(LandmarkExtractor::new(0.3)
            .extract(&mut model, &crop())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_short_output_is_an_error() {
        let mut model = StubModel(Some(raw(0.9, 68)));
        assert!(LandmarkExtractor::default()
            .extract(&mut model, &crop())
            .is_err());
    }
}
