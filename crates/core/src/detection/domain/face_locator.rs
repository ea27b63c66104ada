use serde::{Deserialize, Serialize};

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::face_box::{FaceBox, DEFAULT_FACE_PADDING};
use crate::shared::frame::Frame;

/// Which detection to keep when a frame holds several faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    /// The detector's first box, whatever its size or score.
    #[default]
    First,
    Largest,
    MostConfident,
}

impl FaceSelection {
    pub fn select(&self, boxes: &[FaceBox]) -> Option<FaceBox> {
        match self {
            FaceSelection::First => boxes.first().copied(),
            FaceSelection::Largest => boxes
                .iter()
                .copied()
                .reduce(|best, b| if b.area() > best.area() { b } else { best }),
            FaceSelection::MostConfident => boxes
                .iter()
                .copied()
                .reduce(|best, b| if b.score > best.score { b } else { best }),
        }
    }
}

/// The padded face region cut out of a frame.
#[derive(Clone, Debug)]
pub struct FaceCrop {
    pub face_box: FaceBox,
    pub image: Frame,
}

/// Picks the primary face in a frame and crops it with padding.
#[derive(Clone, Debug)]
pub struct FaceLocator {
    padding: f64,
    selection: FaceSelection,
}

impl FaceLocator {
    pub fn new(padding: f64, selection: FaceSelection) -> Self {
        Self { padding, selection }
    }

    /// Returns `Ok(None)` for a detection miss: no face, or a box that has no
    /// area once padded and clipped.
    pub fn locate(
        &self,
        detector: &mut dyn FaceDetector,
        frame: &Frame,
    ) -> Result<Option<FaceCrop>, Box<dyn std::error::Error>> {
        let boxes = detector.detect(frame)?;
        if boxes.len() > 1 {
            log::debug!(
                "Frame {}: {} faces detected, keeping one ({:?})",
                frame.index(),
                boxes.len(),
                self.selection
            );
        }
        let Some(chosen) = self.selection.select(&boxes) else {
            return Ok(None);
        };
        let Some(padded) = chosen.padded(self.padding, frame.width(), frame.height()) else {
            return Ok(None);
        };

        let image = frame.crop(
            padded.x1 as u32,
            padded.y1 as u32,
            padded.x2 as u32,
            padded.y2 as u32,
        );
        Ok(Some(FaceCrop {
            face_box: padded,
            image,
        }))
    }
}

impl Default for FaceLocator {
    fn default() -> Self {
        Self::new(DEFAULT_FACE_PADDING, FaceSelection::default())
    }
}
