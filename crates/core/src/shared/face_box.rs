/// Default padding added on each side, as a fraction of box width/height.
pub const DEFAULT_FACE_PADDING: f64 = 0.2;

/// Axis-aligned face rectangle in frame pixel coordinates.
///
/// Raw detections may extend past the frame; [`FaceBox::padded`] produces
/// the clipped box the crop is taken from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub score: f64,
}

impl FaceBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, score: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    /// Builds a box from float detector output, truncating toward zero.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Self {
        Self::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32, score)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        self.width().max(0) as i64 * self.height().max(0) as i64
    }

    pub fn is_degenerate(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Grows the box by `padding × size` on every side (pad truncated to
    /// whole pixels), then clips it to `frame_width × frame_height`.
    ///
    /// Returns `None` when the clipped box has no area.
    pub fn padded(&self, padding: f64, frame_width: u32, frame_height: u32) -> Option<FaceBox> {
        let pad_x = (self.width() as f64 * padding) as i32;
        let pad_y = (self.height() as f64 * padding) as i32;
        let clipped = FaceBox {
            x1: (self.x1 - pad_x).max(0),
            y1: (self.y1 - pad_y).max(0),
            x2: (self.x2 + pad_x).min(frame_width as i32),
            y2: (self.y2 + pad_y).min(frame_height as i32),
            score: self.score,
        };
        if clipped.is_degenerate() {
            None
        } else {
            Some(clipped)
        }
    }
}
