use ndarray::{s, ArrayView3};

/// Channels per pixel; frames are always packed RGB.
pub const RGB_CHANNELS: usize = 3;

/// One sampled still image: tightly packed RGB bytes in row-major order.
///
/// `index` is the position in the sampled sequence, not the source frame
/// number, so it stays 0-based and contiguous whatever the stride.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * RGB_CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, RGB_CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the half-open pixel rectangle `[x1, x2) × [y1, y2)` into a new
    /// frame with the same index.
    ///
    /// Callers clip the rectangle to the frame first; out-of-range bounds panic.
    pub fn crop(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> Frame {
        let view = self.as_ndarray();
        let region = view.slice(s![y1 as usize..y2 as usize, x1 as usize..x2 as usize, ..]);
        let data: Vec<u8> = region.iter().copied().collect();
        Frame::new(data, x2 - x1, y2 - y1, self.index)
    }
}
