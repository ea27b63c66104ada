use std::path::PathBuf;

/// Stream properties reported by a [`VideoReader`](crate::video::domain::video_reader::VideoReader).
///
/// `fps` is 0.0 when the container does not report a usable rate.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Source rate, or `fallback` when the stream reports none.
    pub fn effective_fps(&self, fallback: f64) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            fallback
        }
    }
}
