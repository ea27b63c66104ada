use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Decodes a video container into RGB frames.
///
/// Every frame of the stream is decoded, in order; stride selection happens
/// downstream in [`FrameSampler`](super::frame_sampler::FrameSampler).
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Lazy iterator over decoded frames, indexed by source position.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases decoder resources. Safe to call more than once.
    fn close(&mut self);
}
