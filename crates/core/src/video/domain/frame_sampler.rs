use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::shared::constants::{DEFAULT_SOURCE_FPS, SCRATCH_PREFIX};
use crate::shared::error::PalsyError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

/// Number of source frames between two samples: `max(1, round(source / target))`.
pub fn compute_stride(source_fps: f64, target_fps: f64) -> usize {
    if !(target_fps.is_finite() && target_fps > 0.0) {
        return 1;
    }
    let ratio = (source_fps / target_fps).round();
    if ratio.is_finite() && ratio >= 1.0 {
        ratio as usize
    } else {
        1
    }
}

/// Turns a video file into an evenly spaced frame sequence at a target rate.
///
/// Sampled frames are also written to a private scratch directory that lives
/// exactly as long as the returned [`SampledFrames`].
pub struct FrameSampler {
    reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
    target_fps: f64,
    fallback_fps: f64,
    scratch_root: Option<PathBuf>,
}

impl FrameSampler {
    pub fn new(
        reader: Box<dyn VideoReader>,
        image_writer: Box<dyn ImageWriter>,
        target_fps: f64,
    ) -> Self {
        Self {
            reader,
            image_writer,
            target_fps,
            fallback_fps: DEFAULT_SOURCE_FPS,
            scratch_root: None,
        }
    }

    pub fn with_fallback_fps(mut self, fps: f64) -> Self {
        self.fallback_fps = fps;
        self
    }

    /// Creates scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Opens `path` and returns the lazy sample sequence.
    pub fn open(&mut self, path: &Path) -> Result<SampledFrames<'_>, PalsyError> {
        let metadata = self.reader.open(path).map_err(|e| PalsyError::VideoOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let source_fps = metadata.effective_fps(self.fallback_fps);
        let stride = compute_stride(source_fps, self.target_fps);
        let scratch = create_scratch_dir(self.scratch_root.as_deref())?;
        log::debug!(
            "Sampling {} at {source_fps:.2} fps with stride {stride} (scratch {})",
            path.display(),
            scratch.path().display()
        );

        Ok(SampledFrames {
            frames: self.reader.frames(),
            image_writer: self.image_writer.as_ref(),
            scratch,
            metadata,
            path: path.to_path_buf(),
            stride,
            source_index: 0,
            emitted: 0,
            done: false,
        })
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.reader.close();
    }
}

fn create_scratch_dir(root: Option<&Path>) -> Result<TempDir, PalsyError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX);
    let dir = match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    dir.map_err(|e| PalsyError::Scratch(format!("cannot create scratch directory: {e}")))
}

/// Forward-only sequence of sampled frames, re-indexed from 0.
///
/// Unselected frames are still decoded, then dropped. The scratch directory
/// is removed when this value is dropped, whether iteration finished or not.
pub struct SampledFrames<'a> {
    frames: Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + 'a>,
    image_writer: &'a dyn ImageWriter,
    scratch: TempDir,
    metadata: VideoMetadata,
    path: PathBuf,
    stride: usize,
    source_index: usize,
    emitted: usize,
    done: bool,
}

impl SampledFrames<'_> {
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Expected number of samples, from the container's frame count.
    pub fn expected_len(&self) -> usize {
        self.metadata.total_frames.div_ceil(self.stride)
    }

    fn decode_error(&self, reason: impl ToString) -> PalsyError {
        PalsyError::VideoDecode {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Iterator for SampledFrames<'_> {
    type Item = Result<Frame, PalsyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let decoded = match self.frames.next() {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(self.decode_error(e)));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            let selected = self.source_index % self.stride == 0;
            self.source_index += 1;
            if !selected {
                continue;
            }

            let frame = decoded.with_index(self.emitted);
            let file = self
                .scratch
                .path()
                .join(format!("f_{:04}.jpg", self.emitted));
            if let Err(e) = self.image_writer.write(&file, &frame) {
                self.done = true;
                return Some(Err(PalsyError::Scratch(format!(
                    "cannot write {}: {e}",
                    file.display()
                ))));
            }
            self.emitted += 1;
            return Some(Ok(frame));
        }
    }
}
