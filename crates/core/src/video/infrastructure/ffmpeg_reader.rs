use std::path::Path;

use crate::shared::frame::{Frame, RGB_CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

type Video = ffmpeg_next::util::frame::video::Video;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Each decoded picture is converted to packed RGB24.
pub struct FfmpegReader {
    opened: Option<OpenedStream>,
}

struct OpenedStream {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { opened: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let input_ctx = ffmpeg_next::format::input(path)?;
        let stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps: stream_fps(&stream),
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };
        drop(stream);

        self.opened = Some(OpenedStream {
            input_ctx,
            decoder,
            stream_index,
        });
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(opened) = self.opened.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        let width = opened.decoder.width();
        let height = opened.decoder.height();
        let scaler = match ffmpeg_next::software::scaling::Context::get(
            opened.decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        ) {
            Ok(scaler) => scaler,
            Err(e) => return Box::new(std::iter::once(Err(e.into()))),
        };

        Box::new(FfmpegFrameIter {
            opened,
            scaler,
            width,
            height,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn close(&mut self) {
        self.opened = None;
    }
}

/// Stream rate from the container, 0.0 when unreported.
fn stream_fps(stream: &ffmpeg_next::format::stream::Stream) -> f64 {
    let rate = stream.avg_frame_rate();
    let rate = if rate.numerator() > 0 && rate.denominator() > 0 {
        rate
    } else {
        stream.rate()
    };
    if rate.denominator() != 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    }
}

/// Decodes one frame per `next` call; nothing is buffered beyond the
/// decoder's own packet queue.
struct FfmpegFrameIter<'a> {
    opened: &'a mut OpenedStream,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = Video::empty();
        match self.opened.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(e) if is_recoverable(&e) => return None,
            Err(e) => return Some(Err(decode_failure(self.frame_index, e))),
        }
        let mut rgb_frame = Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }

    /// Drains frames still buffered in the decoder after the last packet.
    fn flush(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let _ = self.opened.decoder.send_eof();
        self.flushing = true;
        let result = self.try_receive();
        self.done = result.as_ref().map_or(true, Result::is_err);
        result
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            self.done = result.is_err();
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.opened.input_ctx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => return self.flush(),
                Err(e) if is_recoverable(&e) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(decode_failure(self.frame_index, e)));
                }
            }

            if packet.stream() != self.opened.stream_index {
                continue;
            }
            match self.opened.decoder.send_packet(&packet) {
                Ok(()) => {}
                Err(e) if is_recoverable(&e) => log::trace!("Decoder busy: {e}"),
                Err(e) => {
                    self.done = true;
                    return Some(Err(decode_failure(self.frame_index, e)));
                }
            }
            if let Some(result) = self.try_receive() {
                self.done = result.is_err();
                return Some(result);
            }
        }
    }
}

/// "Try again" and end-of-stream are decoder states, not failures.
fn is_recoverable(err: &ffmpeg_next::Error) -> bool {
    matches!(
        err,
        ffmpeg_next::Error::Eof
            | ffmpeg_next::Error::Other {
                errno: ffmpeg_next::util::error::EAGAIN
            }
    )
}

fn decode_failure(frame_index: usize, err: ffmpeg_next::Error) -> Box<dyn std::error::Error> {
    format!("decoding failed after frame {frame_index}: {err}").into()
}

/// Copies an RGB24 picture into a tightly packed buffer, dropping the
/// per-row padding ffmpeg may add (stride > width * 3).
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * RGB_CHANNELS;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
