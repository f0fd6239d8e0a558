//! Sequential video frame source
//!
//! Wraps an `FFmpeg` demuxer + software decoder (codec default threading) and
//! yields RGB frames one at a time, in decode order. No random access: callers
//! that only want a subset of frames read through the stream and drop the rest.
//!
//! All decoder state is owned by [`VideoFrameSource`] and released when it is
//! dropped, so early returns and `?` on the caller's side cannot leak it.

use astroguard_common::{Frame, ProcessingError, Result, VideoMetadata};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Pull-based source of decoded frames
pub trait FrameSource {
    /// Container properties, read once at open
    fn metadata(&self) -> &VideoMetadata;

    /// Read the next frame; `Ok(None)` marks end of stream
    ///
    /// Frame indices start at 0 and increase by one per returned frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the container can no longer be read or a decoded
    /// frame cannot be converted to RGB.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Initialize `FFmpeg` library
fn init_ffmpeg() -> Result<()> {
    static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    INIT.get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to initialize FFmpeg: {e}")))
}

/// Convert an `FFmpeg` rational to fps, `None` for 0/x or x/0
fn rational_to_fps(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(f64::from(rate.numerator()) / f64::from(rate.denominator()))
}

/// Same-size converter from the stream's pixel format to RGB24
///
/// Fails with [`ProcessingError::InvalidMedia`] when swscale cannot read `format`.
fn rgb_scaler(
    format: ffmpeg::format::Pixel,
    width: u32,
    height: u32,
) -> Result<ffmpeg::software::scaling::Context> {
    ffmpeg::software::scaling::Context::get(
        format,
        width,
        height,
        ffmpeg::format::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| ProcessingError::InvalidMedia(format!("Unsupported pixel format {format:?}: {e}")))
}

/// `FFmpeg`-backed [`FrameSource`] producing RGB24 frames
pub struct VideoFrameSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    metadata: VideoMetadata,
    next_index: u64,
    eof_sent: bool,
    decoded: ffmpeg::util::frame::video::Video,
    converted: ffmpeg::util::frame::video::Video,
}

impl VideoFrameSource {
    /// Open a video container and prepare its best video stream for decoding
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidMedia`] if the file cannot be opened
    /// as a container, has no video stream, or the stream has no decodable
    /// dimensions.
    pub fn open(path: &Path) -> Result<Self> {
        init_ffmpeg()?;

        let input = ffmpeg::format::input(&path)
            .map_err(|e| ProcessingError::InvalidMedia(format!("Failed to open input file: {e}")))?;

        let (stream_index, frame_count, fps, codec_params) = {
            let video_stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| ProcessingError::InvalidMedia("No video stream found".to_string()))?;

            let fps = rational_to_fps(video_stream.avg_frame_rate())
                .or_else(|| rational_to_fps(video_stream.rate()))
                .unwrap_or(0.0);
            let frame_count = u64::try_from(video_stream.frames()).unwrap_or(0);

            (
                video_stream.index(),
                frame_count,
                fps,
                video_stream.parameters(),
            )
        };

        let decoder = ffmpeg::codec::context::Context::from_parameters(codec_params)
            .map_err(|e| ProcessingError::InvalidMedia(format!("Failed to create context: {e}")))?
            .decoder()
            .video()
            .map_err(|e| ProcessingError::InvalidMedia(format!("Failed to create decoder: {e}")))?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(ProcessingError::InvalidMedia(format!(
                "Video stream has invalid dimensions {width}x{height}"
            )));
        }

        let scaler = rgb_scaler(decoder.format(), width, height)?;

        let metadata = VideoMetadata::new(frame_count, fps, width, height);
        info!(
            "Opened video {}: {} frames @ {:.2} fps ({}x{})",
            path.display(),
            metadata.frame_count,
            metadata.fps,
            metadata.width,
            metadata.height
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            metadata,
            next_index: 0,
            eof_sent: false,
            decoded: ffmpeg::util::frame::video::Video::empty(),
            converted: ffmpeg::util::frame::video::Video::empty(),
        })
    }

    /// Convert the frame currently held in `self.decoded` and assign it the next index
    fn take_decoded(&mut self) -> Result<Frame> {
        self.scaler
            .run(&self.decoded, &mut self.converted)
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to convert frame: {e}")))?;

        let width = self.converted.width();
        let height = self.converted.height();
        let data = copy_rgb24(&self.converted);
        let image = RgbImage::from_raw(width, height, data).ok_or_else(|| {
            ProcessingError::FFmpegError(format!(
                "Decoded frame buffer does not match {width}x{height}"
            ))
        })?;

        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(frame)
    }
}

impl FrameSource for VideoFrameSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                return self.take_decoded().map(Some);
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    // Corrupt packets are dropped, the decoder resyncs on the next keyframe
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        debug!("Skipping undecodable packet: {}", e);
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof().ok();
                    self.eof_sent = true;
                }
                Err(e) => {
                    return Err(ProcessingError::FFmpegError(format!(
                        "Failed to read packet: {e}"
                    )));
                }
            }
        }
    }
}

/// Copy an RGB24 frame into a contiguous buffer, dropping row padding
fn copy_rgb24(frame: &ffmpeg::util::frame::video::Video) -> Vec<u8> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let plane_data = frame.data(0);

    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row_end = row_start + (width * 3);
        data.extend_from_slice(&plane_data[row_start..row_end]);
    }
    data
}
