//! FFmpeg-backed frame source.
//!
//! [`VideoSource`] opens a video file, selects its best video stream, and
//! decodes it front to back through [`DecodedFrames`], a lazy,
//! forward-only iterator. The decoder may spread work across threads, but
//! frames are still handed out one at a time in output order.
//!
//! # Example
//!
//! ```no_run
//! use geoframes::{DecodedFrame, GeoframesError, VideoSource};
//!
//! let mut source = VideoSource::open("ride.mp4")?;
//! println!("{}x{}", source.info().width, source.info().height);
//!
//! for frame in source.frames()? {
//!     let frame = frame?;
//!     println!("frame at {:.3}s", frame.presentation_offset());
//! }
//! # Ok::<(), GeoframesError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::{context::Context as CodecContext, threading},
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    util::error::EAGAIN,
};

use crate::conversion::pts_to_seconds;
use crate::error::GeoframesError;
use crate::frame::{DecodedFrame, FrameGeometry};

/// Basic properties of the selected video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Container duration.
    pub duration: Duration,
    /// Estimated total number of frames, from duration and frame rate.
    pub frame_count: u64,
}

/// An opened video file ready for sequential decoding.
pub struct VideoSource {
    input_context: Input,
    video_stream_index: usize,
    time_base: Rational,
    start_pts: i64,
    info: VideoInfo,
    file_path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("video_stream_index", &self.video_stream_index)
            .field("info", &self.info)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, and locates the best
    /// video stream.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::FileOpen`] if the file cannot be opened and
    /// [`GeoframesError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GeoframesError> {
        let file_path = path.as_ref().to_path_buf();

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| GeoframesError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| GeoframesError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(GeoframesError::NoVideoStream)?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();
        let start_pts = match stream.start_time() {
            ffmpeg_sys_next::AV_NOPTS_VALUE => 0,
            pts => pts,
        };

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| GeoframesError::FileOpen {
                path: file_path.clone(),
                reason: format!("Failed to create video decoder: {error}"),
            })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            0.0
        };

        let info = VideoInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            duration,
            frame_count: (duration.as_secs_f64() * frames_per_second) as u64,
        };

        Ok(Self {
            input_context,
            video_stream_index,
            time_base,
            start_pts,
            info,
            file_path,
        })
    }

    /// Properties of the selected video stream.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Decode the stream from the start.
    ///
    /// The returned iterator borrows the source mutably and is not
    /// restartable; open the file again for a second pass.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::VideoDecodeError`] if the decoder cannot be
    /// opened.
    pub fn frames(&mut self) -> Result<DecodedFrames<'_>, GeoframesError> {
        DecodedFrames::new(self)
    }
}

/// A decoded frame together with the timing needed to place it in time.
pub struct SourceFrame {
    frame: VideoFrame,
    time_base: Rational,
    start_pts: i64,
}

impl SourceFrame {
    /// The underlying FFmpeg frame.
    pub fn raw(&self) -> &VideoFrame {
        &self.frame
    }
}

impl DecodedFrame for SourceFrame {
    fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.frame.width(),
            height: self.frame.height(),
            pixel_format: self.frame.format(),
            time_base: self.time_base,
        }
    }

    fn presentation_offset(&self) -> f64 {
        let pts = self.frame.timestamp().or(self.frame.pts()).unwrap_or(self.start_pts);
        pts_to_seconds(pts.saturating_sub(self.start_pts), self.time_base)
    }
}

/// Lazy iterator over every decoded frame of a [`VideoSource`].
///
/// Any read or decode failure is yielded once as an error, after which the
/// iterator is exhausted.
pub struct DecodedFrames<'a> {
    source: &'a mut VideoSource,
    decoder: VideoDecoder,
    eof_sent: bool,
    done: bool,
}

impl<'a> DecodedFrames<'a> {
    fn new(source: &'a mut VideoSource) -> Result<Self, GeoframesError> {
        let stream = source
            .input_context
            .stream(source.video_stream_index)
            .ok_or(GeoframesError::NoVideoStream)?;

        let mut decoder_context = CodecContext::from_parameters(stream.parameters())?;
        // count 0 lets FFmpeg pick one thread per core.
        decoder_context.set_threading(threading::Config::kind(threading::Type::Frame));
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|e| GeoframesError::VideoDecodeError(format!("Failed to open decoder: {e}")))?;

        Ok(Self {
            source,
            decoder,
            eof_sent: false,
            done: false,
        })
    }

    fn wrap(&self, frame: VideoFrame) -> SourceFrame {
        SourceFrame {
            frame,
            time_base: self.source.time_base,
            start_pts: self.source.start_pts,
        }
    }

    fn fail(&mut self, error: GeoframesError) -> Option<Result<SourceFrame, GeoframesError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = Result<SourceFrame, GeoframesError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let mut decoded = VideoFrame::empty();
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return Some(Ok(self.wrap(decoded))),
                // Needs another packet.
                Err(FfmpegError::Other { errno: EAGAIN }) if !self.eof_sent => {}
                Err(FfmpegError::Eof | FfmpegError::Other { errno: EAGAIN }) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    return self.fail(GeoframesError::VideoDecodeError(format!(
                        "Failed to receive frame: {e}"
                    )));
                }
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.source.input_context) {
                Ok(()) => {
                    if packet.stream() == self.source.video_stream_index {
                        if let Err(e) = self.decoder.send_packet(&packet) {
                            return self.fail(GeoframesError::VideoDecodeError(e.to_string()));
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(e) = self.decoder.send_eof() {
                        return self.fail(GeoframesError::VideoDecodeError(e.to_string()));
                    }
                    self.eof_sent = true;
                }
                Err(e) => {
                    return self.fail(GeoframesError::VideoDecodeError(format!(
                        "Failed to read packet: {e}"
                    )));
                }
            }
        }
    }
}
