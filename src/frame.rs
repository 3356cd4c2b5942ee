//! Decoded frame abstraction.
//!
//! The frame pipeline does not care where frames come from. Anything that can
//! report its [`FrameGeometry`] and presentation offset implements
//! [`DecodedFrame`] and can be driven through
//! [`FramePipeline`](crate::FramePipeline). [`SourceFrame`](crate::SourceFrame)
//! is the FFmpeg-backed implementation.

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::{Rational, format::Pixel};

/// Dimensions and layout of a decoded frame.
///
/// Geometry is fixed for the lifetime of a run: the first decoded frame
/// determines it and every later frame must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Decoder output pixel format.
    pub pixel_format: Pixel,
    /// Time base the frame's timestamps are expressed in.
    pub time_base: Rational,
}

impl Display for FrameGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}x{} {:?} @ {}/{}",
            self.width,
            self.height,
            self.pixel_format,
            self.time_base.numerator(),
            self.time_base.denominator(),
        )
    }
}

/// A raw frame produced by a frame source.
pub trait DecodedFrame {
    /// Geometry of this frame.
    fn geometry(&self) -> FrameGeometry;

    /// Presentation time in seconds, relative to the start of the stream.
    fn presentation_offset(&self) -> f64;
}
