//! Internal conversion helpers.
//!
//! Pixel-data copying and timestamp conversion shared by the source,
//! persistence, and pipeline modules.

use chrono::TimeDelta;
use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is the number of bytes per pixel for the packed format
/// (e.g. 3 for RGB24).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert fractional seconds to a [`TimeDelta`] with microsecond precision.
///
/// `None` for non-finite input or a span too large to represent.
pub(crate) fn seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    let microseconds = (seconds * 1_000_000.0).round();
    if !microseconds.is_finite() || microseconds.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::microseconds(microseconds as i64))
}
