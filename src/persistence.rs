//! Writing reprojected frames to disk.
//!
//! [`ImageSink`] is the seam between the pipeline and whatever encodes and
//! stores kept frames. [`JpegWriter`] is the FFmpeg-backed implementation:
//! it converts each frame to packed RGB24 and encodes it as JPEG.

use std::{fs::File, io::BufWriter, path::Path};

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{RgbImage, codecs::jpeg::JpegEncoder};

use crate::configuration::DEFAULT_JPEG_QUALITY;
use crate::error::GeoframesError;

/// Encodes and stores one frame at a target path.
pub trait ImageSink<F> {
    /// Write `frame` to `path`.
    ///
    /// The pipeline commits a kept frame only after this returns `Ok`.
    fn persist(&mut self, frame: &F, path: &Path) -> Result<(), GeoframesError>;
}

/// JPEG writer for FFmpeg frames.
///
/// The RGB conversion context is created from the first frame and reused.
pub struct JpegWriter {
    quality: u8,
    scaler: Option<ScalingContext>,
}

impl Default for JpegWriter {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegWriter {
    /// Create a writer encoding at `quality` (1–100).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            scaler: None,
        }
    }

    fn to_rgb(&mut self, frame: &VideoFrame) -> Result<RgbImage, GeoframesError> {
        let width = frame.width();
        let height = frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(ScalingContext::get(
                frame.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?);
        }
        let Some(scaler) = self.scaler.as_mut() else {
            return Err(GeoframesError::FfmpegError(
                "RGB conversion context unavailable".to_string(),
            ));
        };

        let mut rgb_frame = VideoFrame::empty();
        scaler.run(frame, &mut rgb_frame)?;

        let buffer = crate::conversion::frame_to_buffer(&rgb_frame, width, height, 3);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            GeoframesError::VideoDecodeError(
                "Failed to construct RGB image from reprojected frame data".to_string(),
            )
        })
    }
}

impl ImageSink<VideoFrame> for JpegWriter {
    fn persist(&mut self, frame: &VideoFrame, path: &Path) -> Result<(), GeoframesError> {
        let image = self.to_rgb(frame)?;
        let mut writer = BufWriter::new(File::create(path)?);
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(&image)?;
        Ok(())
    }
}
