//! Error types for the `geoframes` crate.
//!
//! This module defines [`GeoframesError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context (paths,
//! frame geometry, tool names) to diagnose a failed run without additional
//! logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use csv::Error as CsvError;
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use quick_xml::Error as XmlError;
use thiserror::Error;

use crate::frame::FrameGeometry;

/// The unified error type for all `geoframes` operations.
///
/// Every public method that can fail returns `Result<T, GeoframesError>`.
/// [`exit_code`](GeoframesError::exit_code) maps each variant onto the
/// process exit status used by the `geoframes` binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeoframesError {
    /// Pipeline options were rejected before any decoding started.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The GPS track could not be produced from the source recording.
    #[error("GPS track unavailable at {path}: {reason}")]
    TrackUnavailable {
        /// Path of the GPX file that was expected.
        path: PathBuf,
        /// Underlying reason the track is missing.
        reason: String,
    },

    /// The GPS track exists but could not be parsed.
    #[error("Failed to parse GPS track: {0}")]
    TrackParse(String),

    /// The absolute start time of the recording could not be determined.
    #[error("Failed to resolve recording start time: {0}")]
    StartTimeUnresolved(String),

    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The frame source reported a decode failure.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// A decoded frame does not match the geometry the run was set up with.
    #[error("Frame geometry changed mid-stream: expected {expected}, found {found}")]
    GeometryMismatch {
        /// Geometry of the first decoded frame.
        expected: FrameGeometry,
        /// Geometry of the offending frame.
        found: FrameGeometry,
    },

    /// FFmpeg filter graph setup or processing failed.
    #[error("Filter graph error: {0}")]
    FilterGraphError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The per-image tagging table could not be written or applied.
    #[error("Failed to write image metadata: {0}")]
    MetadataWrite(String),

    /// An external tool could not be run.
    #[error("Failed to run {tool}: {reason}")]
    ExternalTool {
        /// Name of the executable.
        tool: String,
        /// Underlying reason.
        reason: String,
    },

    /// The run was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl GeoframesError {
    /// Process exit status for this error.
    ///
    /// `2` for an unavailable or unparseable GPS track, `3` for an unresolved
    /// start time, `4` for a metadata write failure, `5` for decode failures
    /// (including geometry changes), and `1` for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            GeoframesError::TrackUnavailable { .. } | GeoframesError::TrackParse(_) => 2,
            GeoframesError::StartTimeUnresolved(_) => 3,
            GeoframesError::MetadataWrite(_) => 4,
            GeoframesError::FileOpen { .. }
            | GeoframesError::NoVideoStream
            | GeoframesError::VideoDecodeError(_)
            | GeoframesError::GeometryMismatch { .. } => 5,
            _ => 1,
        }
    }
}

impl From<FfmpegError> for GeoframesError {
    fn from(error: FfmpegError) -> Self {
        GeoframesError::FfmpegError(error.to_string())
    }
}

impl From<CsvError> for GeoframesError {
    fn from(error: CsvError) -> Self {
        GeoframesError::MetadataWrite(error.to_string())
    }
}

impl From<XmlError> for GeoframesError {
    fn from(error: XmlError) -> Self {
        GeoframesError::TrackParse(error.to_string())
    }
}
