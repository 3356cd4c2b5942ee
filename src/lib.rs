//! # geoframes
//!
//! Turn a 360° camera recording and its GPS track into a set of evenly
//! spaced, yaw-corrected, geotagged still frames, ready for street-level
//! imagery platforms.
//!
//! `geoframes` decodes the video with FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate, matches every
//! frame to a position on the GPS track by capture time, and keeps only the
//! frames that add new ground coverage. Kept frames are rotated around the
//! vertical axis with FFmpeg's `v360` filter, written as JPEG, and tagged
//! with time and position through `exiftool`.
//!
//! ## Quick Start
//!
//! ### Select and write frames
//!
//! ```no_run
//! use chrono::DateTime;
//! use geoframes::{
//!     DecimationPolicy, FramePipeline, JpegWriter, PipelineOptions, VideoSource,
//!     YawReprojection, load_gpx,
//! };
//!
//! let track = load_gpx("ride/ride.gpx")?;
//! let start = DateTime::parse_from_rfc3339("2024-05-01T09:59:59Z").unwrap();
//! let options = PipelineOptions::new("ride")
//!     .with_yaw(90.0)
//!     .with_decimation(DecimationPolicy::Fixed(5.0));
//!
//! let mut source = VideoSource::open("ride.mp4")?;
//! let mut pipeline = FramePipeline::new(&track, start, &options, YawReprojection)?;
//! let records = pipeline.run(source.frames()?, &mut JpegWriter::default())?;
//! # Ok::<(), geoframes::GeoframesError>(())
//! ```
//!
//! ### Tag the written frames
//!
//! ```no_run
//! # use geoframes::SelectionRecord;
//! # let records: Vec<SelectionRecord> = Vec::new();
//! use geoframes::{CameraProfile, apply_metadata};
//!
//! apply_metadata(&records, "ride", &CameraProfile::default())?;
//! # Ok::<(), geoframes::GeoframesError>(())
//! ```
//!
//! ## Features
//!
//! - **Track resolution**: snap-forward position lookup across GPX segments
//! - **Speed estimation**: ground speed from the track over a one-second window
//! - **Decimation**: fixed or speed-adaptive minimum spacing between kept frames
//! - **Yaw reprojection**: equirectangular rotation via FFmpeg's `v360` filter
//! - **Telemetry extraction**: embedded GPS to GPX and start time via `exiftool`
//! - **Tagging**: per-image EXIF/XMP table applied with `exiftool`
//! - **Progress & cancellation**: cooperative callbacks and
//!   `CancellationToken` for long runs
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build, and `exiftool`
//! must be on `PATH` for telemetry extraction and tagging.

pub mod configuration;
mod conversion;
pub mod decimation;
pub mod error;
pub mod exiftool;
pub mod ffmpeg;
pub mod frame;
pub mod gpx;
pub mod metadata;
pub mod persistence;
pub mod pipeline;
pub mod progress;
pub mod reprojection;
pub mod source;
pub mod speed;
pub mod track;

pub use configuration::{DEFAULT_JPEG_QUALITY, FrameNaming, PipelineOptions};
pub use decimation::{AdaptiveDistance, DecimationPolicy, DecimationState};
pub use error::GeoframesError;
pub use exiftool::{
    extract_gpx, gps_start_time, reconcile_start_time, resolve_start_time, shift_start_time,
};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::{DecodedFrame, FrameGeometry};
pub use gpx::{load_gpx, parse_gpx_str};
pub use metadata::{CameraProfile, TaggingRow, TaggingTable, apply_metadata};
pub use persistence::{ImageSink, JpegWriter};
pub use pipeline::{FrameDecision, FramePipeline, PipelineState, SelectionRecord};
pub use progress::{CancellationToken, FrameCounts, ProgressCallback, ProgressInfo};
pub use reprojection::{
    ReprojectionContext, Reprojector, ReprojectorFactory, YawFilterGraph, YawReprojection,
};
pub use source::{DecodedFrames, SourceFrame, VideoInfo, VideoSource};
pub use speed::{MPS_TO_MPH, estimate_speed, estimate_speed_from, speed_between};
pub use track::{Segment, Track, Waypoint};
