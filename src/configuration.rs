//! Pipeline configuration.
//!
//! [`PipelineOptions`] is a builder that threads the decimation policy, yaw
//! correction, output naming, progress callbacks, and cancellation tokens
//! through a [`FramePipeline`](crate::FramePipeline) run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geoframes::{
//!     AdaptiveDistance, CancellationToken, DecimationPolicy, PipelineOptions,
//!     ProgressCallback, ProgressInfo,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} frames, {} kept", info.frames, info.kept);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = PipelineOptions::new("out/ride")
//!     .with_yaw(90.0)
//!     .with_decimation(DecimationPolicy::Adaptive(AdaptiveDistance {
//!         min_distance: 2.0,
//!         min_speed: 5.0,
//!         max_distance: 20.0,
//!         max_speed: 60.0,
//!     }))
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(30);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::decimation::DecimationPolicy;
use crate::error::GeoframesError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Default JPEG quality for written frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Where kept frames are written and how they are named.
///
/// The n-th kept frame (zero-based) is written to
/// `<directory>/<prefix>_<n:06>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNaming {
    /// Output directory.
    pub directory: PathBuf,
    /// File name prefix.
    pub prefix: String,
    /// File extension, without the dot.
    pub extension: String,
}

impl FrameNaming {
    /// Name frames after the output directory, e.g. `ride/ride_000000.jpg`.
    pub fn for_directory<P: AsRef<Path>>(directory: P) -> Self {
        let directory = directory.as_ref().to_path_buf();
        let prefix = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "frame".to_string());
        Self {
            directory,
            prefix,
            extension: "jpg".to_string(),
        }
    }

    /// Path of the kept frame with the given zero-based index.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.directory
            .join(format!("{}_{index:06}.{}", self.prefix, self.extension))
    }
}

/// Configuration for a frame pipeline run.
///
/// All fields except the output directory have defaults: fixed 5 m
/// decimation, no yaw correction, JPEG quality 90, no progress callback, no
/// cancellation, progress every frame.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
    /// Yaw correction applied to every kept frame, in degrees.
    pub(crate) yaw_degrees: f64,
    /// Spatial decimation policy.
    pub(crate) decimation: DecimationPolicy,
    /// Output naming.
    pub(crate) naming: FrameNaming,
    /// JPEG quality (1–100).
    pub(crate) jpeg_quality: u8,
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("yaw_degrees", &self.yaw_degrees)
            .field("decimation", &self.decimation)
            .field("naming", &self.naming)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl PipelineOptions {
    /// Create options writing into `directory` with default settings.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            yaw_degrees: 0.0,
            decimation: DecimationPolicy::default(),
            naming: FrameNaming::for_directory(directory),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Report progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Stop the run when `token` is cancelled.
    ///
    /// The pipeline polls the token before each frame and returns
    /// [`GeoframesError::Cancelled`] once it trips.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Report progress every `size` decoded frames. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the yaw correction in degrees.
    #[must_use]
    pub fn with_yaw(mut self, degrees: f64) -> Self {
        self.yaw_degrees = degrees;
        self
    }

    /// Set the decimation policy.
    #[must_use]
    pub fn with_decimation(mut self, policy: DecimationPolicy) -> Self {
        self.decimation = policy;
        self
    }

    /// Override the output file naming.
    #[must_use]
    pub fn with_naming(mut self, naming: FrameNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Set the JPEG quality (1–100).
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// The configured decimation policy.
    pub fn decimation(&self) -> &DecimationPolicy {
        &self.decimation
    }

    /// The configured yaw correction in degrees.
    pub fn yaw_degrees(&self) -> f64 {
        self.yaw_degrees
    }

    /// The configured output naming.
    pub fn naming(&self) -> &FrameNaming {
        &self.naming
    }

    /// The configured JPEG quality.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Check every option before any decoding starts.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::Configuration`] describing the first
    /// invalid setting.
    pub fn validate(&self) -> Result<(), GeoframesError> {
        self.decimation.validate()?;

        if !self.yaw_degrees.is_finite() {
            return Err(GeoframesError::Configuration(format!(
                "yaw must be finite, got {}",
                self.yaw_degrees
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(GeoframesError::Configuration(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.naming.prefix.is_empty() || self.naming.extension.is_empty() {
            return Err(GeoframesError::Configuration(
                "output prefix and extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
