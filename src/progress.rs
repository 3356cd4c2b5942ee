//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a frame pipeline
//! run, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geoframes::{PipelineOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "frame {} kept {} discarded {} ({:.1} mph)",
//!             info.frames, info.kept, info.discarded, info.ground_speed_mph,
//!         );
//!     }
//! }
//!
//! let options = PipelineOptions::new("frames").with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::speed::MPS_TO_MPH;

/// A snapshot of pipeline progress.
///
/// Delivered to [`ProgressCallback::on_progress`] every
/// [`batch_size`](crate::PipelineOptions::with_batch_size) frames and once
/// more when the run finishes. Purely observational.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames decoded so far.
    pub frames: u64,
    /// Frames kept and written.
    pub kept: u64,
    /// Frames rejected by the decimation policy.
    pub discarded: u64,
    /// Frames skipped because the track had no position for them.
    pub uncovered: u64,
    /// Kept frames per second of video processed.
    pub effective_rate: f64,
    /// Seconds of video processed per wall-clock second.
    pub throughput: f64,
    /// Ground speed at the most recent covered frame, in mph.
    pub ground_speed_mph: f64,
    /// Wall-clock time elapsed since the run started.
    pub elapsed: Duration,
    /// Presentation offset of the most recent frame.
    pub current_timestamp: Option<Duration>,
}

/// Observer of a running pipeline.
///
/// Must be [`Send`] and [`Sync`] so a spinner or logger on another thread
/// can hold the same callback. A callback cannot stop the run; hand the
/// pipeline a [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Receives a snapshot every batch and once at the end.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared stop flag for a pipeline run.
///
/// Clones share one flag. The pipeline polls it before each frame, so a
/// run stops within one frame of [`cancel`](CancellationToken::cancel)
/// being called from any clone.
///
/// # Example
///
/// ```
/// use geoframes::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether any clone has called [`cancel`](Self::cancel).
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounts {
    /// Frames decoded.
    pub frames: u64,
    /// Frames kept.
    pub kept: u64,
    /// Frames rejected by the decimation policy.
    pub discarded: u64,
    /// Frames with no GPS coverage.
    pub uncovered: u64,
}

/// Internal helper that tracks counters and timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    counts: FrameCounts,
    batch_size: u64,
    start_time: Instant,
    frames_since_last_report: u64,
    video_seconds: f64,
    speed_mps: f64,
}

impl ProgressTracker {
    /// Create a new tracker.
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, batch_size: u64) -> Self {
        Self {
            callback,
            counts: FrameCounts::default(),
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            frames_since_last_report: 0,
            video_seconds: 0.0,
            speed_mps: 0.0,
        }
    }

    pub(crate) fn counts(&self) -> FrameCounts {
        self.counts
    }

    pub(crate) fn record_kept(&mut self) {
        self.counts.kept += 1;
    }

    pub(crate) fn record_discarded(&mut self) {
        self.counts.discarded += 1;
    }

    pub(crate) fn record_uncovered(&mut self) {
        self.counts.uncovered += 1;
    }

    pub(crate) fn record_speed(&mut self, speed_mps: f64) {
        self.speed_mps = speed_mps;
    }

    /// Record one completed frame and fire the callback if the batch
    /// threshold is reached.
    pub(crate) fn advance(&mut self, presentation_offset: f64) {
        self.counts.frames += 1;
        self.frames_since_last_report += 1;
        self.video_seconds = presentation_offset.max(0.0);

        if self.frames_since_last_report >= self.batch_size {
            self.report();
            self.frames_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        let elapsed = self.start_time.elapsed();

        let effective_rate = if self.video_seconds > 0.0 {
            self.counts.kept as f64 / self.video_seconds
        } else {
            0.0
        };

        let wall_seconds = elapsed.as_secs_f64();
        let throughput = if wall_seconds > 0.0 {
            self.video_seconds / wall_seconds
        } else {
            0.0
        };

        let info = ProgressInfo {
            frames: self.counts.frames,
            kept: self.counts.kept,
            discarded: self.counts.discarded,
            uncovered: self.counts.uncovered,
            effective_rate,
            throughput,
            ground_speed_mph: self.speed_mps * MPS_TO_MPH,
            elapsed,
            current_timestamp: Duration::try_from_secs_f64(self.video_seconds).ok(),
        };

        self.callback.on_progress(&info);
    }
}
