//! The frame selection pipeline.
//!
//! [`FramePipeline`] walks a decoded frame sequence once, front to back. For
//! every frame it computes the absolute capture time, looks up the camera's
//! position and ground speed in the [`Track`], and asks the
//! [`DecimationPolicy`] whether the frame adds new coverage. Kept frames are
//! yaw-reprojected, written through an [`ImageSink`], and reported as
//! [`SelectionRecord`]s in frame order.
//!
//! Frames are handled strictly one at a time: frame N is fully decided (and
//! written, if kept) before frame N+1 is pulled from the source, because each
//! decision depends on every position accepted before it.
//!
//! # Example
//!
//! ```no_run
//! use chrono::DateTime;
//! use geoframes::{
//!     FramePipeline, GeoframesError, JpegWriter, PipelineOptions, VideoSource,
//!     YawReprojection, load_gpx,
//! };
//!
//! let track = load_gpx("ride/ride.gpx")?;
//! let start = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap();
//! let options = PipelineOptions::new("ride").with_yaw(90.0);
//!
//! let mut source = VideoSource::open("ride.mp4")?;
//! let mut pipeline = FramePipeline::new(&track, start, &options, YawReprojection)?;
//! let records = pipeline.run(source.frames()?, &mut JpegWriter::new(90))?;
//! println!("kept {} frames", records.len());
//! # Ok::<(), GeoframesError>(())
//! ```

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};

use crate::configuration::PipelineOptions;
use crate::conversion::seconds_to_delta;
use crate::decimation::{DecimationPolicy, DecimationState};
use crate::error::GeoframesError;
use crate::frame::DecodedFrame;
use crate::persistence::ImageSink;
use crate::progress::{FrameCounts, ProgressTracker};
use crate::reprojection::{ReprojectionContext, Reprojector, ReprojectorFactory};
use crate::speed::estimate_speed_from;
use crate::track::{Track, Waypoint};

/// One kept frame, ready for metadata tagging.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRecord {
    /// Zero-based index of the frame in decode order.
    pub frame_index: u64,
    /// Where the reprojected frame was written.
    pub file_path: PathBuf,
    /// Absolute capture time of the frame.
    pub frame_time: DateTime<FixedOffset>,
    /// Position the frame was matched to.
    pub position: Waypoint,
}

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No frame has been seen yet.
    Uninitialized,
    /// At least one frame has been processed.
    Decoding,
    /// The frame source is exhausted.
    Finished,
}

/// What happened to a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// The track has no position for the frame's time.
    Uncovered,
    /// Too close to an already-kept position.
    Discarded,
    /// Reprojected, written, and recorded.
    Kept,
}

/// Drives frame selection for one video.
///
/// A pipeline is single-use: once [`run`](FramePipeline::run) finishes, it
/// cannot be run again.
pub struct FramePipeline<'a, F: ReprojectorFactory> {
    track: &'a Track,
    run_start_time: DateTime<FixedOffset>,
    options: &'a PipelineOptions,
    factory: F,
    context: Option<ReprojectionContext>,
    reprojector: Option<F::Reprojector>,
    history: DecimationState,
    records: Vec<SelectionRecord>,
    progress: ProgressTracker,
    state: PipelineState,
}

impl<'a, F: ReprojectorFactory> FramePipeline<'a, F> {
    /// Set up a run.
    ///
    /// `run_start_time` is the absolute time of the first frame of the
    /// stream; each frame's presentation offset is added to it.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::Configuration`] if `options` fail
    /// validation. Nothing is decoded before this check.
    pub fn new(
        track: &'a Track,
        run_start_time: DateTime<FixedOffset>,
        options: &'a PipelineOptions,
        factory: F,
    ) -> Result<Self, GeoframesError> {
        options.validate()?;

        if track.is_empty() {
            log::warn!("GPS track is empty, no frames will be kept");
        }

        Ok(Self {
            track,
            run_start_time,
            options,
            factory,
            context: None,
            reprojector: None,
            history: DecimationState::new(),
            records: Vec::new(),
            progress: ProgressTracker::new(options.progress.clone(), options.batch_size),
            state: PipelineState::Uninitialized,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Frame counters so far.
    pub fn counts(&self) -> FrameCounts {
        self.progress.counts()
    }

    /// Positions kept so far.
    pub fn history(&self) -> &DecimationState {
        &self.history
    }

    /// The reprojection context, once the first frame has been seen.
    pub fn context(&self) -> Option<&ReprojectionContext> {
        self.context.as_ref()
    }

    /// The decimation policy in effect.
    pub fn policy(&self) -> &DecimationPolicy {
        &self.options.decimation
    }

    /// Process every frame from `frames` and return the kept-frame records in
    /// frame order.
    ///
    /// # Errors
    ///
    /// Stops at the first error: a frame source failure, a geometry change,
    /// a reprojection or persistence failure, or cancellation. Frames kept
    /// before the error remain on disk.
    pub fn run<I, S>(&mut self, frames: I, sink: &mut S) -> Result<Vec<SelectionRecord>, GeoframesError>
    where
        I: IntoIterator<Item = Result<<F::Reprojector as Reprojector>::Input, GeoframesError>>,
        S: ImageSink<<F::Reprojector as Reprojector>::Output>,
    {
        if self.state == PipelineState::Finished {
            return Err(GeoframesError::Configuration(
                "pipeline has already finished a run".to_string(),
            ));
        }

        for frame in frames {
            if self.options.is_cancelled() {
                return Err(GeoframesError::Cancelled);
            }
            let frame = frame?;
            self.process_frame(&frame, sink)?;
        }

        self.state = PipelineState::Finished;
        self.progress.finish();

        let counts = self.progress.counts();
        log::info!(
            "Frame selection complete: {} frames, {} kept, {} discarded, {} without GPS coverage",
            counts.frames,
            counts.kept,
            counts.discarded,
            counts.uncovered,
        );

        Ok(std::mem::take(&mut self.records))
    }

    /// Decide a single frame.
    ///
    /// Frames must be supplied in presentation order.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::GeometryMismatch`] if the frame's geometry
    /// differs from the first frame's, [`GeoframesError::VideoDecodeError`]
    /// if its presentation offset does not give a representable time, or any
    /// reprojection or persistence error for a kept frame.
    pub fn process_frame<S>(
        &mut self,
        frame: &<F::Reprojector as Reprojector>::Input,
        sink: &mut S,
    ) -> Result<FrameDecision, GeoframesError>
    where
        S: ImageSink<<F::Reprojector as Reprojector>::Output>,
    {
        let frame_index = self.progress.counts().frames;
        let geometry = frame.geometry();
        match &self.context {
            Some(context) => context.ensure_matches(geometry)?,
            None => {
                self.context = Some(ReprojectionContext::new(geometry, self.options.yaw_degrees));
                self.state = PipelineState::Decoding;
            }
        }

        let offset = frame.presentation_offset();
        let frame_time = seconds_to_delta(offset)
            .and_then(|delta| self.run_start_time.checked_add_signed(delta))
            .ok_or_else(|| {
                GeoframesError::VideoDecodeError(format!(
                    "frame {frame_index} has an out-of-range presentation offset of {offset}s"
                ))
            })?;

        let decision = match self.track.position_at(frame_time).copied() {
            None => {
                log::trace!("No GPS coverage for frame {frame_index} at {frame_time}");
                self.progress.record_speed(0.0);
                self.progress.record_uncovered();
                FrameDecision::Uncovered
            }
            Some(position) => {
                let speed = estimate_speed_from(self.track, &position, frame_time);
                self.progress.record_speed(speed);

                if self.options.decimation.keep(&self.history, &position, speed) {
                    self.keep_frame(frame, frame_index, frame_time, position, sink)?;
                    self.progress.record_kept();
                    FrameDecision::Kept
                } else {
                    self.progress.record_discarded();
                    FrameDecision::Discarded
                }
            }
        };

        self.progress.advance(offset);
        Ok(decision)
    }

    fn keep_frame<S>(
        &mut self,
        frame: &<F::Reprojector as Reprojector>::Input,
        frame_index: u64,
        frame_time: DateTime<FixedOffset>,
        position: Waypoint,
        sink: &mut S,
    ) -> Result<(), GeoframesError>
    where
        S: ImageSink<<F::Reprojector as Reprojector>::Output>,
    {
        if self.reprojector.is_none() {
            let Some(context) = self.context.as_ref() else {
                return Err(GeoframesError::Configuration(
                    "reprojection context missing for kept frame".to_string(),
                ));
            };
            self.reprojector = Some(self.factory.build(context)?);
        }
        let Some(reprojector) = self.reprojector.as_mut() else {
            return Err(GeoframesError::Configuration(
                "reprojection stage missing for kept frame".to_string(),
            ));
        };

        let reprojected = reprojector.reproject(frame)?;
        let file_path = self.options.naming.path_for(self.records.len() as u64);
        sink.persist(&reprojected, &file_path)?;

        self.history.push(position);
        self.records.push(SelectionRecord {
            frame_index,
            file_path,
            frame_time,
            position,
        });
        Ok(())
    }
}
