//! Yaw reprojection of equirectangular frames.
//!
//! The stage is a three-node FFmpeg filter graph,
//! `buffer → v360 → buffersink`, configured once from a
//! [`ReprojectionContext`] and reused for every kept frame. It keeps no
//! history between frames: each call is an independent transform.
//!
//! The pipeline talks to the stage through [`ReprojectorFactory`] and
//! [`Reprojector`], so the graph is only built when the first frame is kept.

use ffmpeg_next::{filter::Graph as FilterGraph, frame::Video as VideoFrame};
use ffmpeg_sys_next::AVPixelFormat;

use crate::error::GeoframesError;
use crate::frame::{DecodedFrame, FrameGeometry};
use crate::source::SourceFrame;

/// Fixed configuration of a reprojection stage for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectionContext {
    /// Geometry every frame of the run must have.
    pub geometry: FrameGeometry,
    /// Yaw rotation in degrees.
    pub yaw_degrees: f64,
}

impl ReprojectionContext {
    /// Create a context from the first decoded frame's geometry.
    pub fn new(geometry: FrameGeometry, yaw_degrees: f64) -> Self {
        Self {
            geometry,
            yaw_degrees,
        }
    }

    /// Fail if `found` does not match the declared geometry.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::GeometryMismatch`].
    pub fn ensure_matches(&self, found: FrameGeometry) -> Result<(), GeoframesError> {
        if found == self.geometry {
            Ok(())
        } else {
            Err(GeoframesError::GeometryMismatch {
                expected: self.geometry,
                found,
            })
        }
    }
}

/// Transforms one decoded frame into one reprojected frame.
pub trait Reprojector {
    /// Frame type accepted by the stage.
    type Input: DecodedFrame;
    /// Frame type produced by the stage.
    type Output;

    /// Reproject a single frame.
    fn reproject(&mut self, frame: &Self::Input) -> Result<Self::Output, GeoframesError>;
}

/// Builds a [`Reprojector`] once the run's geometry is known.
pub trait ReprojectorFactory {
    /// The stage this factory builds.
    type Reprojector: Reprojector;

    /// Build a stage for `context`.
    fn build(&self, context: &ReprojectionContext) -> Result<Self::Reprojector, GeoframesError>;
}

/// Factory for [`YawFilterGraph`] stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct YawReprojection;

impl ReprojectorFactory for YawReprojection {
    type Reprojector = YawFilterGraph;

    fn build(&self, context: &ReprojectionContext) -> Result<YawFilterGraph, GeoframesError> {
        YawFilterGraph::new(*context)
    }
}

/// An FFmpeg `v360` filter graph rotating equirectangular frames about the
/// vertical axis.
pub struct YawFilterGraph {
    context: ReprojectionContext,
    graph: FilterGraph,
}

impl YawFilterGraph {
    /// Build and validate the graph for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::FilterGraphError`] if FFmpeg lacks the
    /// required filters or rejects the graph.
    pub fn new(context: ReprojectionContext) -> Result<Self, GeoframesError> {
        let geometry = context.geometry;
        log::debug!(
            "Building v360 yaw graph (geometry={geometry}, yaw={})",
            context.yaw_degrees
        );

        let mut graph = FilterGraph::new();

        let buffer_args = format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect=1/1",
            geometry.width,
            geometry.height,
            AVPixelFormat::from(geometry.pixel_format) as i32,
            geometry.time_base.numerator(),
            geometry.time_base.denominator(),
        );

        graph
            .add(
                &ffmpeg_next::filter::find("buffer").ok_or_else(|| {
                    GeoframesError::FilterGraphError("FFmpeg 'buffer' filter not found".to_string())
                })?,
                "in",
                &buffer_args,
            )
            .map_err(|e| {
                GeoframesError::FilterGraphError(format!("Failed to add buffer filter: {e}"))
            })?;

        graph
            .add(
                &ffmpeg_next::filter::find("buffersink").ok_or_else(|| {
                    GeoframesError::FilterGraphError(
                        "FFmpeg 'buffersink' filter not found".to_string(),
                    )
                })?,
                "out",
                "",
            )
            .map_err(|e| {
                GeoframesError::FilterGraphError(format!("Failed to add buffersink filter: {e}"))
            })?;

        let v360_spec = format!(
            "v360=input=equirect:output=equirect:yaw={}",
            context.yaw_degrees
        );
        graph
            .output("in", 0)
            .map_err(|e| GeoframesError::FilterGraphError(format!("Filter graph output error: {e}")))?
            .input("out", 0)
            .map_err(|e| GeoframesError::FilterGraphError(format!("Filter graph input error: {e}")))?
            .parse(&v360_spec)
            .map_err(|e| GeoframesError::FilterGraphError(format!("Filter graph parse error: {e}")))?;

        graph
            .validate()
            .map_err(|e| GeoframesError::FilterGraphError(format!("Filter graph validation: {e}")))?;

        Ok(Self { context, graph })
    }

    /// The context this graph was built for.
    pub fn context(&self) -> &ReprojectionContext {
        &self.context
    }
}

impl Reprojector for YawFilterGraph {
    type Input = SourceFrame;
    type Output = VideoFrame;

    fn reproject(&mut self, frame: &SourceFrame) -> Result<VideoFrame, GeoframesError> {
        self.context.ensure_matches(frame.geometry())?;

        self.graph
            .get("in")
            .ok_or_else(|| GeoframesError::FilterGraphError("Filter 'in' not found".to_string()))?
            .source()
            .add(frame.raw())
            .map_err(|e| GeoframesError::FilterGraphError(format!("Failed to feed filter: {e}")))?;

        let mut filtered = VideoFrame::empty();
        self.graph
            .get("out")
            .ok_or_else(|| GeoframesError::FilterGraphError("Filter 'out' not found".to_string()))?
            .sink()
            .frame(&mut filtered)
            .map_err(|e| {
                GeoframesError::FilterGraphError(format!("No frame from v360 filter: {e}"))
            })?;

        Ok(filtered)
    }
}
