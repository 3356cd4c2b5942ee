//! Telemetry and timing from the source recording, via `exiftool`.
//!
//! Two things the frame pipeline needs come from the camera file itself and
//! are read with `exiftool`: the embedded GPS track (converted to GPX), and
//! the absolute time the recording started.

use std::{
    fs::{self, File},
    path::Path,
    process::{Command, Output, Stdio},
};

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::conversion::seconds_to_delta;
use crate::error::GeoframesError;

/// Name of the `exiftool` executable.
pub const EXIFTOOL: &str = "exiftool";

/// Print-format template turning embedded GPS samples into GPX.
const GPX_FORMAT: &str = r#"#[HEAD]<?xml version="1.0" encoding="utf-8"?>
#[HEAD]<gpx version="1.0"
#[HEAD] creator="ExifTool $ExifToolVersion"
#[HEAD] xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
#[HEAD] xmlns="http://www.topografix.com/GPX/1/0"
#[HEAD] xsi:schemaLocation="http://www.topografix.com/GPX/1/0 http://www.topografix.com/GPX/1/0/gpx.xsd">
#[HEAD]<trk>
#[HEAD]<number>1</number>
#[SECT]<trkseg>
#[IF]  $gpslatitude $gpslongitude
#[BODY]<trkpt lat="$gpslatitude#" lon="$gpslongitude#">
#[BODY]  <ele>$gpsaltitude#</ele>
#[BODY]  <time>${gpsdatetime#;DateFmt("%Y-%m-%dT%H:%M:%S%fZ")}</time>
#[BODY]  <course>$gpstrack#</course>
#[BODY]</trkpt>
#[ENDS]</trkseg>
#[TAIL]</trk>
#[TAIL]</gpx>
"#;

/// Tags consulted, in order, for the recording's start time.
const START_TIME_TAGS: [&str; 4] = [
    "-CreateDate",
    "-MediaCreateDate",
    "-TrackCreateDate",
    "-DateTimeOriginal",
];

fn exiftool() -> Command {
    let mut command = Command::new(EXIFTOOL);
    command.args(["-api", "largefilesupport=1"]);
    command
}

fn capture(command: &mut Command) -> Result<Output, GeoframesError> {
    command.output().map_err(|error| GeoframesError::ExternalTool {
        tool: EXIFTOOL.to_string(),
        reason: error.to_string(),
    })
}

/// Convert the embedded GPS telemetry of `source` into a GPX file.
///
/// Does nothing if `gpx_path` already exists, so a track can be extracted
/// once and edited by hand before rerunning.
///
/// # Errors
///
/// Returns [`GeoframesError::TrackUnavailable`] if `exiftool` cannot be run
/// or exits unsuccessfully.
pub fn extract_gpx<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    gpx_path: Q,
) -> Result<(), GeoframesError> {
    let source = source.as_ref();
    let gpx_path = gpx_path.as_ref();

    if gpx_path.exists() {
        log::info!(
            "GPX file {} already exists, skipping extraction",
            gpx_path.display()
        );
        return Ok(());
    }

    log::info!("Extracting GPX from {}", source.display());

    let unavailable = |reason: String| GeoframesError::TrackUnavailable {
        path: gpx_path.to_path_buf(),
        reason,
    };

    let format_path = gpx_path.with_extension("fmt");
    fs::write(&format_path, GPX_FORMAT)?;

    let status = File::create(gpx_path).and_then(|output| {
        exiftool()
            .arg("-p")
            .arg(&format_path)
            .arg("-ee3")
            .arg(source)
            .stdout(output)
            .stderr(Stdio::inherit())
            .status()
    });

    if let Err(error) = fs::remove_file(&format_path) {
        log::warn!("Failed to remove {}: {error}", format_path.display());
    }

    let status = status.map_err(|error| unavailable(format!("failed to run {EXIFTOOL}: {error}")))?;
    if !status.success() {
        // An empty or partial file would be mistaken for a cached track next time.
        let _ = fs::remove_file(gpx_path);
        return Err(unavailable(format!("{EXIFTOOL} exited with {status}")));
    }

    Ok(())
}

/// Parse an EXIF date (`YYYY:MM:DD HH:MM:SS[.fff][±HH:MM|Z]`).
///
/// Returns the time and whether the zone had to be assumed (UTC).
pub(crate) fn parse_exif_time(text: &str) -> Option<(DateTime<FixedOffset>, bool)> {
    let text = text.trim().trim_matches('\'');
    if let Ok(time) = DateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S%.f%:z") {
        return Some((time, false));
    }
    if let Some(utc) = text.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y:%m:%d %H:%M:%S%.f")
            .ok()
            .map(|naive| (naive.and_utc().fixed_offset(), false));
    }
    NaiveDateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S%.f")
        .ok()
        .map(|naive| (naive.and_utc().fixed_offset(), true))
}

/// Pick between the container's start time and the first GPS timestamp.
///
/// The GPS clock is usually the more accurate of the two, so it is preferred
/// whenever it lies within one second of the container time. Otherwise the
/// container time stands.
pub fn reconcile_start_time(
    metadata_time: DateTime<FixedOffset>,
    gps_time: Option<DateTime<FixedOffset>>,
) -> DateTime<FixedOffset> {
    match gps_time {
        Some(gps_time)
            if (gps_time - metadata_time)
                .num_microseconds()
                .is_some_and(|delta| delta.abs() < 1_000_000) =>
        {
            log::info!("Using GPS start time {gps_time}, within 1 second of {metadata_time}");
            gps_time
        }
        _ => metadata_time,
    }
}

/// Move a resolved start time by `seconds`, e.g. to cancel the camera's
/// capture latency.
///
/// # Errors
///
/// Returns [`GeoframesError::Configuration`] if `seconds` is not finite or
/// the shifted time cannot be represented.
pub fn shift_start_time(
    start: DateTime<FixedOffset>,
    seconds: f64,
) -> Result<DateTime<FixedOffset>, GeoframesError> {
    seconds_to_delta(seconds)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| {
            GeoframesError::Configuration(format!(
                "start offset of {seconds}s moves {start} out of range"
            ))
        })
}

fn first_line(output: &Output) -> Option<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Read the first embedded `GPSDateTime` of `source`.
///
/// # Errors
///
/// Returns [`GeoframesError::ExternalTool`] if `exiftool` cannot be run.
pub fn gps_start_time<P: AsRef<Path>>(
    source: P,
) -> Result<Option<DateTime<FixedOffset>>, GeoframesError> {
    let output = capture(
        exiftool()
            .arg("-ee")
            .args(["-p", "$GPSDateTime"])
            .arg(source.as_ref()),
    )?;
    Ok(first_line(&output).and_then(|line| parse_exif_time(&line).map(|(time, _)| time)))
}

/// Resolve the absolute start time of `source`.
///
/// # Errors
///
/// Returns [`GeoframesError::StartTimeUnresolved`] if no creation date tag
/// can be read or parsed, and [`GeoframesError::ExternalTool`] if `exiftool`
/// cannot be run.
pub fn resolve_start_time<P: AsRef<Path>>(source: P) -> Result<DateTime<FixedOffset>, GeoframesError> {
    let source = source.as_ref();
    let output = capture(
        exiftool()
            .args(["-s", "-s", "-s"])
            .args(START_TIME_TAGS)
            .arg(source),
    )?;

    let line = first_line(&output).ok_or_else(|| {
        GeoframesError::StartTimeUnresolved(format!(
            "no creation date found in {}",
            source.display()
        ))
    })?;
    let (metadata_time, assumed_utc) = parse_exif_time(&line).ok_or_else(|| {
        GeoframesError::StartTimeUnresolved(format!("unrecognised date {line:?}"))
    })?;

    let gps_time = gps_start_time(source).unwrap_or_else(|error| {
        log::warn!("Could not read GPS start time: {error}");
        None
    });

    let start_time = reconcile_start_time(metadata_time, gps_time);
    if start_time == metadata_time && assumed_utc {
        log::warn!("Start time {line:?} has no time zone, assuming UTC");
    }
    Ok(start_time)
}
