//! GPX track loading.
//!
//! Reads GPS exchange files as produced by `exiftool` from a camera's
//! embedded telemetry. Each `<trkseg>` (across all `<trk>` elements, in
//! document order) becomes one [`Segment`]. Course is taken from a GPX 1.0
//! `<course>` element or from a `<heading>` extension; the extension wins
//! when both are present.
//!
//! # Example
//!
//! ```
//! use geoframes::parse_gpx_str;
//!
//! let gpx = r#"<?xml version="1.0"?>
//! <gpx version="1.0">
//!   <trk><trkseg>
//!     <trkpt lat="51.5" lon="-0.12"><time>2024-05-01T10:00:00Z</time></trkpt>
//!     <trkpt lat="51.5001" lon="-0.12"><time>2024-05-01T10:00:01Z</time></trkpt>
//!   </trkseg></trk>
//! </gpx>"#;
//!
//! let track = parse_gpx_str(gpx)?;
//! assert_eq!(track.waypoint_count(), 2);
//! # Ok::<(), geoframes::GeoframesError>(())
//! ```

use std::{fs, path::Path};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use quick_xml::{Reader, events::Event};

use crate::error::GeoframesError;
use crate::track::{Segment, Track, Waypoint};

/// Which text element the reader is inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Time,
    Course,
    Heading,
}

#[derive(Debug, Default)]
struct PendingPoint {
    latitude: f64,
    longitude: f64,
    time: Option<DateTime<FixedOffset>>,
    course: Option<f64>,
    heading: Option<f64>,
}

impl PendingPoint {
    fn finish(self) -> Waypoint {
        Waypoint {
            time: self.time,
            latitude: self.latitude,
            longitude: self.longitude,
            course: self.heading.or(self.course),
        }
    }
}

/// Parse a GPX timestamp. Zone-less timestamps are taken as UTC.
pub(crate) fn parse_gpx_time(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

fn parse_coordinate(name: &str, raw: &[u8]) -> Result<f64, GeoframesError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            GeoframesError::TrackParse(format!(
                "invalid {name} attribute: {:?}",
                String::from_utf8_lossy(raw)
            ))
        })
}

fn start_point(element: &quick_xml::events::BytesStart<'_>) -> Result<PendingPoint, GeoframesError> {
    let mut latitude = None;
    let mut longitude = None;
    for attribute in element.attributes().flatten() {
        match attribute.key.local_name().as_ref() {
            b"lat" => latitude = Some(parse_coordinate("lat", &attribute.value)?),
            b"lon" => longitude = Some(parse_coordinate("lon", &attribute.value)?),
            _ => {}
        }
    }

    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(PendingPoint {
            latitude,
            longitude,
            ..PendingPoint::default()
        }),
        _ => Err(GeoframesError::TrackParse(
            "trkpt is missing lat or lon".to_string(),
        )),
    }
}

/// Parse a GPX document into a [`Track`].
///
/// # Errors
///
/// Returns [`GeoframesError::TrackParse`] for malformed XML or track points
/// with missing or non-numeric coordinates.
pub fn parse_gpx_str(text: &str) -> Result<Track, GeoframesError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut segments = Vec::new();
    let mut current_segment: Option<Vec<Waypoint>> = None;
    let mut current_point: Option<PendingPoint> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(element) => match element.local_name().as_ref() {
                b"trkseg" => current_segment = Some(Vec::new()),
                b"trkpt" => current_point = Some(start_point(&element)?),
                b"time" if current_point.is_some() => field = Some(Field::Time),
                b"course" if current_point.is_some() => field = Some(Field::Course),
                b"heading" if current_point.is_some() => field = Some(Field::Heading),
                _ => {}
            },
            Event::Empty(element) => match element.local_name().as_ref() {
                b"trkpt" => {
                    let point = start_point(&element)?;
                    if let Some(segment) = current_segment.as_mut() {
                        segment.push(point.finish());
                    }
                }
                b"trkseg" => segments.push(Segment::default()),
                _ => {}
            },
            Event::Text(content) => {
                if let (Some(field), Some(point)) = (field, current_point.as_mut()) {
                    let text = content
                        .unescape()
                        .map_err(|e| GeoframesError::TrackParse(e.to_string()))?;
                    match field {
                        Field::Time => {
                            point.time = parse_gpx_time(&text);
                            if point.time.is_none() {
                                log::warn!("Ignoring unparseable GPX time {text:?}");
                            }
                        }
                        Field::Course => point.course = text.trim().parse().ok(),
                        Field::Heading => point.heading = text.trim().parse().ok(),
                    }
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"time" | b"course" | b"heading" => field = None,
                b"trkpt" => {
                    if let (Some(point), Some(segment)) =
                        (current_point.take(), current_segment.as_mut())
                    {
                        segment.push(point.finish());
                    }
                }
                b"trkseg" => {
                    if let Some(waypoints) = current_segment.take() {
                        segments.push(Segment::new(waypoints));
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    let track = Track::new(segments);
    log::debug!(
        "Parsed GPX track ({} segments, {} waypoints)",
        track.segments().len(),
        track.waypoint_count()
    );
    Ok(track)
}

/// Load and parse a GPX file.
///
/// # Errors
///
/// Returns [`GeoframesError::TrackUnavailable`] if the file cannot be read and
/// [`GeoframesError::TrackParse`] if it is not a valid GPX track.
pub fn load_gpx<P: AsRef<Path>>(path: P) -> Result<Track, GeoframesError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|error| GeoframesError::TrackUnavailable {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    parse_gpx_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_with_fraction_and_zone() {
        let time = parse_gpx_time("2024-05-01T10:00:00.250+02:00").unwrap();
        assert_eq!(time.timestamp_subsec_millis(), 250);
        assert_eq!(time.offset().local_minus_utc(), 7_200);
    }

    #[test]
    fn naive_time_is_utc() {
        let time = parse_gpx_time("2024-05-01T10:00:00").unwrap();
        assert_eq!(time.offset().local_minus_utc(), 0);
    }

    #[test]
    fn garbage_time_is_none() {
        assert!(parse_gpx_time("yesterday").is_none());
    }
}
