//! GPX loading tests.

use chrono::DateTime;
use geoframes::{GeoframesError, load_gpx, parse_gpx_str};

const TWO_TRACKS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<gpx version="1.0" creator="ExifTool 12.76" xmlns="http://www.topografix.com/GPX/1/0">
<metadata><time>2020-01-01T00:00:00Z</time></metadata>
<trk>
<number>1</number>
<trkseg>
<trkpt lat="51.5000" lon="-0.1200">
  <ele>11.2</ele>
  <time>2024-05-01T10:00:00.000Z</time>
  <course>90.5</course>
</trkpt>
<trkpt lat="51.5001" lon="-0.1200">
  <ele>11.3</ele>
  <time>2024-05-01T10:00:01.000Z</time>
  <course>91</course>
</trkpt>
</trkseg>
<trkseg>
<trkpt lat="51.6" lon="-0.13"><time>2024-05-01T10:05:00Z</time></trkpt>
</trkseg>
</trk>
<trk>
<trkseg>
<trkpt lat="-33.9" lon="18.4"><time>2024-05-01T11:00:00+02:00</time></trkpt>
</trkseg>
</trk>
</gpx>
"#;

#[test]
fn every_trkseg_becomes_a_segment() {
    let track = parse_gpx_str(TWO_TRACKS).unwrap();
    assert_eq!(track.segments().len(), 3);
    assert_eq!(track.waypoint_count(), 4);
    assert_eq!(track.segments()[0].len(), 2);
}

#[test]
fn waypoint_fields_are_parsed() {
    let track = parse_gpx_str(TWO_TRACKS).unwrap();
    let first = track.segments()[0].waypoints()[0];
    assert_eq!(first.latitude, 51.5);
    assert_eq!(first.longitude, -0.12);
    assert_eq!(first.course, Some(90.5));
    assert_eq!(
        first.time,
        Some(DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap())
    );

    let southern = track.segments()[2].waypoints()[0];
    assert_eq!(southern.latitude, -33.9);
    assert_eq!(
        southern.time.unwrap(),
        DateTime::parse_from_rfc3339("2024-05-01T09:00:00Z").unwrap()
    );
    assert_eq!(southern.course, None);
}

#[test]
fn metadata_time_is_not_a_waypoint_time() {
    let track = parse_gpx_str(TWO_TRACKS).unwrap();
    let (start, _) = track.time_span().unwrap();
    assert_eq!(start, DateTime::parse_from_rfc3339("2024-05-01T09:00:00Z").unwrap());
}

#[test]
fn heading_extension_wins_over_course() {
    let gpx = r#"<gpx><trk><trkseg>
        <trkpt lat="1" lon="2">
          <time>2024-05-01T10:00:00Z</time>
          <course>10</course>
          <extensions><heading>200.25</heading></extensions>
        </trkpt>
        <trkpt lat="1" lon="2.0001">
          <extensions><heading>201</heading></extensions>
        </trkpt>
    </trkseg></trk></gpx>"#;

    let track = parse_gpx_str(gpx).unwrap();
    let waypoints = track.segments()[0].waypoints();
    assert_eq!(waypoints[0].course, Some(200.25));
    assert_eq!(waypoints[1].course, Some(201.0));
    assert_eq!(waypoints[1].time, None);
}

#[test]
fn self_closing_points_and_segments() {
    let gpx = r#"<gpx><trk>
        <trkseg><trkpt lat="1" lon="2"/><trkpt lat="1.5" lon="2"/></trkseg>
        <trkseg/>
    </trk></gpx>"#;

    let track = parse_gpx_str(gpx).unwrap();
    assert_eq!(track.segments().len(), 2);
    assert_eq!(track.segments()[0].len(), 2);
    assert!(track.segments()[1].is_empty());
}

#[test]
fn zone_less_times_are_utc() {
    let gpx = r#"<gpx><trk><trkseg>
        <trkpt lat="1" lon="2"><time>2024-05-01T10:00:00</time></trkpt>
    </trkseg></trk></gpx>"#;
    let track = parse_gpx_str(gpx).unwrap();
    let time = track.segments()[0].waypoints()[0].time.unwrap();
    assert_eq!(time, DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap());
}

#[test]
fn missing_coordinate_is_a_parse_error() {
    let gpx = r#"<gpx><trk><trkseg><trkpt lat="1"></trkpt></trkseg></trk></gpx>"#;
    let error = parse_gpx_str(gpx).unwrap_err();
    assert!(matches!(error, GeoframesError::TrackParse(_)));
    assert_eq!(error.exit_code(), 2);
}

#[test]
fn non_numeric_coordinate_is_a_parse_error() {
    let gpx = r#"<gpx><trk><trkseg><trkpt lat="north" lon="2"/></trkseg></trk></gpx>"#;
    assert!(matches!(
        parse_gpx_str(gpx),
        Err(GeoframesError::TrackParse(_))
    ));
}

#[test]
fn mismatched_tags_are_a_parse_error() {
    let gpx = r#"<gpx><trk><trkseg></trk></gpx>"#;
    assert!(matches!(
        parse_gpx_str(gpx),
        Err(GeoframesError::TrackParse(_))
    ));
}

#[test]
fn load_from_file() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("ride.gpx");
    std::fs::write(&path, TWO_TRACKS).expect("Failed to write GPX");

    let track = load_gpx(&path).unwrap();
    assert_eq!(track.waypoint_count(), 4);
}

#[test]
fn missing_file_is_track_unavailable() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("missing.gpx");

    let error = load_gpx(&path).unwrap_err();
    match &error {
        GeoframesError::TrackUnavailable { path: reported, .. } => assert_eq!(reported, &path),
        other => panic!("Expected TrackUnavailable, got: {other}"),
    }
    assert_eq!(error.exit_code(), 2);
}
