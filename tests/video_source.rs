//! FFmpeg-backed source, reprojection, and JPEG output tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;

use chrono::{DateTime, FixedOffset, TimeDelta};
use geoframes::{
    DecimationPolicy, DecodedFrame, FramePipeline, GeoframesError, JpegWriter, PipelineOptions,
    Segment, Track, VideoSource, Waypoint, YawReprojection,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_360.mp4"
}

fn start() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap()
}

/// A straight walk north, one fix per second, ~11 m apart.
fn track_covering(seconds: i64) -> Track {
    Track::new(vec![Segment::new(
        (0..=seconds)
            .map(|i| Waypoint::new(Some(start() + TimeDelta::seconds(i)), i as f64 * 0.0001, 0.0))
            .collect(),
    )])
}

#[test]
fn open_reports_stream_info() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path).expect("Failed to open fixture");
    let info = source.info();
    assert_eq!(info.width, 2 * info.height, "fixture is equirectangular");
    assert!(info.frames_per_second > 0.0);
    assert!(info.duration.as_secs_f64() > 0.0);
    assert!(info.frame_count > 0);
}

#[test]
fn frames_are_in_presentation_order_from_zero() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = VideoSource::open(path).expect("Failed to open fixture");
    let expected = source.info().frame_count;
    let offsets: Vec<f64> = source
        .frames()
        .expect("Failed to start decoding")
        .map(|frame| frame.expect("Failed to decode").presentation_offset())
        .collect();

    assert!(!offsets.is_empty());
    assert!(offsets[0].abs() < 1e-3, "first offset was {}", offsets[0]);
    for window in offsets.windows(2) {
        assert!(window[1] > window[0], "offsets must increase: {window:?}");
    }
    let decoded = offsets.len() as u64;
    assert!(decoded.abs_diff(expected) <= 2, "decoded {decoded}, expected ~{expected}");
}

#[test]
fn every_frame_shares_one_geometry() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = VideoSource::open(path).expect("Failed to open fixture");
    let mut frames = source.frames().expect("Failed to start decoding");
    let first = frames.next().unwrap().unwrap().geometry();
    for frame in frames {
        assert_eq!(frame.unwrap().geometry(), first);
    }
}

#[test]
fn pipeline_writes_reprojected_jpegs() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let out = temporary_directory.path().join("sample");
    std::fs::create_dir_all(&out).unwrap();

    let mut source = VideoSource::open(path).expect("Failed to open fixture");
    let (width, height) = (source.info().width, source.info().height);
    let seconds = source.info().duration.as_secs() as i64 + 1;
    let track = track_covering(seconds);

    let options = PipelineOptions::new(&out)
        .with_yaw(90.0)
        .with_decimation(DecimationPolicy::Fixed(5.0));
    let mut pipeline =
        FramePipeline::new(&track, start(), &options, YawReprojection).expect("valid options");
    let records = pipeline
        .run(source.frames().unwrap(), &mut JpegWriter::default())
        .expect("Pipeline failed");

    // One kept frame per one-second fix.
    assert!(!records.is_empty());
    assert!(records.len() as i64 <= seconds + 1);

    for record in &records {
        let image = image::open(&record.file_path).expect("Failed to read written frame");
        assert_eq!(image.width(), width);
        assert_eq!(image.height(), height);
    }
    assert!(
        records
            .windows(2)
            .all(|pair| pair[0].frame_index < pair[1].frame_index)
    );
}

#[test]
fn corrupted_payload_fails_the_stream_instead_of_ending_it() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // Scribble over the middle of the media data; the index at the tail
    // stays intact so the file still opens.
    let mut bytes = std::fs::read(path).expect("Failed to read fixture");
    let (from, to) = (bytes.len() / 5, bytes.len() * 3 / 5);
    for (i, byte) in bytes[from..to].iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(37) ^ 0xA5;
    }
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let corrupted = temporary_directory.path().join("corrupted.mp4");
    std::fs::write(&corrupted, &bytes).unwrap();

    let mut source = match VideoSource::open(&corrupted) {
        Ok(source) => source,
        Err(error) => {
            assert_eq!(error.exit_code(), 5, "{error}");
            return;
        }
    };
    let mut frames = source.frames().expect("Failed to start decoding");
    while let Some(frame) = frames.next() {
        if let Err(error) = frame {
            assert!(
                matches!(error, GeoframesError::VideoDecodeError(_)),
                "{error:?}"
            );
            assert_eq!(error.exit_code(), 5);
            assert!(frames.next().is_none(), "a failed stream yields nothing more");
            return;
        }
    }
}

#[test]
fn truncated_file_is_a_decode_class_failure() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let bytes = std::fs::read(path).expect("Failed to read fixture");
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let truncated = temporary_directory.path().join("truncated.mp4");
    std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

    let error = match VideoSource::open(&truncated) {
        Err(error) => error,
        Ok(mut source) => match source
            .frames()
            .and_then(|frames| frames.collect::<Result<Vec<_>, _>>())
        {
            Err(error) => error,
            Ok(_) => return,
        },
    };
    assert_eq!(error.exit_code(), 5, "{error}");
}
