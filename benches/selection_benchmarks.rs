//! Benchmarks for position resolution, speed estimation, and decimation.
//!
//! Run with: cargo bench
//!
//! The decode benchmark requires fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{hint::black_box, path::Path};

use chrono::{DateTime, FixedOffset, TimeDelta};
use criterion::{BenchmarkId, Criterion};
use geoframes::{
    AdaptiveDistance, DecimationPolicy, DecimationState, FfmpegLogLevel, Segment, Track,
    VideoSource, Waypoint, estimate_speed,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_360.mp4";

fn start() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap()
}

/// An hour of 10 Hz fixes split into segments of `segment_seconds`.
fn hour_long_track(segment_seconds: i64) -> Track {
    let fixes_per_segment = segment_seconds * 10;
    let segments = (0..3_600 / segment_seconds)
        .map(|segment| {
            Segment::new(
                (0..fixes_per_segment)
                    .map(|fix| {
                        let index = segment * fixes_per_segment + fix;
                        Waypoint::new(
                            Some(start() + TimeDelta::milliseconds(index * 100)),
                            index as f64 * 0.000_01,
                            0.0,
                        )
                    })
                    .collect(),
            )
        })
        .collect();
    Track::new(segments)
}

fn benchmark_resolve(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("resolve");
    for segment_seconds in [60, 600, 3_600] {
        let track = hour_long_track(segment_seconds);
        let query = start() + TimeDelta::milliseconds(1_800_050);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{segment_seconds}s segments")),
            &track,
            |bencher, track| bencher.iter(|| black_box(track.resolve(black_box(query)).len())),
        );
    }
    group.finish();
}

fn benchmark_speed(criterion: &mut Criterion) {
    let track = hour_long_track(600);
    let query = start() + TimeDelta::milliseconds(1_800_050);
    criterion.bench_function("estimate speed", |bencher| {
        bencher.iter(|| black_box(estimate_speed(&track, black_box(query))));
    });
}

fn benchmark_keep(criterion: &mut Criterion) {
    let policy = DecimationPolicy::Adaptive(AdaptiveDistance {
        min_distance: 2.0,
        min_speed: 5.0,
        max_distance: 20.0,
        max_speed: 60.0,
    });

    let mut group = criterion.benchmark_group("keep");
    for history_len in [100_usize, 1_000, 10_000] {
        let mut history = DecimationState::new();
        for index in 0..history_len {
            history.push(Waypoint::new(None, index as f64 * 0.0001, 0.0));
        }
        // Beyond the end of the history, so every entry is scanned.
        let candidate = Waypoint::new(None, history_len as f64 * 0.0001 + 0.01, 0.0);
        group.bench_with_input(
            BenchmarkId::from_parameter(history_len),
            &history,
            |bencher, history| {
                bencher.iter(|| black_box(policy.keep(history, black_box(&candidate), 10.0)));
            },
        );
    }
    group.finish();
}

fn benchmark_decode(criterion: &mut Criterion) {
    geoframes::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    criterion.bench_function("decode all frames", |bencher| {
        bencher.iter(|| {
            let mut source = VideoSource::open(SAMPLE_VIDEO).unwrap();
            let count = source.frames().unwrap().filter(Result::is_ok).count();
            black_box(count)
        });
    });
}

criterion::criterion_group!(
    benches,
    benchmark_resolve,
    benchmark_speed,
    benchmark_keep,
    benchmark_decode,
);
criterion::criterion_main!(benches);
