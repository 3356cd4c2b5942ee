use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use geoframes::{
    AdaptiveDistance, CameraProfile, DecimationPolicy, FfmpegLogLevel, FramePipeline,
    GeoframesError, JpegWriter, PipelineOptions, ProgressCallback, ProgressInfo, Track,
    VideoSource, YawReprojection,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  geoframes run ride.insv --yaw 90\n  geoframes run ride.insv --adaptive-distance 2 5 20 60 --verbose\n  geoframes track ride.gpx --json\n  geoframes completions zsh > _geoframes";

#[derive(Debug, Parser)]
#[command(
    name = "geoframes",
    version,
    about = "Turn 360° recordings and their GPS track into geotagged still frames",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true, default_value = "error")]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Select, reproject, write, and tag frames from a recording.
    #[command(
        about = "Extract geotagged frames",
        after_help = "Examples:\n  geoframes run ride.insv\n  geoframes run ride.insv --video ride_stitched.mp4 --out frames --yaw -45 --min-distance 3"
    )]
    Run {
        /// Camera recording carrying the GPS telemetry.
        input: PathBuf,
        /// Output directory (default: input path without extension).
        ///
        /// The GPS track is cached next to the input as `<INPUT>.gpx`, not
        /// here, and an existing file is reused on later runs.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Equirectangular video to decode (default: input with `.mp4` extension).
        #[arg(long)]
        video: Option<PathBuf>,
        /// Yaw correction in degrees.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        yaw: f64,
        /// Fixed minimum distance between kept frames, in meters.
        #[arg(long, conflicts_with = "adaptive_distance")]
        min_distance: Option<f64>,
        /// Speed-adaptive spacing: D_MIN (m) at V_MIN (mph) up to D_MAX (m) at V_MAX (mph).
        #[arg(
            long,
            num_args = 4,
            value_names = ["D_MIN", "V_MIN", "D_MAX", "V_MAX"]
        )]
        adaptive_distance: Option<Vec<f64>>,
        /// Seconds added to the recording's start time.
        #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
        start_offset: f64,
        /// JPEG quality (1-100).
        #[arg(long, default_value_t = geoframes::DEFAULT_JPEG_QUALITY)]
        quality: u8,
        /// Do not write time and GPS tags into the frames.
        #[arg(long)]
        skip_metadata: bool,
    },

    /// Summarize a GPX track.
    #[command(
        about = "Print a GPS track summary",
        after_help = "Examples:\n  geoframes track ride.gpx\n  geoframes track ride.gpx --json"
    )]
    Track {
        /// GPX file.
        gpx: PathBuf,
        /// Output the summary as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn decimation_policy(
    min_distance: Option<f64>,
    adaptive_distance: Option<&[f64]>,
) -> Result<DecimationPolicy, GeoframesError> {
    match adaptive_distance {
        Some(&[min_distance, min_speed, max_distance, max_speed]) => {
            Ok(DecimationPolicy::Adaptive(AdaptiveDistance {
                min_distance,
                min_speed,
                max_distance,
                max_speed,
            }))
        }
        Some(values) => Err(GeoframesError::Configuration(format!(
            "--adaptive-distance takes 4 values, got {}",
            values.len()
        ))),
        None => Ok(DecimationPolicy::Fixed(min_distance.unwrap_or(5.0))),
    }
}

fn warn(message: String) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

struct TerminalProgress {
    spinner: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, GeoframesError> {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map_err(|error| GeoframesError::Configuration(error.to_string()))?;
        spinner.set_style(style);
        Ok(Self { spinner })
    }

    fn start(&self) {
        self.spinner.enable_steady_tick(Duration::from_millis(120));
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let position = info
            .current_timestamp
            .map(|timestamp| format!("{:.1}s", timestamp.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        self.spinner.set_message(format!(
            "{position} | {} frames, {} kept, {} discarded, {} no GPS | {:.2} frames/s | {:.1} mph | {:.1}x",
            info.frames,
            info.kept,
            info.discarded,
            info.uncovered,
            info.effective_rate,
            info.ground_speed_mph,
            info.throughput,
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn run_command(
    input: &Path,
    out: Option<PathBuf>,
    video: Option<PathBuf>,
    yaw: f64,
    min_distance: Option<f64>,
    adaptive_distance: Option<Vec<f64>>,
    start_offset_seconds: f64,
    quality: u8,
    skip_metadata: bool,
) -> Result<(), GeoframesError> {
    let out = out.unwrap_or_else(|| input.with_extension(""));
    let video = video.unwrap_or_else(|| input.with_extension("mp4"));
    let gpx_path = input.with_extension("gpx");

    let decimation = decimation_policy(min_distance, adaptive_distance.as_deref())?;
    let progress = Arc::new(TerminalProgress::new()?);
    let options = PipelineOptions::new(&out)
        .with_yaw(yaw)
        .with_decimation(decimation)
        .with_jpeg_quality(quality)
        .with_progress(progress.clone());
    options.validate()?;

    if out.exists() {
        warn(format!(
            "output directory {} already exists, frames will be overwritten",
            out.display()
        ));
    }
    fs::create_dir_all(&out)?;

    geoframes::extract_gpx(input, &gpx_path)?;
    let track = geoframes::load_gpx(&gpx_path)?;
    let start_time =
        geoframes::shift_start_time(geoframes::resolve_start_time(input)?, start_offset_seconds)?;
    log::info!("Recording starts at {start_time}, decimation {decimation}");

    let mut source = VideoSource::open(&video)?;
    let info = source.info().clone();
    log::info!(
        "Decoding {}: {}x{} @ {:.2} fps, ~{} frames",
        video.display(),
        info.width,
        info.height,
        info.frames_per_second,
        info.frame_count,
    );

    let mut pipeline = FramePipeline::new(&track, start_time, &options, YawReprojection)?;
    let mut writer = JpegWriter::new(options.jpeg_quality());
    progress.start();
    let outcome = pipeline.run(source.frames()?, &mut writer);
    progress.finish();
    let records = outcome?;

    if skip_metadata {
        log::info!("Skipping metadata");
    } else {
        geoframes::apply_metadata(&records, &out, &CameraProfile::default())?;
    }

    let counts = pipeline.counts();
    let duration = info.duration.as_secs_f64();
    println!(
        "{} {} of {} frames kept in {}",
        "done:".green().bold(),
        counts.kept,
        counts.frames,
        out.display()
    );
    println!(
        "  discarded {}, without GPS coverage {}",
        counts.discarded, counts.uncovered
    );
    if duration > 0.0 {
        println!(
            "  effective rate {:.2} frames/s over {:.1}s of video",
            counts.kept as f64 / duration,
            duration
        );
    }
    if counts.frames > 0 && counts.uncovered == counts.frames {
        warn(format!(
            "no frame matched the GPS track, check the start time or run `geoframes track {}`",
            gpx_path.display()
        ));
    }
    Ok(())
}

fn print_track(track: &Track, json: bool) -> Result<(), GeoframesError> {
    let span = track.time_span();
    if json {
        let payload = json!({
            "segments": track.segments().iter().map(|segment| json!({
                "waypoints": segment.len(),
                "start": segment.time_span().map(|(start, _)| start.to_rfc3339()),
                "end": segment.time_span().map(|(_, end)| end.to_rfc3339()),
            })).collect::<Vec<_>>(),
            "waypoints": track.waypoint_count(),
            "start": span.map(|(start, _)| start.to_rfc3339()),
            "end": span.map(|(_, end)| end.to_rfc3339()),
            "length_meters": track.length(),
        });
        let text = serde_json::to_string_pretty(&payload)
            .map_err(|error| GeoframesError::Configuration(error.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    println!("Segments: {}", track.segments().len());
    println!("Waypoints: {}", track.waypoint_count());
    match span {
        Some((start, end)) => {
            println!("Start: {start}");
            println!("End: {end}");
            println!("Duration: {}s", (end - start).num_seconds());
        }
        None => println!("Time span: {}", "none (no timed waypoints)".yellow()),
    }
    println!("Length: {:.1} m", track.length());
    for (index, segment) in track.segments().iter().enumerate() {
        match segment.time_span() {
            Some((start, end)) => println!(
                "  #{index}: {} waypoints, {start} to {end}",
                segment.len()
            ),
            None => println!("  #{index}: {} waypoints, untimed", segment.len()),
        }
    }
    Ok(())
}

fn run() -> Result<(), GeoframesError> {
    let cli = Cli::parse();

    let default_filter = if cli.global.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let level: FfmpegLogLevel = cli.global.log_level.parse()?;
    geoframes::set_ffmpeg_log_level(level);

    match cli.command {
        Commands::Run {
            input,
            out,
            video,
            yaw,
            min_distance,
            adaptive_distance,
            start_offset,
            quality,
            skip_metadata,
        } => run_command(
            &input,
            out,
            video,
            yaw,
            min_distance,
            adaptive_distance,
            start_offset,
            quality,
            skip_metadata,
        ),
        Commands::Track { gpx, json } => {
            let track = geoframes::load_gpx(&gpx)?;
            print_track(&track, json)
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "geoframes", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(error.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, decimation_policy};
    use clap::CommandFactory;
    use geoframes::DecimationPolicy;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fixed_distance_defaults_to_five_meters() {
        assert_eq!(decimation_policy(None, None).unwrap(), DecimationPolicy::Fixed(5.0));
        assert_eq!(
            decimation_policy(Some(3.0), None).unwrap(),
            DecimationPolicy::Fixed(3.0)
        );
    }

    #[test]
    fn adaptive_distance_takes_four_values() {
        let policy = decimation_policy(None, Some(&[2.0, 5.0, 20.0, 60.0])).unwrap();
        assert!(matches!(policy, DecimationPolicy::Adaptive(_)));
        assert!(decimation_policy(None, Some(&[2.0, 5.0])).is_err());
    }

    #[test]
    fn out_help_names_the_cached_track() {
        let command = Cli::command();
        let run = command.find_subcommand("run").unwrap();
        let out = run
            .get_arguments()
            .find(|argument| argument.get_id() == "out")
            .unwrap();
        let help = out.get_long_help().or(out.get_help()).unwrap().to_string();
        assert!(help.contains("<INPUT>.gpx"), "{help}");
    }
}
