//! vectrace-bench: CLI tool for tracing experiments and diagnostics.
//!
//! Runs the tracing pipeline on a given image file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Checking which category and strategy an image is routed to
//! - Tuning the error tolerance and trace resolution
//! - Measuring per-stage durations to identify bottlenecks
//! - Understanding how parameter changes affect contour and segment counts
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vectrace-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=vectrace=debug` to see the pipeline's own log output.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use vectrace::diagnostics::{Clock, PipelineDiagnostics};
use vectrace::{ResampleFilter, TraceConfig};

/// Tracing parameter experimentation and diagnostics for vectrace.
///
/// Traces an image into cubic Bézier strokes and prints detailed
/// per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "vectrace-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Maximum curve deviation in output pixels.
    #[arg(long, default_value_t = TraceConfig::DEFAULT_ERROR_TOLERANCE)]
    tolerance: f64,

    /// Trace resolution (longest working axis). Defaults per image category.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    resolution: Option<u32>,

    /// Longest axis of the classification preview.
    #[arg(long, default_value_t = TraceConfig::DEFAULT_PREVIEW_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    preview_size: u32,

    /// Contours with fewer points are discarded.
    #[arg(long, default_value_t = TraceConfig::DEFAULT_MIN_CONTOUR_LENGTH, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(2..))]
    min_contour_length: usize,

    /// Resampling filter (disabled, nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    filter: Filter,

    /// Write the trace result (strokes and analysis) as JSON to this file.
    #[arg(long)]
    strokes: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full trace config as a JSON string.
    ///
    /// When provided, all other tracing parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: never resample.
    Disabled,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`ResampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: ResampleFilter) -> Filter {
    match f {
        ResampleFilter::Disabled => Filter::Disabled,
        ResampleFilter::Nearest => Filter::Nearest,
        ResampleFilter::Triangle => Filter::Triangle,
        ResampleFilter::CatmullRom => Filter::CatmullRom,
        ResampleFilter::Gaussian => Filter::Gaussian,
        ResampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`TraceConfig::DEFAULT_RESAMPLE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(TraceConfig::DEFAULT_RESAMPLE_FILTER);

/// Build a [`TraceConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<TraceConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        TraceConfig {
            error_tolerance: cli.tolerance,
            resolution: cli.resolution,
            preview_size: cli.preview_size,
            min_contour_length: cli.min_contour_length,
            resample_filter: match cli.filter {
                Filter::Disabled => ResampleFilter::Disabled,
                Filter::Nearest => ResampleFilter::Nearest,
                Filter::Triangle => ResampleFilter::Triangle,
                Filter::CatmullRom => ResampleFilter::CatmullRom,
                Filter::Gaussian => ResampleFilter::Gaussian,
                Filter::Lanczos3 => ResampleFilter::Lanczos3,
            },
            ..TraceConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match vectrace::process_with_diagnostics(&image_bytes, &config, &StdClock) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                    println!();
                    println!(
                        "Category: {}  |  Strategy: {:?}  |  Strokes: {}",
                        result.analysis.category,
                        result.strategy,
                        result.strokes.len(),
                    );
                }

                // Write strokes on the first run only.
                if run == 0
                    && let Some(ref path) = cli.strokes
                {
                    log::info!("writing {} strokes to {}", result.strokes.len(), path.display());
                    let written = serde_json::to_string_pretty(&result)
                        .map_err(|e| e.to_string())
                        .and_then(|json| {
                            std::fs::write(path, &json)
                                .map(|()| json.len())
                                .map_err(|e| e.to_string())
                        });
                    match written {
                        Ok(len) => {
                            eprintln!("Strokes written to {} ({len} bytes)", path.display());
                        }
                        Err(e) => {
                            eprintln!("Error writing strokes to {}: {e}", path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| vectrace::diagnostics::duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<12} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(28));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Decode", |d| d.decode.duration),
        ("Classify", |d| d.classify.duration),
        ("Prepare", |d| d.prepare.duration),
        ("Extract", |d| d.extract.duration),
        ("Fit", |d| d.fit.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_total: f64 = all_diagnostics
            .iter()
            .map(|d| vectrace::diagnostics::duration_ms(extractor(d)))
            .sum();
        let stage_mean = stage_total / all_diagnostics.len() as f64;
        println!("{name:<12} {stage_mean:>10.3}ms");
    }
}
