//! tessera: turn an image into a low-poly mosaic from the command line.
//!
//! Runs the pipeline with per-stage diagnostics, then optionally plays the
//! build-up animation against a synthetic frame clock, writing the final
//! frame, every frame, or an SVG of the mosaic.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin tessera -- [OPTIONS] <IMAGE>
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tessera_animate::{Host, TimelineConfig};
use tessera_export::{Canvas, SvgMetadata};
use tessera_pipeline::diagnostics::{Clock, process_staged_with_diagnostics};
use tessera_pipeline::{PipelineConfig, StagedResult};
use tracing_subscriber::EnvFilter;

/// Convert an image into an animated low-polygon mosaic.
#[derive(Parser)]
#[command(name = "tessera", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Detail level, 0 (coarse) to 100 (fine).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_QUALITY)]
    quality: f64,

    /// Animation speed multiplier.
    #[arg(long, default_value_t = TimelineConfig::DEFAULT_SPEED)]
    speed: f64,

    /// Seed for point jitter. Derived from the image when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Frames per second of the synthetic animation clock.
    #[arg(long, default_value_t = 30, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    fps: u32,

    /// Write the final animation frame as PNG.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the mosaic as SVG.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write every animation frame as a numbered PNG into this directory.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--quality` and `--seed` are ignored.
    #[arg(long)]
    config_json: Option<String>,
}

fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(PipelineConfig {
        quality: cli.quality,
        seed: cli.seed,
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };
    eprintln!("Image: {} ({} bytes)", cli.image.display(), image_bytes.len());

    let (staged, diagnostics) =
        match process_staged_with_diagnostics(&image_bytes, &config, &StdClock) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

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
    }

    if let Some(ref svg_path) = cli.svg
        && let Err(msg) = write_svg(&cli, svg_path, &staged, &config)
    {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    if (cli.output.is_some() || cli.frames_dir.is_some())
        && let Err(msg) = animate(&cli, staged, config)
    {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn write_svg(
    cli: &Cli,
    path: &Path,
    staged: &StagedResult,
    config: &PipelineConfig,
) -> Result<(), String> {
    let title = cli
        .image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tessera");
    let description = format!(
        "quality {}, {} triangles, seed {}",
        config.quality,
        staged.triangles.len(),
        staged.seed
    );
    let config_json = serde_json::to_string(config).ok();
    let metadata = SvgMetadata {
        title: Some(title),
        description: Some(&description),
        config_json: config_json.as_deref(),
    };
    let svg = tessera_export::to_svg(&staged.triangles, staged.dimensions, &metadata);
    std::fs::write(path, &svg).map_err(|e| format!("Error writing SVG to {}: {e}", path.display()))?;
    eprintln!("SVG written to {} ({} bytes)", path.display(), svg.len());
    Ok(())
}

/// Play the animation of the already processed `staged` result at `--fps`
/// and write the requested frames.
fn animate(cli: &Cli, staged: StagedResult, config: PipelineConfig) -> Result<(), String> {
    let timeline = TimelineConfig {
        speed: cli.speed,
        ..TimelineConfig::default()
    };
    let mut host = Host::new();
    let token = host
        .present(Some(Canvas::new()), config, staged, &timeline)
        .map_err(|e| format!("Cannot start animation: {e}"))?;
    tracing::info!(status = %host.status(), "animation ready");

    if let Some(ref dir) = cli.frames_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    }

    let frame_interval = Duration::from_secs(1) / cli.fps;
    let mut now = Duration::ZERO;
    let mut index = 0_u32;
    loop {
        let frame = host
            .tick(token, now)
            .ok_or_else(|| "Animation run was cancelled".to_string())?;
        for phase in &frame.entered {
            tracing::info!(%phase, "status");
        }
        if let Some(ref dir) = cli.frames_dir {
            let path = dir.join(format!("frame_{index:05}.png"));
            write_canvas(&host, &path)?;
        }
        if !frame.request_next {
            break;
        }
        now += frame_interval;
        index += 1;
    }
    eprintln!("Animation: {} frames at {} fps", index + 1, cli.fps);

    if let Some(ref path) = cli.output {
        write_canvas(&host, path)?;
        eprintln!("Final frame written to {}", path.display());
    }
    Ok(())
}

fn write_canvas(host: &Host<Canvas>, path: &Path) -> Result<(), String> {
    let session = host
        .session()
        .ok_or_else(|| "No animation session".to_string())?;
    let png = tessera_export::encode_png(session.surface())
        .map_err(|e| format!("Error encoding {}: {e}", path.display()))?;
    std::fs::write(path, png).map_err(|e| format!("Error writing {}: {e}", path.display()))
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
