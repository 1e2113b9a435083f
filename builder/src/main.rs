mod acquire;
mod cleanup;
mod filter;
mod storage;
mod timelapse;
mod workflow;

use clap::Parser;
use filter::gray::GrayFrameFilter;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use timelapse::encoder::FfmpegBackend;
use timelapse::Outcome;
use timelapse_common::config::{Config, LoggingConfig};
use timelapse_common::date::date_ago;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use workflow::Workflow;

/// Build yesterday's timelapse for each configured camera.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of days ago to retrieve images for.
    #[arg(long, default_value_t = 1)]
    ago: u32,

    /// Only process the camera with this name.
    #[arg(long)]
    camera: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to open log file: {e}");
        std::process::exit(1);
    }

    let date = date_ago(args.ago);
    let timelapse = &config.timelapse;
    info!(
        date,
        cameras = config.cameras.len(),
        fps = timelapse.fps,
        gray_threshold = timelapse.gray_threshold,
        codec = timelapse.codec,
        work_dir = %config.work_dir.display(),
        "starting timelapse builder"
    );

    let cameras: Vec<_> = match &args.camera {
        Some(name) => match config.camera(name) {
            Some(camera) => vec![camera],
            None => {
                error!(camera = name, "camera not found in config");
                std::process::exit(1);
            }
        },
        None => config.cameras.iter().collect(),
    };

    // Check ffmpeg availability (encoding will fail without it).
    timelapse::encoder::check_ffmpeg_available().await;

    let storage = match &config.storage {
        Some(storage_config) if cameras.iter().any(|c| !c.skip_upload) => {
            Some(storage::VideoStorage::new(storage_config).await)
        }
        _ => None,
    };

    let filter = GrayFrameFilter::new(timelapse.gray_threshold, timelapse.roi);
    let backend = FfmpegBackend::new(&timelapse.codec, timelapse.crf, &timelapse.preset);
    let workflow = Workflow::new(&config, &filter, &backend, storage.as_ref());

    let mut failures = 0;
    for camera in cameras {
        match workflow.run_camera(camera, &date).await {
            Ok(report) => {
                let frames = match &report.outcome {
                    Outcome::Produced { frames, .. } => *frames,
                    Outcome::NothingProduced(_) => 0,
                };
                info!(
                    camera = camera.name,
                    copied = report.copied,
                    frames,
                    uploaded = report.uploaded_key.as_deref().unwrap_or("-"),
                    cleaned_up = report.cleanup.is_some(),
                    "camera done"
                );
            }
            Err(e) => {
                failures += 1;
                error!(camera = camera.name, error = %e, "camera failed");
            }
        }
    }

    if failures > 0 {
        error!(failures, "finished with errors");
        std::process::exit(1);
    }
    info!("all cameras done");
}

/// Log to stdout, and to `logging.file` as well when one is configured.
/// `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) -> std::io::Result<()> {
    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| logging.level.parse().unwrap_or_default()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
