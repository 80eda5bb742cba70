use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures::future::join_all;

use detection_bridge::cancel::CancelHandle;
use detection_bridge::config::BridgeConfig;
use detection_bridge::layout::Layout;
use detection_bridge::logging::init_logger;
use detection_bridge::report::outcome_line;
use detection_bridge::{DetectionBridge, DetectionRequest, TaskKind};

#[derive(Parser)]
#[command(
    name = "detection-bridge",
    version,
    about = "Run external image detectors and relay their answers as JSON."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the detector scripts and output folders
    #[arg(short, long, conflicts_with = "config")]
    root: Option<PathBuf>,

    /// Detector timeout in seconds, 0 waits forever (overrides config)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log every spawn and exit
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run one detection per image, concurrently, printing one JSON line each
    Detect {
        #[arg(value_enum)]
        task: TaskKind,

        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Create the processed/ and results/ directories
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = match (&cli.config, &cli.root) {
        (Some(path), _) => BridgeConfig::from_toml(path)?,
        (None, Some(root)) => BridgeConfig::with_root(root),
        (None, None) => BridgeConfig::with_root("."),
    };
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }

    match cli.command {
        Command::Init => {
            let layout = Layout::from_config(&config);
            layout.bootstrap()?;
            tracing::info!(
                processed = %layout.processed_dir().display(),
                results = %layout.results_dir().display(),
                "layout ready"
            );
            Ok(())
        }
        Command::Detect { task, images } => run_detect(&config, task, images).await,
    }
}

async fn run_detect(
    config: &BridgeConfig,
    task: TaskKind,
    images: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let bridge = DetectionBridge::new(config)?;

    let requests: Vec<_> = images
        .into_iter()
        .map(|image| DetectionRequest::new(task, image))
        .collect();

    // Ctrl+C cancels every in-flight detection; each still reports its outcome
    let handle = CancelHandle::new();
    let signals: Vec<_> = requests.iter().map(|_| handle.signal()).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let outcomes = join_all(
        requests
            .iter()
            .zip(signals)
            .map(|(request, signal)| bridge.detect_with_cancel(request, signal)),
    )
    .await;

    let mut failed = 0;
    for (request, outcome) in requests.iter().zip(outcomes) {
        if let Err(e) = &outcome {
            failed += 1;
            tracing::error!(
                image = %request.image_path.display(),
                error = %e,
                "detection failed"
            );
        }
        println!("{}", outcome_line(request, &outcome));
    }

    if failed > 0 {
        anyhow::bail!("{} of {} detections failed", failed, requests.len());
    }
    Ok(())
}
