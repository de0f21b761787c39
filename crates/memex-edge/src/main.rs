//! Memex Edge
//!
//! Runs the capture loop on a user's laptop and syncs captured records to
//! the central multi-tenant server.

mod capture;
mod config;
mod ocr;
mod sync_client;

use capture::{CaptureLoop, CaptureLoopConfig, NullScreenCapture};
use clap::{Parser, Subcommand};
use config::EdgeConfig;
use memex_core::RecordStore;
use ocr::{OcrBackend, TesseractOcr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sync_client::SyncClient;

const EXIT_OK: i32 = 0;
const EXIT_USER_ERROR: i32 = 1;
const EXIT_INTERNAL_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "memex-edge")]
#[command(about = "Captures screenshots, runs OCR, and syncs records to a Memex server", long_about = None)]
struct Cli {
    /// Path to the instance config file (§4.14).
    #[arg(long, env = "MEMEX_INSTANCE_CONFIG", default_value = "~/.memex/instance.json")]
    instance_config: String,

    /// Directory holding local OCR records and screenshots.
    #[arg(long, env = "MEMEX_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture loop in the foreground.
    Capture {
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        #[arg(long, default_value_t = 4)]
        max_concurrent_ocr: usize,
    },
    /// Sync local records to the central server.
    Sync {
        #[arg(long, env = "MEMEX_SYNC_TOKEN")]
        token: String,
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "memex_edge=info".into()))
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => EXIT_OK,
        Err(EdgeError::User(msg)) => {
            eprintln!("error: {msg}");
            EXIT_USER_ERROR
        }
        Err(EdgeError::Internal(msg)) => {
            eprintln!("internal error: {msg}");
            EXIT_INTERNAL_ERROR
        }
    };
    std::process::exit(code);
}

enum EdgeError {
    User(String),
    Internal(String),
}

async fn run(cli: Cli) -> Result<(), EdgeError> {
    let config_path = expand_home(&cli.instance_config);

    match cli.command {
        Commands::Capture { interval_secs, max_concurrent_ocr } => {
            let ocr: Arc<dyn OcrBackend> = match TesseractOcr::detect().await {
                Ok(backend) => Arc::new(backend),
                Err(e) => return Err(EdgeError::Internal(format!("no OCR backend available: {e}"))),
            };

            let store = Arc::new(RecordStore::new(cli.data_dir.join("ocr")));
            let capture_config = CaptureLoopConfig {
                capture_interval: Duration::from_secs(interval_secs),
                images_dir: cli.data_dir.join("images"),
                max_concurrent_ocr,
            };
            let capture = CaptureLoop::new(capture_config, Arc::new(NullScreenCapture), ocr, store, None);
            let shutdown = capture.shutdown_handle();

            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
            });

            tracing::info!("capture loop starting (interval={interval_secs}s)");
            capture.run().await;
            Ok(())
        }
        Commands::Sync { token, batch_size, dry_run } => {
            let config = EdgeConfig::load(&config_path)
                .map_err(|e| EdgeError::User(format!("failed to load instance config at {}: {e}", config_path.display())))?;

            let store = RecordStore::new(cli.data_dir.join("ocr"));
            let client = SyncClient::new(config.server_base_url(), config.instance_name.clone(), token, dry_run).with_batch_size(batch_size);

            let report = client.run(&store).await.map_err(|e| EdgeError::Internal(e.to_string()))?;
            println!("synced {} record(s), {} error(s)", report.synced, report.errors);
            if report.errors > 0 {
                return Err(EdgeError::Internal(format!("{} document(s) failed to sync", report.errors)));
            }
            Ok(())
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
