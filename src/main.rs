use anyhow::Result;
use clap::Parser;
use media_ingest::controller::{CycleOutcome, IngestionController};
use media_ingest::mime::mime_from_extension;
use media_ingest::models::{Config, MediaFile};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "media-ingest")]
#[command(about = "Validate a media file and publish it to IPFS")]
struct CliArgs {
    /// Image or video to ingest.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// MIME type to report for the file; defaults to one derived from the extension.
    #[arg(long, value_name = "TYPE")]
    mime_type: Option<String>,

    /// For videos, publish this thumbnail candidate instead of the first.
    #[arg(long, value_name = "INDEX")]
    thumbnail: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let controller = match Config::from_env().and_then(|c| IngestionController::from_config(&c)) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    let mime_type = args
        .mime_type
        .clone()
        .unwrap_or_else(|| mime_from_extension(&args.file).to_string());
    let file = match MediaFile::from_path(&args.file, &mime_type).await {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("Could not read {}: {}", args.file.display(), e);
            None
        }
    };

    info!("Ingesting {} as {}", args.file.display(), mime_type);
    let outcome = controller.submit(file).await;

    if let (CycleOutcome::Complete, Some(index)) = (&outcome, args.thumbnail) {
        let candidates = controller.asset().thumbnail_candidates.len();
        if index < candidates {
            controller.choose_thumbnail(index).await;
        } else {
            warn!(
                "Thumbnail index {} ignored: {} candidates available",
                index, candidates
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);

    match outcome {
        CycleOutcome::Complete => {
            info!("Ingestion completed successfully");
            Ok(())
        }
        other => {
            error!("Ingestion did not complete: {:?}", other);
            std::process::exit(1);
        }
    }
}
