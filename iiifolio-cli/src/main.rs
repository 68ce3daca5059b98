//! iiifolio CLI - download IIIF manifests as page images.

mod error;

use clap::Parser;
use error::CliError;
use iiifolio::client::ReqwestClient;
use iiifolio::config::AssemblyConfig;
use iiifolio::downloader::{DownloadReport, ManifestDownloader, PageStatus};
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser)]
#[command(name = "iiifolio", version = iiifolio::VERSION)]
#[command(about = "Download images from a IIIF Presentation Manifest", long_about = None)]
struct Args {
    /// URL to the manifest
    url: String,

    /// Location to download images to
    #[arg(short, long, default_value = ".")]
    path: String,

    /// Prefix filenames with the manifest's label
    #[arg(long)]
    include_label: bool,

    /// Maximum number of concurrent tile fetches
    #[arg(long, default_value_t = 8)]
    parallel: usize,

    /// Retry attempts per failed tile
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Per-request network timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        e.exit();
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    iiifolio::logging::init_logging().map_err(|e| CliError::LoggingInit(e.to_string()))?;

    fs::create_dir_all(&args.path).map_err(|error| CliError::Destination {
        path: args.path.clone(),
        error,
    })?;

    let client =
        Arc::new(ReqwestClient::with_timeout(args.timeout).map_err(CliError::Client)?);

    let config = AssemblyConfig::new()
        .with_parallel_fetches(args.parallel)
        .with_max_retries(args.retries)
        .with_request_timeout_secs(args.timeout);

    let downloader = ManifestDownloader::new(client, config, &args.path)
        .with_label_prefix(args.include_label);

    // Let the current page drain its in-flight fetches on Ctrl-C instead of
    // leaving a torn canvas behind.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight tile fetches");
            signal_token.cancel();
        }
    });

    let report = downloader.run_with_cancel(&args.url, cancel).await?;
    print_summary(&report, &args.path);

    Ok(())
}

fn print_summary(report: &DownloadReport, path: &str) {
    let saved = report
        .pages
        .iter()
        .filter(|p| !matches!(p.status, PageStatus::Failed { .. }))
        .count();

    println!(
        "Downloaded {} of {} pages of manifest \"{}\" to {}.",
        saved,
        report.pages.len(),
        report.manifest_label.as_deref().unwrap_or("<unlabeled>"),
        path
    );

    for page in report.partial_pages() {
        if let PageStatus::Partial { failed_tiles, .. } = page.status {
            println!(
                "  {}: saved with {} blank tile region(s)",
                page.label, failed_tiles
            );
        }
    }

    for page in report.failed_pages() {
        if let PageStatus::Failed { error } = &page.status {
            println!("  {}: FAILED ({})", page.label, error);
        }
    }
}
