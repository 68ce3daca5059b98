//! Batch runner: one manifest in, one image file per page out.

use crate::assembler::PageAssembler;
use crate::client::HttpClient;
use crate::config::AssemblyConfig;
use crate::manifest::{self, ManifestError};
use crate::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// How one page of the batch ended up.
#[derive(Debug)]
pub enum PageStatus {
    /// Every tile accounted for (or the whole image was served directly).
    Saved { path: PathBuf },
    /// Saved best-effort with some tile regions left blank.
    Partial { path: PathBuf, failed_tiles: usize },
    /// The page could not be assembled or written at all.
    Failed { error: String },
}

/// Outcome record for one page.
#[derive(Debug)]
pub struct PageOutcome {
    pub label: String,
    pub status: PageStatus,
}

/// Summary of a whole manifest run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// The manifest's label, when it carries one.
    pub manifest_label: Option<String>,
    /// Per-page outcomes, in presentation order.
    pub pages: Vec<PageOutcome>,
}

impl DownloadReport {
    /// Pages saved with blank regions.
    pub fn partial_pages(&self) -> impl Iterator<Item = &PageOutcome> {
        self.pages
            .iter()
            .filter(|p| matches!(p.status, PageStatus::Partial { .. }))
    }

    /// Pages that produced no file at all.
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageOutcome> {
        self.pages
            .iter()
            .filter(|p| matches!(p.status, PageStatus::Failed { .. }))
    }

    /// True when every page was saved without blank regions.
    pub fn is_clean(&self) -> bool {
        self.pages
            .iter()
            .all(|p| matches!(p.status, PageStatus::Saved { .. }))
    }
}

/// Downloads every page of a manifest into a destination directory.
///
/// Pages are processed strictly one at a time; each page gets its own
/// canvas and worker pool inside the assembler, so nothing is shared
/// across pages but the HTTP connection pool.
pub struct ManifestDownloader<C: HttpClient> {
    client: Arc<C>,
    assembler: PageAssembler<C>,
    destination: PathBuf,
    include_label: bool,
}

impl<C: HttpClient + 'static> ManifestDownloader<C> {
    /// Creates a downloader writing into `destination`.
    pub fn new(client: Arc<C>, config: AssemblyConfig, destination: impl Into<PathBuf>) -> Self {
        Self {
            assembler: PageAssembler::new(Arc::clone(&client), config),
            client,
            destination: destination.into(),
            include_label: false,
        }
    }

    /// Prefix every output filename with the manifest's label.
    pub fn with_label_prefix(mut self, include_label: bool) -> Self {
        self.include_label = include_label;
        self
    }

    /// Fetches the manifest at `url` and downloads all of its pages.
    ///
    /// A manifest that cannot be retrieved or interpreted aborts the run.
    /// Page-level failures do not: the page is recorded in the report and
    /// the batch continues.
    pub async fn run(&self, url: &str) -> Result<DownloadReport, ManifestError> {
        self.run_with_cancel(url, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), with cooperative cancellation.
    ///
    /// On cancellation the current page drains its in-flight tile fetches
    /// and remaining pages are not started.
    #[instrument(skip(self, cancel))]
    pub async fn run_with_cancel(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<DownloadReport, ManifestError> {
        let document = manifest::fetch_manifest(self.client.as_ref(), url).await?;

        info!(
            manifest = document.label.as_deref().unwrap_or("<unlabeled>"),
            pages = document.pages.len(),
            destination = %self.destination.display(),
            "manifest loaded"
        );

        let prefix = match (self.include_label, &document.label) {
            (true, Some(label)) => format!("{} ", label),
            _ => String::new(),
        };

        let mut report = DownloadReport {
            manifest_label: document.label.clone(),
            pages: Vec::with_capacity(document.pages.len()),
        };

        for page in &document.pages {
            if cancel.is_cancelled() {
                info!(label = %page.output_label, "run cancelled, skipping remaining pages");
                break;
            }

            let label = format!("{}{}", prefix, page.output_label);
            info!(label = %label, width = page.width, height = page.height, "downloading page");

            let assembled = match self.assembler.assemble_with_cancel(page, cancel.clone()).await
            {
                Ok(assembled) => assembled,
                Err(e) => {
                    error!(label = %label, error = %e, "page assembly failed");
                    report.pages.push(PageOutcome {
                        label,
                        status: PageStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let status =
                match storage::save_page(&self.destination, &label, page.extension(), &assembled) {
                    Ok(path) if assembled.is_complete() => PageStatus::Saved { path },
                    Ok(path) => {
                        warn!(
                            label = %label,
                            failed_tiles = assembled.report.failure_count(),
                            "page saved with blank regions"
                        );
                        PageStatus::Partial {
                            path,
                            failed_tiles: assembled.report.failure_count(),
                        }
                    }
                    Err(e) => {
                        error!(label = %label, error = %e, "failed to save page");
                        PageStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };

            report.pages.push(PageOutcome { label, status });
        }

        Ok(report)
    }

    /// The directory pages are written into.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}
