//! Concurrent tile dispatch and page compositing.
//!
//! [`PageAssembler`] turns one [`PageDescriptor`] into one full-page pixel
//! buffer. It first probes the page's whole-image URL; servers that permit
//! single-shot retrieval short-circuit the tiled path entirely. Otherwise
//! it plans a tile grid from the service's `info.json`, fans the fetches
//! out over a bounded number of concurrent tasks, and pastes results into
//! the page canvas as they complete, in arbitrary order.
//!
//! Individual tile failures are tolerated: the region stays at the canvas
//! fill and the page is still produced, with the failures recorded in the
//! page's [`TileReport`]. The canvas is only handed back after every
//! dispatched task has reached a terminal state.

mod report;

pub use report::{TileFailure, TileReport};

use crate::client::HttpClient;
use crate::config::AssemblyConfig;
use crate::grid::{self, TileSpec};
use crate::iiif::{ImageService, InfoError};
use crate::manifest::PageDescriptor;
use image::{imageops, ImageReader, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Errors that prevent a page from being assembled at all.
///
/// These are page-granular: the batch runner records them and moves on to
/// the next page.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The whole-image probe was unusable and `info.json` could not be
    /// retrieved or parsed.
    #[error(transparent)]
    Info(#[from] InfoError),

    /// The image service advertises no tiling, and the whole-image probe
    /// did not return the page at full resolution.
    #[error("image service {service_url} advertises no tiles and the full image was unavailable")]
    NoTiling { service_url: String },

    /// Assembly was cancelled before any tile was dispatched.
    #[error("assembly cancelled")]
    Cancelled,
}

/// A fully assembled page.
#[derive(Debug)]
pub enum PageImage {
    /// Raw response bytes from the whole-image fast path, preserved
    /// verbatim so no re-encode is involved.
    Full(Vec<u8>),
    /// Canvas composed from individual tiles.
    Composite(RgbImage),
}

/// The result of assembling one page: its pixels plus the tile ledger.
#[derive(Debug)]
pub struct AssembledPage {
    pub image: PageImage,
    pub report: TileReport,
}

impl AssembledPage {
    /// True when no tile region was left blank.
    pub fn is_complete(&self) -> bool {
        self.report.is_complete()
    }
}

/// Assembles pages by concurrent tile retrieval.
///
/// One assembler may be reused across the pages of a manifest; each
/// `assemble` call allocates its own canvas and worker pool, so pages
/// share nothing but the HTTP client's connection pool.
pub struct PageAssembler<C: HttpClient> {
    client: Arc<C>,
    config: AssemblyConfig,
}

impl<C: HttpClient + 'static> PageAssembler<C> {
    /// Creates an assembler over the given HTTP client.
    pub fn new(client: Arc<C>, config: AssemblyConfig) -> Self {
        Self { client, config }
    }

    /// Assembles one page, blocking until every dispatched tile task has
    /// reached a terminal state.
    pub async fn assemble(&self, page: &PageDescriptor) -> Result<AssembledPage, AssemblyError> {
        self.assemble_with_cancel(page, CancellationToken::new())
            .await
    }

    /// Assembles one page with cooperative cancellation.
    ///
    /// When `cancel` fires, tiles that have not yet started are abandoned,
    /// but in-flight fetches drain and their results are still pasted, so
    /// the returned canvas is never half-written by a killed task.
    #[instrument(skip(self, page, cancel), fields(label = %page.output_label))]
    pub async fn assemble_with_cancel(
        &self,
        page: &PageDescriptor,
        cancel: CancellationToken,
    ) -> Result<AssembledPage, AssemblyError> {
        if cancel.is_cancelled() {
            return Err(AssemblyError::Cancelled);
        }

        // Fast path: some servers serve the entire page in one request.
        if let Some(bytes) = self.probe_full_image(page).await {
            info!(label = %page.output_label, "whole image served directly");
            return Ok(AssembledPage {
                image: PageImage::Full(bytes),
                report: TileReport::fast_path(),
            });
        }

        let service = Arc::new(ImageService::new(
            Arc::clone(&self.client),
            page.tile_service_url.clone(),
        ));

        let image_info = service.fetch_info().await?;
        let unit = image_info.tile_unit().ok_or_else(|| AssemblyError::NoTiling {
            service_url: page.tile_service_url.clone(),
        })?;

        let specs = grid::plan(page.width, page.height, unit.width, unit.height);
        debug!(
            label = %page.output_label,
            tiles = specs.len(),
            tile_width = unit.width,
            tile_height = unit.height,
            "planned tile grid"
        );

        let mut canvas = RgbImage::new(page.width, page.height);
        let mut report = TileReport::tiled(specs.len());

        let semaphore = Arc::new(Semaphore::new(self.config.parallel_fetches()));
        let extension = page.extension();
        let max_retries = self.config.max_retries();

        let mut tasks: JoinSet<Result<(TileSpec, RgbImage), TileFailure>> = JoinSet::new();
        for spec in specs {
            let service = Arc::clone(&service);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                fetch_tile_task(service, semaphore, cancel, spec, extension, max_retries).await
            });
        }

        // Single consumer: pastes are serialized here, in completion order.
        // Ordering is irrelevant because planned regions are disjoint.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((spec, tile))) => {
                    paste_tile(&mut canvas, &spec, &tile);
                    report.add_pasted();
                }
                Ok(Err(failure)) => {
                    warn!(
                        label = %page.output_label,
                        x = failure.spec.x,
                        y = failure.spec.y,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "tile failed, leaving region blank"
                    );
                    report.add_failure(failure);
                }
                Err(join_err) => {
                    warn!(label = %page.output_label, error = %join_err, "tile task panicked");
                }
            }
        }

        info!(
            label = %page.output_label,
            pasted = report.pasted_count(),
            failed = report.failure_count(),
            "page assembly complete"
        );

        Ok(AssembledPage {
            image: PageImage::Composite(canvas),
            report,
        })
    }

    /// Probes the whole-image URL and returns its bytes when the server
    /// delivered the page at full declared width.
    ///
    /// Any failure here falls back to the tiled path rather than aborting.
    async fn probe_full_image(&self, page: &PageDescriptor) -> Option<Vec<u8>> {
        let bytes = match self.client.get(&page.full_image_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(url = %page.full_image_url, error = %e, "whole-image probe failed");
                return None;
            }
        };

        // Header-only dimension read; the bytes are saved verbatim later.
        let dimensions = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions();

        match dimensions {
            Ok((width, _)) if width == page.width => Some(bytes),
            Ok((width, _)) => {
                debug!(
                    url = %page.full_image_url,
                    served = width,
                    declared = page.width,
                    "server returned reduced image, using tiles"
                );
                None
            }
            Err(e) => {
                debug!(url = %page.full_image_url, error = %e, "probe response not decodable");
                None
            }
        }
    }
}

/// One tile task: wait for a permit, fetch with local retries, hand the
/// decoded buffer back to the compositor.
async fn fetch_tile_task<C: HttpClient>(
    service: Arc<ImageService<C>>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    spec: TileSpec,
    extension: &'static str,
    max_retries: u32,
) -> Result<(TileSpec, RgbImage), TileFailure> {
    // Tiles still queued behind the concurrency limit are abandoned on
    // cancellation; once a permit is held the fetch runs to completion.
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(TileFailure {
                spec,
                attempts: 0,
                error: "cancelled before fetch".to_string(),
            });
        }
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                return Err(TileFailure {
                    spec,
                    attempts: 0,
                    error: "worker pool closed".to_string(),
                });
            }
        },
    };

    let mut attempts = 0;
    loop {
        attempts += 1;
        match service.fetch_tile(&spec, extension).await {
            Ok(tile) => return Ok((spec, tile)),
            Err(e) if attempts <= max_retries && !cancel.is_cancelled() => {
                debug!(
                    x = spec.x,
                    y = spec.y,
                    attempt = attempts,
                    error = %e,
                    "tile fetch failed, retrying"
                );
            }
            Err(e) => {
                return Err(TileFailure {
                    spec,
                    attempts,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Pastes one decoded tile into the canvas at its planned offset.
///
/// A tile larger than its planned region (a misbehaving server) is cropped
/// so it cannot bleed into neighboring regions.
fn paste_tile(canvas: &mut RgbImage, spec: &TileSpec, tile: &RgbImage) {
    if tile.width() > spec.width || tile.height() > spec.height {
        warn!(
            x = spec.x,
            y = spec.y,
            expected_width = spec.width,
            expected_height = spec.height,
            got_width = tile.width(),
            got_height = tile.height(),
            "tile larger than its region, cropping"
        );
        let cropped = imageops::crop_imm(tile, 0, 0, spec.width, spec.height).to_image();
        imageops::replace(canvas, &cropped, i64::from(spec.x), i64::from(spec.y));
    } else {
        imageops::replace(canvas, tile, i64::from(spec.x), i64::from(spec.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::MockHttpClient;
    use crate::client::HttpError;
    use image::Rgb;

    const SERVICE: &str = "https://images.example.org/p1";
    const FULL_URL: &str = "https://images.example.org/p1/full/full/0/default.jpg";

    fn page(width: u32, height: u32) -> PageDescriptor {
        PageDescriptor {
            width,
            height,
            full_image_url: FULL_URL.to_string(),
            tile_service_url: SERVICE.to_string(),
            output_label: "p1".to_string(),
            media_type: Some("image/jpeg".to_string()),
        }
    }

    fn encode_png(width: u32, height: u32, color: Rgb<u8>) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, color);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png)
            .expect("failed to encode PNG");
        buffer.into_inner()
    }

    fn tile_url(spec: &TileSpec) -> String {
        format!(
            "{SERVICE}/{x},{y},{w},{h}/{w},/0/default.jpg",
            x = spec.x,
            y = spec.y,
            w = spec.width,
            h = spec.height
        )
    }

    fn info_json(tile_size: u32) -> Vec<u8> {
        format!(r#"{{"width": 512, "height": 512, "tiles": [{{"width": {tile_size}}}]}}"#)
            .into_bytes()
    }

    /// Mock scripted for a 512x512 page tiled as four 256x256 quadrants.
    fn quadrant_mock() -> MockHttpClient {
        let mut mock = MockHttpClient::new(Err(HttpError::Status {
            status: 404,
            url: "unscripted".to_string(),
        }))
        .with_response(&format!("{SERVICE}/info.json"), Ok(info_json(256)));

        let colors = [
            Rgb([255, 0, 0]),
            Rgb([0, 255, 0]),
            Rgb([0, 0, 255]),
            Rgb([255, 255, 0]),
        ];
        for (i, (x, y)) in [(0, 0), (256, 0), (0, 256), (256, 256)].iter().enumerate() {
            let spec = TileSpec::new(*x, *y, 256, 256);
            mock = mock.with_response(&tile_url(&spec), Ok(encode_png(256, 256, colors[i])));
        }
        mock
    }

    #[tokio::test]
    async fn test_fast_path_short_circuits_tiling() {
        let full = encode_png(512, 512, Rgb([9, 9, 9]));
        let mock = Arc::new(
            MockHttpClient::new(Ok(vec![])).with_response(FULL_URL, Ok(full.clone())),
        );

        let assembler = PageAssembler::new(Arc::clone(&mock), AssemblyConfig::default());
        let assembled = assembler.assemble(&page(512, 512)).await.unwrap();

        assert!(assembled.report.used_fast_path());
        assert!(assembled.is_complete());
        match assembled.image {
            PageImage::Full(bytes) => assert_eq!(bytes, full),
            PageImage::Composite(_) => panic!("expected fast path"),
        }

        // Exactly one request: the probe. No info.json, no tiles.
        assert_eq!(mock.requests(), vec![FULL_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_tiled_assembly_composes_quadrants() {
        let mock = Arc::new(quadrant_mock());
        let assembler = PageAssembler::new(
            Arc::clone(&mock),
            AssemblyConfig::new().with_max_retries(0),
        );

        let assembled = assembler.assemble(&page(512, 512)).await.unwrap();
        assert!(assembled.is_complete());
        assert_eq!(assembled.report.pasted_count(), 4);

        let canvas = match assembled.image {
            PageImage::Composite(canvas) => canvas,
            PageImage::Full(_) => panic!("expected composite"),
        };
        assert_eq!(canvas.width(), 512);
        assert_eq!(canvas.height(), 512);
        assert_eq!(*canvas.get_pixel(10, 10), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(300, 10), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(10, 300), Rgb([0, 0, 255]));
        assert_eq!(*canvas.get_pixel(300, 300), Rgb([255, 255, 0]));
    }

    #[tokio::test]
    async fn test_single_tile_failure_leaves_region_blank() {
        let failing = TileSpec::new(256, 0, 256, 256);
        let mock = Arc::new(quadrant_mock().with_response(
            &tile_url(&failing),
            Err(HttpError::Status {
                status: 503,
                url: tile_url(&failing),
            }),
        ));

        let assembler = PageAssembler::new(
            Arc::clone(&mock),
            AssemblyConfig::new().with_max_retries(0),
        );
        let assembled = assembler.assemble(&page(512, 512)).await.unwrap();

        assert!(!assembled.is_complete());
        assert_eq!(assembled.report.pasted_count(), 3);
        assert_eq!(assembled.report.failure_count(), 1);
        assert_eq!(assembled.report.failures()[0].spec, failing);

        let canvas = match assembled.image {
            PageImage::Composite(canvas) => canvas,
            PageImage::Full(_) => panic!("expected composite"),
        };
        // Failed quadrant stays at the canvas fill; neighbors are intact.
        assert_eq!(*canvas.get_pixel(300, 10), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(10, 10), Rgb([255, 0, 0]));
    }

    #[tokio::test]
    async fn test_failed_tile_is_retried() {
        let failing = TileSpec::new(0, 0, 256, 256);
        let mock = Arc::new(quadrant_mock().with_response(
            &tile_url(&failing),
            Err(HttpError::Status {
                status: 503,
                url: tile_url(&failing),
            }),
        ));

        let assembler = PageAssembler::new(
            Arc::clone(&mock),
            AssemblyConfig::new().with_max_retries(2),
        );
        let assembled = assembler.assemble(&page(512, 512)).await.unwrap();

        assert_eq!(assembled.report.failures()[0].attempts, 3);
        assert_eq!(mock.requests_matching(&tile_url(&failing)), 3);
    }

    #[tokio::test]
    async fn test_probe_failure_falls_back_to_tiles() {
        // Probe URL is unscripted in quadrant_mock and answers 404.
        let mock = Arc::new(quadrant_mock());
        let assembler = PageAssembler::new(
            Arc::clone(&mock),
            AssemblyConfig::new().with_max_retries(0),
        );

        let assembled = assembler.assemble(&page(512, 512)).await.unwrap();
        assert!(!assembled.report.used_fast_path());
        assert!(assembled.is_complete());
    }

    #[tokio::test]
    async fn test_reduced_probe_image_falls_back_to_tiles() {
        // Server serves a downscaled whole image; width mismatch must force
        // the tiled path.
        let mock = Arc::new(
            quadrant_mock().with_response(FULL_URL, Ok(encode_png(400, 400, Rgb([1, 1, 1])))),
        );
        let assembler = PageAssembler::new(
            Arc::clone(&mock),
            AssemblyConfig::new().with_max_retries(0),
        );

        let assembled = assembler.assemble(&page(512, 512)).await.unwrap();
        assert!(!assembled.report.used_fast_path());
        assert!(assembled.is_complete());
    }

    #[tokio::test]
    async fn test_no_tiling_advertised_is_an_error() {
        let mock = Arc::new(
            MockHttpClient::new(Err(HttpError::Status {
                status: 404,
                url: "unscripted".to_string(),
            }))
            .with_response(
                &format!("{SERVICE}/info.json"),
                Ok(br#"{"width": 512, "height": 512}"#.to_vec()),
            ),
        );

        let assembler = PageAssembler::new(mock, AssemblyConfig::default());
        let result = assembler.assemble(&page(512, 512)).await;
        assert!(matches!(result, Err(AssemblyError::NoTiling { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mock = Arc::new(MockHttpClient::new(Ok(vec![])));
        let assembler = PageAssembler::new(mock, AssemblyConfig::default());

        let token = CancellationToken::new();
        token.cancel();

        let result = assembler.assemble_with_cancel(&page(512, 512), token).await;
        assert!(matches!(result, Err(AssemblyError::Cancelled)));
    }

    #[test]
    fn test_duplicate_paste_is_idempotent() {
        let mut canvas = RgbImage::new(512, 512);
        let spec = TileSpec::new(0, 0, 256, 256);
        let tile = RgbImage::from_pixel(256, 256, Rgb([50, 60, 70]));
        let neighbor = RgbImage::from_pixel(256, 256, Rgb([1, 2, 3]));

        paste_tile(&mut canvas, &TileSpec::new(256, 0, 256, 256), &neighbor);
        paste_tile(&mut canvas, &spec, &tile);
        paste_tile(&mut canvas, &spec, &tile);

        assert_eq!(*canvas.get_pixel(10, 10), Rgb([50, 60, 70]));
        assert_eq!(*canvas.get_pixel(300, 10), Rgb([1, 2, 3]));
    }

    #[test]
    fn test_oversized_tile_is_cropped() {
        let mut canvas = RgbImage::new(512, 512);
        let neighbor = RgbImage::from_pixel(256, 256, Rgb([1, 2, 3]));
        paste_tile(&mut canvas, &TileSpec::new(256, 0, 256, 256), &neighbor);

        // Server returned 300x300 for a 256x256 region.
        let oversized = RgbImage::from_pixel(300, 300, Rgb([200, 0, 0]));
        paste_tile(&mut canvas, &TileSpec::new(0, 0, 256, 256), &oversized);

        assert_eq!(*canvas.get_pixel(255, 10), Rgb([200, 0, 0]));
        assert_eq!(*canvas.get_pixel(256, 10), Rgb([1, 2, 3]));
    }
}
