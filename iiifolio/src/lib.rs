//! iiifolio - IIIF manifest page downloader
//!
//! This library reconstructs the pages of a digitized document published as
//! a IIIF Presentation Manifest into local image files. Image servers often
//! refuse to serve a large page in one request; the engine plans a grid of
//! independently addressable tile regions, fetches them concurrently, and
//! stitches the results back into a single full-page image, tolerating
//! individual tile failures.
//!
//! # High-Level API
//!
//! For most use cases, the [`downloader`] module provides the whole flow:
//!
//! ```ignore
//! use iiifolio::client::ReqwestClient;
//! use iiifolio::config::AssemblyConfig;
//! use iiifolio::downloader::ManifestDownloader;
//! use std::sync::Arc;
//!
//! let client = Arc::new(ReqwestClient::new()?);
//! let downloader = ManifestDownloader::new(client, AssemblyConfig::default(), "./scans");
//!
//! let report = downloader.run("https://example.org/manifest.json").await?;
//! for page in report.partial_pages() {
//!     eprintln!("page {} has blank regions", page.label);
//! }
//! ```
//!
//! The lower layers are usable on their own: [`grid`] plans tile grids,
//! [`iiif`] speaks the Image API for a single endpoint, and [`assembler`]
//! turns one page descriptor into one pixel buffer.

pub mod assembler;
pub mod client;
pub mod config;
pub mod downloader;
pub mod grid;
pub mod iiif;
pub mod logging;
pub mod manifest;
pub mod storage;

/// Version of the iiifolio library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
