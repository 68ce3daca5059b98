//! IIIF Image API service layer.
//!
//! This module speaks the Image API region/size/rotation/quality URL
//! convention for a single image service endpoint: one [`ImageService`] per
//! page, wrapping an [`HttpClient`](crate::client::HttpClient) and the
//! page's tile service base URL.
//!
//! # Example
//!
//! ```ignore
//! use iiifolio::client::ReqwestClient;
//! use iiifolio::grid::TileSpec;
//! use iiifolio::iiif::ImageService;
//! use std::sync::Arc;
//!
//! let client = Arc::new(ReqwestClient::new()?);
//! let service = ImageService::new(client, "https://images.example.org/page1");
//!
//! let info = service.fetch_info().await?;
//! let tile = service
//!     .fetch_tile(&TileSpec::new(0, 0, 256, 256), ".jpg")
//!     .await?;
//! ```

mod info;
mod service;
mod types;

pub use info::{ImageInfo, TileDescription, TileUnit};
pub use service::ImageService;
pub use types::{InfoError, TileError};
