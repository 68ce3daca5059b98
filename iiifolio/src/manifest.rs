//! IIIF Presentation Manifest layer.
//!
//! Thin input layer for the engine: retrieves a Presentation API v2
//! manifest document and flattens its first sequence into one
//! [`PageDescriptor`] per canvas. Everything the assembly engine needs to
//! know about a page is captured here; the manifest document itself is not
//! consulted again.

use crate::client::{HttpClient, HttpError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors while retrieving or interpreting a manifest.
///
/// Manifest errors are fatal: without a usable page sequence there is
/// nothing to download, so the whole run aborts.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be retrieved.
    #[error("manifest fetch failed: {0}")]
    Fetch(#[from] HttpError),

    /// The document was not valid manifest JSON.
    #[error("manifest parse failed: {0}")]
    Parse(String),

    /// The manifest contains no sequences.
    #[error("manifest has no sequences")]
    NoSequences,

    /// The first sequence contains no canvases.
    #[error("manifest sequence has no canvases")]
    NoCanvases,

    /// A canvas carries no image annotation.
    #[error("canvas \"{label}\" has no image resource")]
    MissingImage { label: String },

    /// A canvas image resource names no image service to tile from.
    #[error("canvas \"{label}\" has no image service")]
    MissingService { label: String },
}

/// Immutable description of one page, consumed by the assembly engine.
#[derive(Debug, Clone)]
pub struct PageDescriptor {
    /// Page width in pixels at full resolution.
    pub width: u32,
    /// Page height in pixels at full resolution.
    pub height: u32,
    /// URL of the page's whole-image rendition.
    pub full_image_url: String,
    /// Base URL of the page's image service, used for tiled retrieval.
    pub tile_service_url: String,
    /// Label the output file is named after.
    pub output_label: String,
    /// Declared media type of the image resource, e.g. `image/jpeg`.
    pub media_type: Option<String>,
}

impl PageDescriptor {
    /// File extension derived from the declared media type.
    ///
    /// Falls back to `.jpg` when the media type is absent or unknown.
    pub fn extension(&self) -> &'static str {
        self.media_type
            .as_deref()
            .and_then(media_type_extension)
            .unwrap_or(".jpg")
    }
}

/// A manifest flattened to the pages of its first sequence.
#[derive(Debug)]
pub struct ManifestDocument {
    /// The manifest's own label, if it carries one.
    pub label: Option<String>,
    /// One descriptor per canvas, in presentation order.
    pub pages: Vec<PageDescriptor>,
}

/// Maps an image media type to its conventional file extension.
pub fn media_type_extension(media_type: &str) -> Option<&'static str> {
    match media_type {
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/tiff" => Some(".tif"),
        "image/gif" => Some(".gif"),
        "image/jp2" => Some(".jp2"),
        "image/webp" => Some(".webp"),
        _ => None,
    }
}

/// Retrieves a manifest and flattens it into page descriptors.
///
/// Only the first sequence is consulted, matching common practice for
/// paged documents.
pub async fn fetch_manifest<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<ManifestDocument, ManifestError> {
    debug!(url = url, "fetching manifest");
    let bytes = client.get(url).await?;
    parse_manifest(&bytes)
}

/// Parses manifest JSON into page descriptors.
pub fn parse_manifest(bytes: &[u8]) -> Result<ManifestDocument, ManifestError> {
    let manifest: Manifest =
        serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse(e.to_string()))?;

    let sequence = manifest
        .sequences
        .into_iter()
        .next()
        .ok_or(ManifestError::NoSequences)?;

    if sequence.canvases.is_empty() {
        return Err(ManifestError::NoCanvases);
    }

    let mut pages = Vec::with_capacity(sequence.canvases.len());
    for (index, canvas) in sequence.canvases.into_iter().enumerate() {
        let label = canvas
            .label
            .as_ref()
            .and_then(label_text)
            .unwrap_or_else(|| format!("page-{}", index + 1));

        let annotation = canvas
            .images
            .into_iter()
            .next()
            .ok_or_else(|| ManifestError::MissingImage {
                label: label.clone(),
            })?;
        let resource = annotation.resource;

        let service = resource
            .service
            .ok_or_else(|| ManifestError::MissingService {
                label: label.clone(),
            })?;

        pages.push(PageDescriptor {
            width: resource.width.unwrap_or(canvas.width),
            height: resource.height.unwrap_or(canvas.height),
            full_image_url: resource.id,
            tile_service_url: service.id,
            output_label: label,
            media_type: resource.format,
        });
    }

    Ok(ManifestDocument {
        label: manifest.label.as_ref().and_then(label_text),
        pages,
    })
}

/// Coerces a Presentation API label value to plain text.
///
/// Labels appear as plain strings, arrays of values, or language maps with
/// an `@value` key.
fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(label_text),
        Value::Object(map) => map.get("@value").and_then(label_text),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    label: Option<Value>,
    #[serde(default)]
    sequences: Vec<Sequence>,
}

#[derive(Debug, Deserialize)]
struct Sequence {
    #[serde(default)]
    canvases: Vec<Canvas>,
}

#[derive(Debug, Deserialize)]
struct Canvas {
    label: Option<Value>,
    width: u32,
    height: u32,
    #[serde(default)]
    images: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    resource: Resource,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "@id")]
    id: String,
    format: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    service: Option<Service>,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(rename = "@id")]
    id: String,
}
