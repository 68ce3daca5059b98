//! Output persistence: collision-free filenames and page writing.

use crate::assembler::{AssembledPage, PageImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors while persisting an assembled page.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem write failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The composed canvas could not be encoded in the target format.
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Replaces path separators so a page label cannot escape the destination
/// directory.
fn sanitize_label(label: &str) -> String {
    label.replace(['/', '\\'], "-")
}

/// Picks a filename for `label` + `extension` inside `dir` that does not
/// collide with an existing file.
///
/// The first collision becomes `label (1).ext`, the next `label (2).ext`,
/// and so on.
pub fn unique_path(dir: &Path, label: &str, extension: &str) -> PathBuf {
    let label = sanitize_label(label);

    let candidate = dir.join(format!("{}{}", label, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut num = 1u32;
    loop {
        let candidate = dir.join(format!("{} ({}){}", label, num, extension));
        if !candidate.exists() {
            return candidate;
        }
        num += 1;
    }
}

/// Writes an assembled page under a unique filename and returns the path.
///
/// Fast-path pages are written byte-for-byte as the server sent them;
/// composed canvases are encoded according to the extension.
pub fn save_page(
    dir: &Path,
    label: &str,
    extension: &str,
    page: &AssembledPage,
) -> Result<PathBuf, StorageError> {
    let path = unique_path(dir, label, extension);

    match &page.image {
        PageImage::Full(bytes) => {
            fs::write(&path, bytes).map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        PageImage::Composite(canvas) => {
            canvas.save(&path).map_err(|source| StorageError::Encode {
                path: path.display().to_string(),
                source,
            })?;
        }
    }

    debug!(path = %path.display(), "page saved");
    Ok(path)
}
