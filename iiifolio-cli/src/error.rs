//! CLI error handling with user-friendly messages.

use iiifolio::client::HttpError;
use iiifolio::manifest::ManifestError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to create the HTTP client
    Client(HttpError),
    /// Destination directory could not be used
    Destination { path: String, error: std::io::Error },
    /// The manifest could not be retrieved or interpreted
    Manifest(ManifestError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Manifest(_) = self {
            eprintln!();
            eprintln!("Check that the URL points at a IIIF Presentation Manifest");
            eprintln!("(usually ending in /manifest or manifest.json).");
        }

        process::exit(1);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "failed to initialize logging: {}", msg),
            CliError::Client(e) => write!(f, "failed to create HTTP client: {}", e),
            CliError::Destination { path, error } => {
                write!(f, "cannot use destination directory {}: {}", path, error)
            }
            CliError::Manifest(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ManifestError> for CliError {
    fn from(e: ManifestError) -> Self {
        CliError::Manifest(e)
    }
}
