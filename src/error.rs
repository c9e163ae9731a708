use std::path::{Path, PathBuf};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SecretManagerError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("{url} returned status {status}")]
    Remote { url: String, status: u16 },

    #[error("invalid release metadata from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to get latest release: {0}")]
    CheckFailed(Box<SecretManagerError>),

    #[error("no suitable binary found for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to download {url}: status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("failed to extract {}: {source}", .archive.display())]
    Extraction {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("executable `{payload}` not found in archive {}", .archive.display())]
    PayloadNotFound { archive: PathBuf, payload: String },

    #[error("failed to back up current executable {} to {}: {source}", .path.display(), .backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install new executable at {}: {source}{}", .path.display(), stranded_note(.stranded_at.as_deref()))]
    Install {
        path: PathBuf,
        stranded_at: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn stranded_note(stranded_at: Option<&Path>) -> String {
    match stranded_at {
        Some(p) => format!(
            " (restoring the previous executable also failed; it is now at {})",
            p.display()
        ),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, SecretManagerError>;
