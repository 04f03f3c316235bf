use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole synchronization engine.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Transfer of {url} interrupted: {source}")]
    Interrupted {
        url: String,
        source: std::io::Error,
    },

    // ── Integrity ───────────────────────────────────────
    #[error("Declared length {declared} of {url} does not match expected size {expected}")]
    ContentLengthMismatch {
        url: String,
        expected: u64,
        declared: u64,
    },

    #[error("Size mismatch for {path:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Manifest ────────────────────────────────────────
    #[error("Version not found in manifest: {0}")]
    VersionNotFound(String),

    #[error("Invalid manifest data: {0}")]
    InvalidManifest(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Refusing to touch {path:?}: not inside {root:?}")]
    UnsafePath { path: PathBuf, root: PathBuf },

    // ── Control ─────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// True for size, declared-length, and hash mismatches.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            LauncherError::ContentLengthMismatch { .. }
                | LauncherError::SizeMismatch { .. }
                | LauncherError::Sha1Mismatch { .. }
        )
    }

    /// True for transport failures and non-success responses.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            LauncherError::Http(_)
                | LauncherError::DownloadFailed { .. }
                | LauncherError::Interrupted { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for IPC consumers ─────────────────────
// Frontends receive the error as its display string.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
