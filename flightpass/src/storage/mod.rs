//! Boarding-pass content sink.
//!
//! Normalized boarding-pass images are written under a deterministic name
//! derived from the flight number and the uploaded file's extension, then
//! served back through `/api/v1/flights/image/{fileName}`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Extension used when the upload carries no usable one.
pub const DEFAULT_EXTENSION: &str = ".png";

/// Destination for persisted boarding passes.
#[async_trait]
pub trait PassSink: Send + Sync {
    /// Write `bytes` under `name`, replacing any previous content, and return
    /// the URI it can be fetched from.
    async fn store(&self, name: &str, bytes: Vec<u8>) -> io::Result<String>;

    /// URI that `name` is (or will be) reachable at.
    fn locate(&self, name: &str) -> String;
}

/// `flight_number` followed by the extension of `original_filename`.
///
/// The extension is everything after the last `.`, lower-cased and limited to
/// ASCII alphanumerics; [`DEFAULT_EXTENSION`] is used when there is none.
/// Characters in the flight number that are unsafe in a file name become `_`.
pub fn pass_file_name(flight_number: &str, original_filename: Option<&str>) -> String {
    let stem: String = flight_number
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let extension = original_filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    format!("{stem}{extension}")
}

/// A single path component made of safe characters, with no leading dot.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Stores passes as files in a local directory.
#[derive(Debug, Clone)]
pub struct FsPassSink {
    root: PathBuf,
    public_url: String,
}

impl FsPassSink {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    /// Read a stored pass back. Names that are not a single safe path
    /// component are rejected as `InvalidInput`.
    pub async fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        if !is_safe_file_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid boarding pass file name: {name}"),
            ));
        }
        tokio::fs::read(self.root.join(name)).await
    }
}

async fn write_staged(staging: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    tokio::fs::write(staging, bytes).await?;
    tokio::fs::rename(staging, path).await
}

#[async_trait]
impl PassSink for FsPassSink {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> io::Result<String> {
        if !is_safe_file_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid boarding pass file name: {name}"),
            ));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(name);
        // Readers only ever see a complete file: write aside, then rename.
        let staging = self.root.join(format!(".{name}.partial"));
        if let Err(e) = write_staged(&staging, &path, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        debug!(path = %path.display(), size = bytes.len(), "boarding pass stored");

        Ok(self.locate(name))
    }

    fn locate(&self, name: &str) -> String {
        format!(
            "{}/api/v1/flights/image/{}",
            self.public_url.trim_end_matches('/'),
            name
        )
    }
}
