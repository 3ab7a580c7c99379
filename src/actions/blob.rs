//! Blob storage for uploaded files.
//!
//! Stores blobs under a root directory:
//! ```text
//! <root>/
//!   profilePictures/
//!     <uid>.png
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while storing a blob.
#[derive(Error, Debug)]
pub enum BlobError {
    /// Path is empty or escapes the storage root.
    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Somewhere uploaded bytes can be kept and later fetched by URL.
#[allow(async_fn_in_trait)]
pub trait BlobStorage {
    /// Stores `bytes` at `path` and returns a URL for them.
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<String, BlobError>;
}

/// File extension used for a MIME type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Blob storage on the local filesystem, handing out `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsBlobStorage {
    root: PathBuf,
}

impl FsBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validates a blob path to prevent path traversal attacks.
    fn validate_path(path: &str) -> Result<(), BlobError> {
        if path.is_empty()
            || path.starts_with('/')
            || path.contains('\\')
            || path.split('/').any(|part| part.is_empty() || part.starts_with('.'))
        {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(())
    }
}

impl BlobStorage for FsBlobStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, BlobError> {
        Self::validate_path(path)?;

        let target = self
            .root
            .join(format!("{}.{}", path, extension_for(content_type)));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| BlobError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Write atomically using temp file + rename
        let temp = target.with_extension("tmp");
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|source| BlobError::Io {
                path: temp.clone(),
                source,
            })?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|source| BlobError::Io {
                path: target.clone(),
                source,
            })?;

        tracing::debug!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(format!("file://{}", target.display()))
    }
}
