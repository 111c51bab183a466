use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::api::job::models::BlobRef;

/// On-disk storage for uploaded files
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

/// Temporary local copy of a blob, deleted when dropped
#[derive(Debug)]
pub struct BlobHandle {
    file: NamedTempFile,
}

impl BlobHandle {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Copy an uploaded file into the store and return its key
    pub async fn put(&self, source: &Path, original_filename: Option<&str>) -> io::Result<BlobRef> {
        tokio::fs::create_dir_all(&self.root).await?;

        let suffix: u64 = rand::thread_rng().gen();
        let mut key = format!("{}-{:016x}", chrono::Utc::now().format("%Y%m%d%H%M%S"), suffix);
        if let Some(ext) = original_filename.and_then(safe_extension) {
            key.push('.');
            key.push_str(&ext);
        }

        let bytes = tokio::fs::copy(source, self.root.join(&key)).await?;
        debug!("Stored blob {} ({} bytes)", key, bytes);
        Ok(BlobRef::new(key))
    }

    /// Durable location of a blob
    pub fn locate(&self, blob: &BlobRef) -> io::Result<PathBuf> {
        let key = blob.as_str();
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob key: {}", key),
            ));
        }
        Ok(self.root.join(key))
    }

    /// Copy a blob to a temporary file for the duration of one use
    pub async fn checkout(&self, blob: &BlobRef) -> io::Result<BlobHandle> {
        let source = self.locate(blob)?;
        let suffix = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let file = tempfile::Builder::new()
            .prefix("job-input-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::copy(&source, file.path()).await?;

        Ok(BlobHandle { file })
    }
}

fn safe_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}
