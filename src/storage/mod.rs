mod signing;

pub use signing::{SignedUrl, UrlSigner};

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// Where an attachment for a submission lives in the blob store.
pub fn blob_path(submission_id: &str, file_name: &str) -> String {
    format!("applications/{}/{}", submission_id, file_name)
}

/// Keep only the final path component of a client-supplied file name, with
/// characters that would break a download URL replaced by `_`.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(
        name.chars()
            .map(|c| match c {
                '?' | '#' | '%' | '&' | '+' => '_',
                c if c.is_whitespace() || c.is_control() => '_',
                c => c,
            })
            .collect(),
    )
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, data: &[u8]) -> AppResult<()>;
    async fn get(&self, path: &str) -> AppResult<Vec<u8>>;
    async fn delete(&self, path: &str) -> AppResult<()>;
}

pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Blob store rooted at the upload folder on local disk.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::Validation(format!("Invalid storage path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, data: &[u8]) -> AppResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data).await?;
        tracing::debug!("Stored blob {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn get(&self, path: &str) -> AppResult<Vec<u8>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("File {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder.join("applications"))
}
