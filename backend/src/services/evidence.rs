//! Write-through storage for clock-in/out photos.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::error::AppError;

/// Largest photo accepted, after decoding.
pub const MAX_EVIDENCE_BYTES: usize = 5 * 1024 * 1024;

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Stores the bytes and returns an opaque reference to them.
    async fn store(&self, bytes: &[u8]) -> Result<String, AppError>;
}

/// Content-addressed files under a root directory.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl EvidenceStore for FsEvidenceStore {
    async fn store(&self, bytes: &[u8]) -> Result<String, AppError> {
        let digest = hex::encode(Sha256::digest(bytes));
        let dir = self.root.join(&digest[..2]);
        let path = dir.join(&digest);

        if !tokio::fs::try_exists(&path).await.map_err(anyhow::Error::from)? {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(anyhow::Error::from)?;
            tokio::fs::write(&path, bytes)
                .await
                .map_err(anyhow::Error::from)?;
        }
        Ok(format!("sha256:{}", digest))
    }
}

/// Decodes an optional base64 photo and stores it.
pub async fn store_photo(
    store: &dyn EvidenceStore,
    photo_base64: Option<&str>,
) -> Result<Option<String>, AppError> {
    let Some(encoded) = photo_base64.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| AppError::BadRequest("photo_base64 is not valid base64".to_string()))?;
    if bytes.len() > MAX_EVIDENCE_BYTES {
        return Err(AppError::BadRequest("Photo is too large".to_string()));
    }
    Ok(Some(store.store(&bytes).await?))
}
