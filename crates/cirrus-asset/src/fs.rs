use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::{Asset, AssetError, AssetStore};

/// Filesystem-based asset store.
///
/// Absolute paths are read as-is. Relative paths are read from
/// `{base_path}/{path}` when a base path is set, otherwise from the current
/// directory.
#[derive(Debug, Clone, Default)]
pub struct FsAssetStore {
  base_path: Option<PathBuf>,
}

impl FsAssetStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a store that resolves relative paths against `base_path`.
  pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: Some(base_path.into()),
    }
  }

  fn resolve_path(&self, path: &str) -> PathBuf {
    match &self.base_path {
      Some(base) if Path::new(path).is_relative() => base.join(path),
      _ => PathBuf::from(path),
    }
  }
}

#[async_trait]
impl AssetStore for FsAssetStore {
  async fn load(&self, path: &str) -> Result<Asset, AssetError> {
    let full_path = self.resolve_path(path);
    let file = File::open(&full_path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        AssetError::NotFound(full_path.display().to_string())
      } else {
        AssetError::Io(e)
      }
    })?;

    let mut hasher = Sha256::new();
    let mut content = BytesMut::new();
    let mut stream = ReaderStream::new(file);

    while let Some(chunk) = stream.next().await {
      let chunk = chunk?;
      hasher.update(&chunk);
      content.extend_from_slice(&chunk);
    }

    let content = content.freeze();
    Ok(Asset {
      path: path.to_string(),
      size: content.len() as u64,
      digest: format!("sha256:{}", hex::encode(hasher.finalize())),
      content,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_load_reads_content_and_digest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "hello").unwrap();

    let store = FsAssetStore::with_base_path(dir.path());
    let asset = store.load("index.html").await.unwrap();

    assert_eq!(asset.path, "index.html");
    assert_eq!(asset.content.as_ref(), b"hello");
    assert_eq!(asset.size, 5);
    assert_eq!(
      asset.digest,
      "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
  }

  #[tokio::test]
  async fn test_absolute_path_ignores_base() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("error.html");
    std::fs::write(&file, "oops").unwrap();

    let store = FsAssetStore::with_base_path("/nonexistent");
    let asset = store.load(file.to_str().unwrap()).await.unwrap();
    assert_eq!(asset.size, 4);
  }

  #[tokio::test]
  async fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsAssetStore::with_base_path(dir.path());

    let err = store.load("missing.html").await.unwrap_err();
    assert!(matches!(err, AssetError::NotFound(path) if path.ends_with("missing.html")));
  }

  #[tokio::test]
  async fn test_changed_content_changes_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.html");
    let store = FsAssetStore::new();

    std::fs::write(&path, "v1").unwrap();
    let first = store.load(path.to_str().unwrap()).await.unwrap();
    std::fs::write(&path, "v2").unwrap();
    let second = store.load(path.to_str().unwrap()).await.unwrap();

    assert_ne!(first.digest, second.digest);
  }
}
