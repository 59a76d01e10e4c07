//! Cirrus Asset
//!
//! This crate provides the asset loading trait and a filesystem implementation
//! for Cirrus. Assets are local files uploaded by `uploaded_object` resources.
//!
//! Loading an asset reads its bytes once and computes a `sha256:<hex>` digest.
//! The digest is passed to the provider so a changed file is detected as an
//! update even when the path stays the same.

mod fs;

pub use fs::FsAssetStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while loading an asset.
#[derive(Debug, Error)]
pub enum AssetError {
  #[error("asset not found: {0}")]
  NotFound(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// A loaded asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
  /// The path the asset was loaded from.
  pub path: String,
  pub content: Bytes,
  pub size: u64,
  /// Content digest, `sha256:<hex>`.
  pub digest: String,
}

/// Asset loading trait.
///
/// Implementations decide how a `source` path maps to storage.
#[async_trait]
pub trait AssetStore: Send + Sync {
  /// Load the asset at `path`.
  async fn load(&self, path: &str) -> Result<Asset, AssetError>;
}
