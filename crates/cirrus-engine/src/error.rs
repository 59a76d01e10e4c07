use cirrus_asset::AssetError;
use cirrus_provider::ProviderError;
use cirrus_value::ValueError;

/// Errors that abort an apply run.
///
/// Failures of individual resources do not abort the run. They are reported
/// per node as [`NodeError`]s in the apply report.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
  /// Realized outputs could not be recorded.
  #[error("failed to record outputs: {0}")]
  Outputs(#[from] ValueError),
}

/// Why a single resource failed to realize.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
  /// An input could not be resolved, e.g. a transformation failed.
  #[error("failed to resolve inputs: {0}")]
  Input(#[source] ValueError),

  /// The upload source is not a string path.
  #[error("input 'source' must be a file path")]
  InvalidSource,

  /// The upload source file does not exist.
  #[error("missing asset: {path}")]
  MissingAsset { path: String },

  #[error("failed to load asset: {0}")]
  Asset(#[source] AssetError),

  #[error(transparent)]
  Provider(#[from] ProviderError),

  /// The realize task panicked.
  #[error("realize task failed: {message}")]
  Panicked { message: String },
}

impl From<AssetError> for NodeError {
  fn from(e: AssetError) -> Self {
    match e {
      AssetError::NotFound(path) => NodeError::MissingAsset { path },
      other => NodeError::Asset(other),
    }
  }
}
