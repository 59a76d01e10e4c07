use thiserror::Error;

/// Errors returned by a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// A resolved input does not have the shape the kind requires.
  #[error("invalid input '{input}' for '{node_id}': {message}")]
  InvalidInput {
    node_id: String,
    input: String,
    message: String,
  },

  /// The provider refused to realize the resource.
  #[error("realize rejected for '{node_id}': {message}")]
  Rejected { node_id: String, message: String },

  #[error("state io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("state serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}
