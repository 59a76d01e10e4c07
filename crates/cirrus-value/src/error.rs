use thiserror::Error;

use crate::output::OutputRef;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
  /// A deferred value was read before its producer was realized.
  #[error("output '{reference}' read before resource '{}' was realized", .reference.node_id)]
  UnresolvedReference { reference: OutputRef },

  /// The producer was realized but did not report the requested attribute.
  #[error("resource '{node_id}' has no output '{attribute}'")]
  MissingOutput { node_id: String, attribute: String },

  /// Outputs were recorded twice for the same resource.
  #[error("resource '{node_id}' was already realized")]
  AlreadyRealized { node_id: String },

  /// A `map` or `combine` transformation returned an error.
  #[error("deferred transformation failed: {message}")]
  ApplyFailed { message: String },
}
