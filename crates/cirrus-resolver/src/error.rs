use cirrus_stack::StackError;
use thiserror::Error;

/// Errors that can occur while lowering a stack definition.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A template string failed to parse or render.
  #[error("invalid template in {location}: {message}")]
  InvalidTemplate { location: String, message: String },

  /// A template names a resource without an output attribute.
  #[error("invalid reference '{reference}' in {location}: expected <resource>.<output>")]
  InvalidReference { location: String, reference: String },

  /// The lowered stack failed graph validation.
  #[error(transparent)]
  Stack(#[from] StackError),
}
