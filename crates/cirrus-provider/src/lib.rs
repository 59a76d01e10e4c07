//! Cirrus Provider
//!
//! The [`Provider`] trait is the boundary between the apply engine and real
//! infrastructure. The engine calls [`Provider::realize`] once per resource
//! with every input resolved; the provider creates or updates the resource and
//! returns its outputs.
//!
//! [`LocalProvider`] is an in-process implementation that simulates the bucket
//! and CDN kinds. It is used by the CLI and by tests.

mod error;
mod local;
mod provider;

pub use error::ProviderError;
pub use local::{LocalProvider, ProviderState, ResourceRecord};
pub use provider::{Provider, ProviderAction, RealizeRequest, RealizeResponse};

/// Input added to `uploaded_object` requests with the asset's content digest.
pub const SOURCE_DIGEST_INPUT: &str = "source_digest";

/// Input added to `uploaded_object` requests with the asset's size in bytes.
pub const SOURCE_SIZE_INPUT: &str = "source_size";
