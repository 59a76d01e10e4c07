//! Cirrus Engine
//!
//! Applies a validated stack: realizes resources through a provider in
//! dependency order, records their outputs, and resolves the stack's exports.
//! Also provides a dry-run [`preview`].

mod engine;
mod error;
mod events;
mod preview;
mod report;

pub use engine::{ApplyEngine, EngineConfig};
pub use error::{ApplyError, NodeError};
pub use events::{ApplyEvent, ApplyNotifier, ChannelNotifier, NoopNotifier};
pub use preview::{Preview, PreviewNode, preview};
pub use report::{ApplyReport, NodeOutcome, SkipCause};
