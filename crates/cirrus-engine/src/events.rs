//! Apply events and notifiers for observability.
//!
//! Events are emitted during an apply run to allow consumers to observe
//! progress, render it in a terminal, persist it, etc.

use cirrus_provider::ProviderAction;
use cirrus_value::OutputMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during an apply run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApplyEvent {
  /// The run has started.
  ApplyStarted { run_id: String, stack_id: String },

  /// A resource's inputs resolved and it was handed to the provider.
  NodeStarted { run_id: String, node_id: String },

  /// A resource was realized and its outputs recorded.
  NodeRealized {
    run_id: String,
    node_id: String,
    action: ProviderAction,
    outputs: OutputMap,
  },

  /// A resource failed to realize.
  NodeFailed {
    run_id: String,
    node_id: String,
    error: String,
  },

  /// A resource was not attempted.
  NodeSkipped {
    run_id: String,
    node_id: String,
    reason: String,
  },

  /// The run has finished. `succeeded` is false if any resource failed or
  /// was skipped.
  ApplyCompleted { run_id: String, succeeded: bool },
}

/// Trait for receiving apply events.
///
/// The engine calls `notify` for each event. Implementations decide what to
/// do with them.
pub trait ApplyNotifier: Send + Sync {
  fn notify(&self, event: ApplyEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ApplyNotifier for NoopNotifier {
  fn notify(&self, _event: ApplyEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Event volume is a handful per resource, so the channel is unbounded to
/// keep the engine from waiting on a slow consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ApplyEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ApplyEvent>) -> Self {
    Self { sender }
  }
}

impl ApplyNotifier for ChannelNotifier {
  fn notify(&self, event: ApplyEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
