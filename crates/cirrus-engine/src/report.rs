use std::collections::BTreeMap;
use std::fmt;

use cirrus_provider::ProviderAction;
use cirrus_value::RealizedOutputs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a resource was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum SkipCause {
  /// An upstream resource failed.
  DependencyFailed { dependency: String },
  /// The run was cancelled first.
  Cancelled,
}

/// Final state of one resource after an apply run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
  Realized { action: ProviderAction },
  Failed { reason: String },
  Skipped { cause: SkipCause },
}

impl NodeOutcome {
  pub fn is_realized(&self) -> bool {
    matches!(self, NodeOutcome::Realized { .. })
  }
}

impl fmt::Display for NodeOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeOutcome::Realized { action } => write!(f, "realized ({action})"),
      NodeOutcome::Failed { reason } => write!(f, "failed: {reason}"),
      NodeOutcome::Skipped {
        cause: SkipCause::DependencyFailed { dependency },
      } => write!(f, "skipped (dependency '{dependency}' failed)"),
      NodeOutcome::Skipped {
        cause: SkipCause::Cancelled,
      } => write!(f, "skipped (cancelled)"),
    }
  }
}

/// Result of an apply run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
  /// Unique run ID.
  pub run_id: String,
  pub stack_id: String,
  /// Outcome of every resource, keyed by node id.
  pub outcomes: BTreeMap<String, NodeOutcome>,
  /// Node ids in the order their outputs were recorded.
  pub realize_order: Vec<String>,
  pub exports: BTreeMap<String, Value>,
  /// Exports whose producers did not realize, with the reason.
  pub unavailable_exports: BTreeMap<String, String>,
  pub outputs: RealizedOutputs,
  pub cancelled: bool,
}

impl ApplyReport {
  /// Whether every resource realized.
  pub fn succeeded(&self) -> bool {
    !self.cancelled && self.outcomes.values().all(NodeOutcome::is_realized)
  }

  /// Number of resources the provider created or updated.
  pub fn mutations(&self) -> usize {
    self
      .outcomes
      .values()
      .filter(|outcome| matches!(outcome, NodeOutcome::Realized { action } if action.is_mutation()))
      .count()
  }

  /// Position of `node_id` in the realize order.
  pub fn position(&self, node_id: &str) -> Option<usize> {
    self.realize_order.iter().position(|id| id == node_id)
  }

  pub fn outcome(&self, node_id: &str) -> Option<&NodeOutcome> {
    self.outcomes.get(node_id)
  }
}
