use std::fmt;

use async_trait::async_trait;
use cirrus_config::ResourceKind;
use cirrus_value::OutputMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// One realize call: a resource with every input resolved to concrete JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizeRequest {
  pub node_id: String,
  pub kind: ResourceKind,
  pub inputs: Map<String, Value>,
}

/// What the provider did to reach the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderAction {
  Create,
  Update,
  Unchanged,
}

impl ProviderAction {
  /// Whether the action changed real infrastructure.
  pub fn is_mutation(&self) -> bool {
    !matches!(self, ProviderAction::Unchanged)
  }
}

impl fmt::Display for ProviderAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ProviderAction::Create => "create",
      ProviderAction::Update => "update",
      ProviderAction::Unchanged => "unchanged",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealizeResponse {
  pub action: ProviderAction,
  /// Every output the kind declares.
  pub outputs: OutputMap,
}

/// A provider reconciles one resource at a time.
///
/// Calls are create-or-update keyed by node id: realizing the same node twice
/// with identical inputs must not change anything.
#[async_trait]
pub trait Provider: Send + Sync {
  fn name(&self) -> &str;

  async fn realize(&self, request: RealizeRequest) -> Result<RealizeResponse, ProviderError>;
}
