use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::input::InputDef;
use crate::kind::ResourceKind;

/// A single resource declaration in a stack definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
  /// Logical name, unique within the stack.
  pub name: String,
  pub kind: ResourceKind,
  #[serde(default)]
  pub inputs: BTreeMap<String, InputDef>,
  /// Explicit ordering constraints that are not visible in the inputs.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
}
