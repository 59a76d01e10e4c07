//! Dry-run view of an apply.
//!
//! A preview shows the waves resources would realize in and each resource's
//! inputs as far as they are known. Values that depend on unrealized
//! resources render as `"<unknown>"`. No provider is called.

use std::collections::BTreeMap;

use cirrus_config::ResourceKind;
use cirrus_stack::Stack;
use cirrus_value::{RealizedOutputs, ValueError};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct PreviewNode {
  pub kind: ResourceKind,
  pub inputs: BTreeMap<String, Value>,
  pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Preview {
  pub stack_id: String,
  /// Groups of resources that can realize concurrently, in order.
  pub waves: Vec<Vec<String>>,
  pub nodes: BTreeMap<String, PreviewNode>,
  pub exports: BTreeMap<String, Value>,
}

/// Preview `stack` against outputs that are already known, e.g. from a
/// previous run. Pass an empty [`RealizedOutputs`] for a first deployment.
pub fn preview(stack: &Stack, outputs: &RealizedOutputs) -> Result<Preview, ValueError> {
  let graph = stack.graph();
  let mut nodes = BTreeMap::new();

  for resource in stack.resources() {
    let mut inputs = BTreeMap::new();
    for (name, input) in &resource.inputs {
      inputs.insert(name.clone(), input.preview(outputs)?);
    }

    nodes.insert(
      resource.id.clone(),
      PreviewNode {
        kind: resource.kind,
        inputs,
        depends_on: graph.upstream(&resource.id).cloned().collect(),
      },
    );
  }

  let mut exports = BTreeMap::new();
  for (name, value) in stack.exports() {
    exports.insert(name.clone(), value.preview(outputs)?);
  }

  Ok(Preview {
    stack_id: stack.stack_id().to_string(),
    waves: graph.waves(),
    nodes,
    exports,
  })
}
