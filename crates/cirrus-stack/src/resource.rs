use std::collections::{BTreeMap, BTreeSet};

use cirrus_config::ResourceKind;
use cirrus_value::{Deferred, InputValue, OutputRef};

/// A validated resource declaration.
#[derive(Debug, Clone)]
pub struct Resource {
  pub id: String,
  pub kind: ResourceKind,
  pub inputs: BTreeMap<String, InputValue>,
  /// Explicit dependencies, independent of data flow.
  pub depends_on: BTreeSet<String>,
}

impl Resource {
  /// Outputs referenced anywhere in this resource's inputs.
  pub fn references(&self) -> BTreeSet<OutputRef> {
    self
      .inputs
      .values()
      .flat_map(InputValue::references)
      .collect()
  }

  /// Every resource that must be realized before this one: producers of
  /// referenced outputs plus explicit dependencies.
  pub fn dependencies(&self) -> BTreeSet<String> {
    self
      .references()
      .into_iter()
      .map(|r| r.node_id)
      .chain(self.depends_on.iter().cloned())
      .collect()
  }
}

/// Handle returned when a resource is declared. Use it to reference the
/// resource's outputs or to order other resources after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
  id: String,
  kind: ResourceKind,
}

impl ResourceHandle {
  pub(crate) fn new(id: String, kind: ResourceKind) -> Self {
    Self { id, kind }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  /// A deferred value for one of this resource's outputs.
  ///
  /// Attributes the kind does not produce are rejected when the stack is built.
  pub fn output(&self, attribute: &str) -> Deferred {
    Deferred::output(self.id.clone(), attribute)
  }
}
