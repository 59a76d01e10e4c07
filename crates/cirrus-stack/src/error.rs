use cirrus_config::ResourceKind;
use cirrus_value::OutputRef;
use thiserror::Error;

/// Build-time errors. All of them are raised before any provider call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StackError {
  #[error("duplicate resource id: {node_id}")]
  DuplicateNode { node_id: String },

  /// The cycle path starts and ends at the same resource.
  #[error("cyclic dependency: {}", .cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },

  #[error("resource '{node_id}' depends on unknown resource '{producer}'")]
  UnresolvedReference { node_id: String, producer: String },

  #[error(
    "resource '{node_id}' references '{reference}', but {kind} resources do not produce '{}'",
    .reference.attribute
  )]
  UnknownOutput {
    node_id: String,
    reference: OutputRef,
    kind: ResourceKind,
  },

  #[error("resource '{node_id}' is missing required input '{input}'")]
  MissingInput { node_id: String, input: String },

  #[error("input '{input}' of resource '{node_id}' cannot hold a deferred value")]
  NonDeferrableInput { node_id: String, input: String },

  #[error("export '{export}' references unknown resource '{producer}'")]
  UnresolvedExport { export: String, producer: String },
}
