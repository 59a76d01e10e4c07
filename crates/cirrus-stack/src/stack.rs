use std::collections::{BTreeMap, HashSet};

use cirrus_value::InputValue;

use crate::error::StackError;
use crate::graph::Graph;
use crate::resource::Resource;

/// A validated stack ready to be applied.
///
/// Construction checks the whole graph up front:
/// - resource ids are unique
/// - required inputs are present and only deferrable inputs hold deferred values
/// - every reference names an existing resource and an output its kind produces
/// - explicit dependencies name existing resources
/// - the dependency relation is acyclic
#[derive(Debug, Clone)]
pub struct Stack {
  stack_id: String,
  name: String,
  resources: BTreeMap<String, Resource>,
  declaration_order: Vec<String>,
  exports: BTreeMap<String, InputValue>,
  graph: Graph,
}

impl Stack {
  pub fn new(
    stack_id: impl Into<String>,
    name: impl Into<String>,
    resources: Vec<Resource>,
    exports: BTreeMap<String, InputValue>,
  ) -> Result<Self, StackError> {
    let mut seen = HashSet::new();
    for resource in &resources {
      if !seen.insert(resource.id.clone()) {
        return Err(StackError::DuplicateNode {
          node_id: resource.id.clone(),
        });
      }
    }

    let declaration_order: Vec<String> = resources.iter().map(|r| r.id.clone()).collect();
    let resources: BTreeMap<String, Resource> = resources
      .into_iter()
      .map(|r| (r.id.clone(), r))
      .collect();

    for id in &declaration_order {
      validate_resource(&resources[id], &resources)?;
    }
    validate_exports(&exports, &resources)?;

    let edges = derive_edges(&declaration_order, &resources);
    let graph = Graph::new(&declaration_order, &edges);

    if let Some(cycle) = graph.find_cycle() {
      return Err(StackError::CyclicDependency { cycle });
    }

    Ok(Self {
      stack_id: stack_id.into(),
      name: name.into(),
      resources,
      declaration_order,
      exports,
      graph,
    })
  }

  pub fn stack_id(&self) -> &str {
    &self.stack_id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Get a resource by ID.
  pub fn get(&self, node_id: &str) -> Option<&Resource> {
    self.resources.get(node_id)
  }

  /// Resources in the order they were declared.
  pub fn resources(&self) -> impl Iterator<Item = &Resource> {
    self
      .declaration_order
      .iter()
      .filter_map(|id| self.resources.get(id))
  }

  pub fn len(&self) -> usize {
    self.resources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }

  pub fn exports(&self) -> &BTreeMap<String, InputValue> {
    &self.exports
  }

  /// The derived dependency graph (implicit and explicit edges).
  pub fn graph(&self) -> &Graph {
    &self.graph
  }
}

fn validate_resource(
  resource: &Resource,
  resources: &BTreeMap<String, Resource>,
) -> Result<(), StackError> {
  for input in resource.kind.required_inputs() {
    if !resource.inputs.contains_key(*input) {
      return Err(StackError::MissingInput {
        node_id: resource.id.clone(),
        input: input.to_string(),
      });
    }
  }

  for (name, value) in &resource.inputs {
    if value.is_deferred() && !resource.kind.is_deferrable(name) {
      return Err(StackError::NonDeferrableInput {
        node_id: resource.id.clone(),
        input: name.clone(),
      });
    }
  }

  for reference in resource.references() {
    let producer = resources
      .get(&reference.node_id)
      .ok_or_else(|| StackError::UnresolvedReference {
        node_id: resource.id.clone(),
        producer: reference.node_id.clone(),
      })?;

    if !producer.kind.produces(&reference.attribute) {
      return Err(StackError::UnknownOutput {
        node_id: resource.id.clone(),
        kind: producer.kind,
        reference,
      });
    }
  }

  for dependency in &resource.depends_on {
    if !resources.contains_key(dependency) {
      return Err(StackError::UnresolvedReference {
        node_id: resource.id.clone(),
        producer: dependency.clone(),
      });
    }
  }

  Ok(())
}

fn validate_exports(
  exports: &BTreeMap<String, InputValue>,
  resources: &BTreeMap<String, Resource>,
) -> Result<(), StackError> {
  for (export, value) in exports {
    for reference in value.references() {
      let producer = resources
        .get(&reference.node_id)
        .ok_or_else(|| StackError::UnresolvedExport {
          export: export.clone(),
          producer: reference.node_id.clone(),
        })?;

      if !producer.kind.produces(&reference.attribute) {
        return Err(StackError::UnknownOutput {
          node_id: format!("export:{export}"),
          kind: producer.kind,
          reference,
        });
      }
    }
  }
  Ok(())
}

/// Implicit edges come from output references, explicit ones from `depends_on`.
fn derive_edges(
  declaration_order: &[String],
  resources: &BTreeMap<String, Resource>,
) -> Vec<(String, String)> {
  declaration_order
    .iter()
    .flat_map(|id| {
      resources[id]
        .dependencies()
        .into_iter()
        .map(move |dependency| (dependency, id.clone()))
    })
    .collect()
}
