use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use cirrus_config::{ResourceDef, ResourceKind, StackDef};
use cirrus_stack::{Resource, Stack};
use cirrus_value::InputValue;
use serde_json::Value;

use crate::error::ResolveError;
use crate::template::lower_input;

/// Resolver transforms a StackDef into a validated Stack.
pub trait Resolver: Send + Sync {
  /// Resolve a stack definition.
  ///
  /// This process:
  /// 1. Lowers template strings into deferred values
  /// 2. Resolves relative asset paths
  /// 3. Builds the stack, which validates references and rejects cycles
  fn resolve(&self, def: StackDef) -> Result<Stack, ResolveError>;
}

/// Standard resolver for JSON stack definitions.
#[derive(Debug, Clone, Default)]
pub struct StandardResolver {
  base_dir: Option<PathBuf>,
}

impl StandardResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Resolve relative `source` paths against `dir`, usually the directory
  /// holding the stack file.
  pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.base_dir = Some(dir.into());
    self
  }

  fn resolve_resource(
    &self,
    def: ResourceDef,
    resource_ids: &HashSet<String>,
  ) -> Result<Resource, ResolveError> {
    let mut inputs = BTreeMap::new();

    for (name, value) in &def.inputs {
      let location = format!("{}.{}", def.name, name);
      let mut input = lower_input(value, &location, resource_ids)?;

      if def.kind == ResourceKind::UploadedObject && name == "source" {
        input = self.resolve_source(input);
      }
      inputs.insert(name.clone(), input);
    }

    Ok(Resource {
      id: def.name,
      kind: def.kind,
      inputs,
      depends_on: def.depends_on.into_iter().collect(),
    })
  }

  fn resolve_source(&self, input: InputValue) -> InputValue {
    match (&self.base_dir, &input) {
      (Some(base), InputValue::Literal(Value::String(path))) if Path::new(path).is_relative() => {
        InputValue::from(base.join(path).to_string_lossy().into_owned())
      }
      _ => input,
    }
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, def: StackDef) -> Result<Stack, ResolveError> {
    let resource_ids: HashSet<String> = def.resources.iter().map(|r| r.name.clone()).collect();

    let resources = def
      .resources
      .into_iter()
      .map(|r| self.resolve_resource(r, &resource_ids))
      .collect::<Result<Vec<_>, _>>()?;

    let mut exports = BTreeMap::new();
    for (name, template) in &def.exports {
      let location = format!("export:{name}");
      let value = lower_input(&Value::String(template.clone()), &location, &resource_ids)?;
      exports.insert(name.clone(), value);
    }

    Ok(Stack::new(def.stack_id, def.name, resources, exports)?)
  }
}
