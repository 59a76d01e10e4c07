use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValueError;

/// Outputs of a single realized resource, keyed by attribute name.
pub type OutputMap = BTreeMap<String, Value>;

/// Reference to one output attribute of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
  pub node_id: String,
  pub attribute: String,
}

impl OutputRef {
  pub fn new(node_id: impl Into<String>, attribute: impl Into<String>) -> Self {
    Self {
      node_id: node_id.into(),
      attribute: attribute.into(),
    }
  }
}

impl fmt::Display for OutputRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.node_id, self.attribute)
  }
}

/// Outputs of every resource realized so far in an apply run.
///
/// Entries are write-once: recording outputs for a resource that already has
/// them is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedOutputs {
  nodes: HashMap<String, OutputMap>,
}

impl RealizedOutputs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the outputs of a freshly realized resource.
  pub fn record(
    &mut self,
    node_id: impl Into<String>,
    outputs: OutputMap,
  ) -> Result<(), ValueError> {
    let node_id = node_id.into();
    if self.nodes.contains_key(&node_id) {
      return Err(ValueError::AlreadyRealized { node_id });
    }
    self.nodes.insert(node_id, outputs);
    Ok(())
  }

  pub fn is_realized(&self, node_id: &str) -> bool {
    self.nodes.contains_key(node_id)
  }

  /// All outputs of a realized resource.
  pub fn node(&self, node_id: &str) -> Option<&OutputMap> {
    self.nodes.get(node_id)
  }

  /// Look up a single output.
  pub fn get(&self, reference: &OutputRef) -> Result<&Value, ValueError> {
    let outputs = self
      .nodes
      .get(&reference.node_id)
      .ok_or_else(|| ValueError::UnresolvedReference {
        reference: reference.clone(),
      })?;

    outputs
      .get(&reference.attribute)
      .ok_or_else(|| ValueError::MissingOutput {
        node_id: reference.node_id.clone(),
        attribute: reference.attribute.clone(),
      })
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputMap)> {
    self.nodes.iter()
  }
}

/// Rebuild a snapshot from persisted outputs, e.g. a previous run's state.
impl FromIterator<(String, OutputMap)> for RealizedOutputs {
  fn from_iter<T: IntoIterator<Item = (String, OutputMap)>>(iter: T) -> Self {
    Self {
      nodes: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn bucket_outputs() -> OutputMap {
    let mut outputs = OutputMap::new();
    outputs.insert("id".to_string(), json!("site-1a2b3c4"));
    outputs
  }

  #[test]
  fn test_record_and_get() {
    let mut realized = RealizedOutputs::new();
    realized.record("bucket", bucket_outputs()).unwrap();

    let value = realized.get(&OutputRef::new("bucket", "id")).unwrap();
    assert_eq!(value, &json!("site-1a2b3c4"));
    assert!(realized.is_realized("bucket"));
    assert_eq!(realized.len(), 1);
  }

  #[test]
  fn test_outputs_are_write_once() {
    let mut realized = RealizedOutputs::new();
    realized.record("bucket", bucket_outputs()).unwrap();

    let err = realized.record("bucket", OutputMap::new()).unwrap_err();
    assert_eq!(
      err,
      ValueError::AlreadyRealized {
        node_id: "bucket".to_string()
      }
    );
    // The first recording survives.
    assert_eq!(
      realized.get(&OutputRef::new("bucket", "id")).unwrap(),
      &json!("site-1a2b3c4")
    );
  }

  #[test]
  fn test_get_before_realization_is_unresolved() {
    let realized = RealizedOutputs::new();
    let err = realized.get(&OutputRef::new("bucket", "id")).unwrap_err();
    assert!(matches!(err, ValueError::UnresolvedReference { .. }));
  }

  #[test]
  fn test_get_missing_attribute() {
    let mut realized = RealizedOutputs::new();
    realized.record("bucket", bucket_outputs()).unwrap();

    let err = realized.get(&OutputRef::new("bucket", "arn")).unwrap_err();
    assert!(matches!(err, ValueError::MissingOutput { .. }));
  }

  #[test]
  fn test_output_ref_display() {
    assert_eq!(
      OutputRef::new("website", "website_endpoint").to_string(),
      "website.website_endpoint"
    );
  }
}
