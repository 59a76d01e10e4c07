use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDef {
  pub stack_id: String,
  pub name: String,
  pub resources: Vec<ResourceDef>,
  /// Export name to template, e.g. `"bucket_name": "{{ bucket.id }}"`.
  #[serde(default)]
  pub exports: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ResourceKind;

  #[test]
  fn test_parse_stack_definition() {
    let json = r#"{
      "stack_id": "site",
      "name": "Static site",
      "resources": [
        { "name": "bucket", "kind": "bucket" },
        {
          "name": "policy",
          "kind": "access_policy",
          "inputs": { "bucket": "{{ bucket.id }}" },
          "depends_on": ["access"]
        }
      ],
      "exports": { "bucket_name": "{{ bucket.id }}" }
    }"#;

    let def: StackDef = serde_json::from_str(json).unwrap();
    assert_eq!(def.resources.len(), 2);
    assert_eq!(def.resources[0].kind, ResourceKind::Bucket);
    assert!(def.resources[0].inputs.is_empty());
    assert_eq!(def.resources[1].depends_on, vec!["access".to_string()]);
    assert_eq!(def.exports["bucket_name"], "{{ bucket.id }}");
  }

  #[test]
  fn test_unknown_kind_is_rejected() {
    let json = r#"{
      "stack_id": "site",
      "name": "Static site",
      "resources": [{ "name": "queue", "kind": "queue" }]
    }"#;

    assert!(serde_json::from_str::<StackDef>(json).is_err());
  }
}
