use std::collections::{BTreeMap, BTreeSet, HashSet};

use cirrus_config::ResourceKind;
use cirrus_value::InputValue;

use crate::error::StackError;
use crate::resource::{Resource, ResourceHandle};
use crate::stack::Stack;

/// A resource declaration under construction.
#[derive(Debug, Clone)]
pub struct ResourceDecl {
  id: String,
  kind: ResourceKind,
  inputs: BTreeMap<String, InputValue>,
  depends_on: BTreeSet<String>,
}

impl ResourceDecl {
  pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
    Self {
      id: id.into(),
      kind,
      inputs: BTreeMap::new(),
      depends_on: BTreeSet::new(),
    }
  }

  pub fn input(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
    self.inputs.insert(name.into(), value.into());
    self
  }

  /// Order this resource after `handle` even without a data reference.
  pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
    self.depends_on.insert(handle.id().to_string());
    self
  }

  /// Order this resource after the resource with the given id.
  pub fn depends_on_id(mut self, id: impl Into<String>) -> Self {
    self.depends_on.insert(id.into());
    self
  }
}

/// Collects declarations for one stack and validates them into a [`Stack`].
///
/// # Usage
///
/// ```ignore
/// let mut builder = StackBuilder::new("site", "Static site");
/// let bucket = builder.declare(ResourceDecl::new("bucket", ResourceKind::Bucket))?;
/// let website = builder.declare(
///   ResourceDecl::new("website", ResourceKind::WebsiteConfig)
///     .input("bucket", bucket.output("id")),
/// )?;
/// builder.export("website_url", website.output("website_endpoint"));
/// let stack = builder.build()?;
/// ```
#[derive(Debug)]
pub struct StackBuilder {
  stack_id: String,
  name: String,
  resources: Vec<Resource>,
  ids: HashSet<String>,
  exports: BTreeMap<String, InputValue>,
}

impl StackBuilder {
  pub fn new(stack_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      stack_id: stack_id.into(),
      name: name.into(),
      resources: Vec::new(),
      ids: HashSet::new(),
      exports: BTreeMap::new(),
    }
  }

  /// Declare a resource. Fails immediately on a duplicate id.
  pub fn declare(&mut self, decl: ResourceDecl) -> Result<ResourceHandle, StackError> {
    if !self.ids.insert(decl.id.clone()) {
      return Err(StackError::DuplicateNode { node_id: decl.id });
    }

    let handle = ResourceHandle::new(decl.id.clone(), decl.kind);
    self.resources.push(Resource {
      id: decl.id,
      kind: decl.kind,
      inputs: decl.inputs,
      depends_on: decl.depends_on,
    });
    Ok(handle)
  }

  /// Export a value under `name` once the stack is applied.
  pub fn export(&mut self, name: impl Into<String>, value: impl Into<InputValue>) -> &mut Self {
    self.exports.insert(name.into(), value.into());
    self
  }

  /// Validate the declarations and build the stack.
  pub fn build(self) -> Result<Stack, StackError> {
    Stack::new(self.stack_id, self.name, self.resources, self.exports)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cirrus_value::Deferred;
  use serde_json::json;

  #[test]
  fn test_declaration_order_does_not_matter() {
    let mut builder = StackBuilder::new("site", "Site");
    // The policy is declared before the bucket it references.
    builder
      .declare(
        ResourceDecl::new("policy", ResourceKind::AccessPolicy)
          .input("bucket", Deferred::output("bucket", "id"))
          .input("policy", json!({})),
      )
      .unwrap();
    builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap();

    let stack = builder.build().unwrap();
    assert_eq!(stack.graph().topological_order(), vec!["bucket", "policy"]);
    let declared: Vec<&str> = stack.resources().map(|r| r.id.as_str()).collect();
    assert_eq!(declared, vec!["policy", "bucket"]);
  }

  #[test]
  fn test_duplicate_declaration_fails_fast() {
    let mut builder = StackBuilder::new("site", "Site");
    builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap();
    let err = builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap_err();
    assert_eq!(
      err,
      StackError::DuplicateNode {
        node_id: "bucket".to_string()
      }
    );
  }

  #[test]
  fn test_explicit_dependency_adds_edge() {
    let mut builder = StackBuilder::new("site", "Site");
    let bucket = builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap();
    let access = builder
      .declare(
        ResourceDecl::new("access", ResourceKind::PublicAccessSetting)
          .input("bucket", bucket.output("id")),
      )
      .unwrap();
    builder
      .declare(
        ResourceDecl::new("policy", ResourceKind::AccessPolicy)
          .input("bucket", bucket.output("id"))
          .input("policy", json!({}))
          .depends_on(&access),
      )
      .unwrap();

    let stack = builder.build().unwrap();
    let upstream: Vec<&String> = stack.graph().upstream("policy").collect();
    assert_eq!(upstream, vec!["access", "bucket"]);
    assert_eq!(
      stack.graph().topological_order(),
      vec!["bucket", "access", "policy"]
    );
  }

  #[test]
  fn test_no_edge_without_reference_or_explicit_dependency() {
    let mut builder = StackBuilder::new("site", "Site");
    let bucket = builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap();
    builder
      .declare(
        ResourceDecl::new("access", ResourceKind::PublicAccessSetting)
          .input("bucket", bucket.output("id")),
      )
      .unwrap();
    builder
      .declare(
        ResourceDecl::new("policy", ResourceKind::AccessPolicy)
          .input("bucket", bucket.output("id"))
          .input("policy", json!({})),
      )
      .unwrap();

    let stack = builder.build().unwrap();
    assert_eq!(stack.graph().upstream("policy").count(), 1);
    assert_eq!(
      stack.graph().waves(),
      vec![vec!["bucket".to_string()], vec!["access".to_string(), "policy".to_string()]]
    );
  }

  #[test]
  fn test_cycle_is_rejected_with_both_ids() {
    let mut builder = StackBuilder::new("loop", "Loop");
    builder
      .declare(
        ResourceDecl::new("a", ResourceKind::WebsiteConfig)
          .input("bucket", Deferred::output("b", "id")),
      )
      .unwrap();
    builder
      .declare(
        ResourceDecl::new("b", ResourceKind::WebsiteConfig)
          .input("bucket", Deferred::output("a", "id")),
      )
      .unwrap();

    let err = builder.build().unwrap_err();
    match &err {
      StackError::CyclicDependency { cycle } => {
        assert!(cycle.contains(&"a".to_string()));
        assert!(cycle.contains(&"b".to_string()));
        assert_eq!(cycle.first(), cycle.last());
      }
      other => panic!("expected cycle, got {other:?}"),
    }
    assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
  }

  #[test]
  fn test_explicit_dependency_cycle_is_rejected() {
    let mut builder = StackBuilder::new("loop", "Loop");
    builder
      .declare(ResourceDecl::new("a", ResourceKind::Bucket).depends_on_id("b"))
      .unwrap();
    builder
      .declare(ResourceDecl::new("b", ResourceKind::Bucket).depends_on_id("a"))
      .unwrap();

    assert!(matches!(
      builder.build(),
      Err(StackError::CyclicDependency { .. })
    ));
  }

  #[test]
  fn test_reference_to_unknown_resource() {
    let mut builder = StackBuilder::new("site", "Site");
    builder
      .declare(
        ResourceDecl::new("website", ResourceKind::WebsiteConfig)
          .input("bucket", Deferred::output("ghost", "id")),
      )
      .unwrap();

    assert_eq!(
      builder.build().unwrap_err(),
      StackError::UnresolvedReference {
        node_id: "website".to_string(),
        producer: "ghost".to_string(),
      }
    );
  }

  #[test]
  fn test_unknown_explicit_dependency() {
    let mut builder = StackBuilder::new("site", "Site");
    builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket).depends_on_id("ghost"))
      .unwrap();

    assert!(matches!(
      builder.build(),
      Err(StackError::UnresolvedReference { .. })
    ));
  }

  #[test]
  fn test_reference_to_attribute_kind_does_not_produce() {
    let mut builder = StackBuilder::new("site", "Site");
    let bucket = builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap();
    builder.export("url", bucket.output("website_endpoint"));

    assert!(matches!(
      builder.build(),
      Err(StackError::UnknownOutput { .. })
    ));
  }

  #[test]
  fn test_missing_required_input() {
    let mut builder = StackBuilder::new("site", "Site");
    builder
      .declare(ResourceDecl::new("website", ResourceKind::WebsiteConfig))
      .unwrap();

    assert_eq!(
      builder.build().unwrap_err(),
      StackError::MissingInput {
        node_id: "website".to_string(),
        input: "bucket".to_string(),
      }
    );
  }

  #[test]
  fn test_deferred_value_in_literal_only_input() {
    let mut builder = StackBuilder::new("site", "Site");
    let bucket = builder
      .declare(ResourceDecl::new("bucket", ResourceKind::Bucket))
      .unwrap();
    builder
      .declare(
        ResourceDecl::new("upload", ResourceKind::UploadedObject)
          .input("bucket", bucket.output("id"))
          .input("source", bucket.output("arn")),
      )
      .unwrap();

    assert_eq!(
      builder.build().unwrap_err(),
      StackError::NonDeferrableInput {
        node_id: "upload".to_string(),
        input: "source".to_string(),
      }
    );
  }

  #[test]
  fn test_export_to_unknown_resource() {
    let mut builder = StackBuilder::new("site", "Site");
    builder.export("bucket_name", Deferred::output("ghost", "id"));

    assert!(matches!(
      builder.build(),
      Err(StackError::UnresolvedExport { .. })
    ));
  }
}
