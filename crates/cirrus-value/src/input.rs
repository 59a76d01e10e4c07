use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::deferred::{Deferred, Resolution};
use crate::error::ValueError;
use crate::output::{OutputRef, RealizedOutputs};

/// Rendered in place of values that are not known yet during a preview.
pub const UNKNOWN_PLACEHOLDER: &str = "<unknown>";

/// A resource input: literal, deferred, or a composite nesting either.
#[derive(Debug, Clone)]
pub enum InputValue {
  Literal(Value),
  Deferred(Deferred),
  List(Vec<InputValue>),
  Record(BTreeMap<String, InputValue>),
}

impl InputValue {
  pub fn list<I, V>(items: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<InputValue>,
  {
    InputValue::List(items.into_iter().map(Into::into).collect())
  }

  pub fn record<I, K, V>(entries: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<InputValue>,
  {
    InputValue::Record(
      entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    )
  }

  /// Whether any deferred value appears anywhere inside this input.
  pub fn is_deferred(&self) -> bool {
    match self {
      InputValue::Literal(_) => false,
      InputValue::Deferred(_) => true,
      InputValue::List(items) => items.iter().any(InputValue::is_deferred),
      InputValue::Record(entries) => entries.values().any(InputValue::is_deferred),
    }
  }

  /// Every output this input depends on.
  pub fn references(&self) -> BTreeSet<OutputRef> {
    let mut references = BTreeSet::new();
    self.collect_references(&mut references);
    references
  }

  fn collect_references(&self, out: &mut BTreeSet<OutputRef>) {
    match self {
      InputValue::Literal(_) => {}
      InputValue::Deferred(deferred) => deferred.collect_references(out),
      InputValue::List(items) => items.iter().for_each(|item| item.collect_references(out)),
      InputValue::Record(entries) => entries.values().for_each(|v| v.collect_references(out)),
    }
  }

  /// Resolve to concrete JSON, resolving every nested deferred value.
  pub fn resolve(&self, outputs: &RealizedOutputs) -> Result<Value, ValueError> {
    match self {
      InputValue::Literal(value) => Ok(value.clone()),
      InputValue::Deferred(deferred) => deferred.resolve(outputs),
      InputValue::List(items) => items
        .iter()
        .map(|item| item.resolve(outputs))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      InputValue::Record(entries) => {
        let mut resolved = serde_json::Map::new();
        for (key, value) in entries {
          resolved.insert(key.clone(), value.resolve(outputs)?);
        }
        Ok(Value::Object(resolved))
      }
    }
  }

  /// Resolve what is known, rendering unknown values as [`UNKNOWN_PLACEHOLDER`].
  pub fn preview(&self, outputs: &RealizedOutputs) -> Result<Value, ValueError> {
    match self {
      InputValue::Literal(value) => Ok(value.clone()),
      InputValue::Deferred(deferred) => match deferred.preview(outputs)? {
        Resolution::Known(value) => Ok(value),
        Resolution::Unknown => Ok(Value::String(UNKNOWN_PLACEHOLDER.to_string())),
      },
      InputValue::List(items) => items
        .iter()
        .map(|item| item.preview(outputs))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      InputValue::Record(entries) => {
        let mut resolved = serde_json::Map::new();
        for (key, value) in entries {
          resolved.insert(key.clone(), value.preview(outputs)?);
        }
        Ok(Value::Object(resolved))
      }
    }
  }
}

impl From<Value> for InputValue {
  fn from(value: Value) -> Self {
    InputValue::Literal(value)
  }
}

impl From<Deferred> for InputValue {
  fn from(deferred: Deferred) -> Self {
    InputValue::Deferred(deferred)
  }
}

impl From<&Deferred> for InputValue {
  fn from(deferred: &Deferred) -> Self {
    InputValue::Deferred(deferred.clone())
  }
}

impl From<&str> for InputValue {
  fn from(value: &str) -> Self {
    InputValue::Literal(Value::String(value.to_string()))
  }
}

impl From<String> for InputValue {
  fn from(value: String) -> Self {
    InputValue::Literal(Value::String(value))
  }
}

impl From<bool> for InputValue {
  fn from(value: bool) -> Self {
    InputValue::Literal(Value::Bool(value))
  }
}

impl From<Vec<InputValue>> for InputValue {
  fn from(items: Vec<InputValue>) -> Self {
    InputValue::List(items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::OutputMap;
  use serde_json::json;

  fn realized_bucket() -> RealizedOutputs {
    let mut outputs = OutputMap::new();
    outputs.insert("id".to_string(), json!("site-1234567"));
    let mut realized = RealizedOutputs::new();
    realized.record("bucket", outputs).unwrap();
    realized
  }

  fn policy_statement() -> InputValue {
    let object_arn = Deferred::output("bucket", "id")
      .map(|id| json!(format!("arn:aws:s3:::{}/*", id.as_str().unwrap_or_default())));
    InputValue::record([
      ("Effect", InputValue::from("Allow")),
      ("Principal", InputValue::from("*")),
      ("Action", InputValue::list(["s3:GetObject"])),
      ("Resource", InputValue::list([object_arn])),
    ])
  }

  #[test]
  fn test_literal_is_not_deferred() {
    let input = InputValue::record([("index_document", "index.html")]);
    assert!(!input.is_deferred());
    assert!(input.references().is_empty());
  }

  #[test]
  fn test_composite_resolves_nested_references() {
    let input = InputValue::record([
      ("Version", InputValue::from("2012-10-17")),
      ("Statement", InputValue::list([policy_statement()])),
    ]);
    assert!(input.is_deferred());

    let resolved = input.resolve(&realized_bucket()).unwrap();
    assert_eq!(
      resolved,
      json!({
        "Version": "2012-10-17",
        "Statement": [{
          "Effect": "Allow",
          "Principal": "*",
          "Action": ["s3:GetObject"],
          "Resource": ["arn:aws:s3:::site-1234567/*"],
        }]
      })
    );
  }

  #[test]
  fn test_composite_fails_when_any_reference_is_unresolved() {
    let input = InputValue::list([policy_statement()]);
    assert!(matches!(
      input.resolve(&RealizedOutputs::new()),
      Err(ValueError::UnresolvedReference { .. })
    ));
  }

  #[test]
  fn test_preview_renders_placeholders() {
    let input = InputValue::record([
      ("bucket", InputValue::from(Deferred::output("bucket", "id"))),
      ("index_document", InputValue::from("index.html")),
    ]);

    let preview = input.preview(&RealizedOutputs::new()).unwrap();
    assert_eq!(
      preview,
      json!({ "bucket": UNKNOWN_PLACEHOLDER, "index_document": "index.html" })
    );
  }
}
