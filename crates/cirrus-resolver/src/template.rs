//! Lowering of JSON inputs into typed input values.
//!
//! Strings containing `{{ ... }}` or `{% ... %}` are minijinja templates.
//! Every `resource.attribute` path in a template becomes a reference to that
//! output, and the template itself becomes a deferred value rendered once all
//! of its references are realized.
//!
//! ```json
//! { "bucket": "{{ bucket.id }}", "url": "https://{{ cdn.domain_name | lower }}" }
//! ```
//!
//! Attribute paths inside templates must start at a resource id. Loop
//! variables with attribute access are not supported.

use std::collections::{BTreeSet, HashSet};

use cirrus_value::{Deferred, InputValue, OutputRef};
use minijinja::Environment;
use serde_json::Value;

use crate::error::ResolveError;

const KEYWORDS: &[&str] = &[
  "and", "or", "not", "in", "is", "if", "else", "elif", "endif", "for", "endfor", "true", "false",
  "none", "True", "False", "None", "set", "endset", "with", "endwith", "loop", "recursive", "macro",
  "endmacro", "call", "endcall", "filter", "endfilter", "raw", "endraw",
];

/// Lower one JSON input into an [`InputValue`].
///
/// Composites without any template collapse back into a single literal.
pub(crate) fn lower_input(
  value: &Value,
  location: &str,
  resource_ids: &HashSet<String>,
) -> Result<InputValue, ResolveError> {
  match value {
    Value::String(s) if is_template(s) => lower_template(s, location, resource_ids),
    Value::Array(items) => {
      let lowered = items
        .iter()
        .enumerate()
        .map(|(i, item)| lower_input(item, &format!("{location}[{i}]"), resource_ids))
        .collect::<Result<Vec<_>, _>>()?;

      match lowered.iter().map(as_literal).collect::<Option<Vec<_>>>() {
        Some(values) => Ok(InputValue::Literal(Value::Array(values))),
        None => Ok(InputValue::List(lowered)),
      }
    }
    Value::Object(entries) => {
      let lowered = entries
        .iter()
        .map(|(key, item)| {
          lower_input(item, &format!("{location}.{key}"), resource_ids).map(|v| (key.clone(), v))
        })
        .collect::<Result<Vec<_>, _>>()?;

      let literal = lowered
        .iter()
        .map(|(key, v)| as_literal(v).map(|v| (key.clone(), v)))
        .collect::<Option<serde_json::Map<_, _>>>();
      match literal {
        Some(map) => Ok(InputValue::Literal(Value::Object(map))),
        None => Ok(InputValue::record(lowered)),
      }
    }
    _ => Ok(InputValue::Literal(value.clone())),
  }
}

fn as_literal(input: &InputValue) -> Option<Value> {
  match input {
    InputValue::Literal(value) => Some(value.clone()),
    _ => None,
  }
}

fn is_template(s: &str) -> bool {
  s.contains("{{") || s.contains("{%")
}

/// Check if a string is a pure template expression (just `{{ expr }}`).
fn is_pure_template(s: &str) -> bool {
  let trimmed = s.trim();
  trimmed.starts_with("{{")
    && trimmed.ends_with("}}")
    && trimmed.matches("{{").count() == 1
    && trimmed.matches("}}").count() == 1
}

fn lower_template(
  source: &str,
  location: &str,
  resource_ids: &HashSet<String>,
) -> Result<InputValue, ResolveError> {
  let invalid = |e: minijinja::Error| ResolveError::InvalidTemplate {
    location: location.to_string(),
    message: e.to_string(),
  };

  let env = Environment::new();
  env.template_from_str(source).map_err(invalid)?;

  let references = template_references(source, location, resource_ids)?;
  let pure = is_pure_template(source);
  // A filter's output is text; only an unfiltered expression keeps its JSON type.
  let reparse = pure && !has_filter(source);

  if references.is_empty() {
    return render(source, &[], &[], reparse)
      .map(InputValue::Literal)
      .map_err(invalid);
  }

  // `{{ bucket.id }}` passes the output through untouched.
  if pure && references.len() == 1 {
    let reference = references.iter().next().cloned();
    if let Some(reference) = reference {
      if expression_body(source) == Some(reference.to_string()) {
        return Ok(Deferred::output(reference.node_id, reference.attribute).into());
      }
    }
  }

  let references: Vec<OutputRef> = references.into_iter().collect();
  let inputs: Vec<Deferred> = references
    .iter()
    .map(|r| Deferred::output(r.node_id.clone(), r.attribute.clone()))
    .collect();
  let source = source.to_string();

  Ok(
    Deferred::try_combine(inputs, move |values| render(&source, &references, values, reparse))
      .into(),
  )
}

/// Render `source` with each reference bound to its resolved value.
fn render(
  source: &str,
  references: &[OutputRef],
  values: &[Value],
  reparse: bool,
) -> Result<Value, minijinja::Error> {
  let mut context = serde_json::Map::new();
  for (reference, value) in references.iter().zip(values) {
    let node = context
      .entry(reference.node_id.clone())
      .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(attributes) = node {
      attributes.insert(reference.attribute.clone(), value.clone());
    }
  }

  let rendered = Environment::new().render_str(source, Value::Object(context))?;

  // If the entire string was a template, try to parse the result as JSON
  if reparse {
    if let Ok(parsed) = serde_json::from_str(&rendered) {
      return Ok(parsed);
    }
  }
  Ok(Value::String(rendered))
}

/// Whether a pure template's expression pipes through a filter.
fn has_filter(source: &str) -> bool {
  let Some(body) = expression_body(source) else {
    return false;
  };
  let mut quote = None;
  for c in body.chars() {
    match (quote, c) {
      (Some(q), c) if c == q => quote = None,
      (Some(_), _) => {}
      (None, '"' | '\'') => quote = Some(c),
      (None, '|') => return true,
      (None, _) => {}
    }
  }
  false
}

/// The trimmed expression inside a pure `{{ ... }}` template.
fn expression_body(source: &str) -> Option<String> {
  let trimmed = source.trim();
  let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
  let inner = inner.strip_prefix('-').unwrap_or(inner);
  let inner = inner.strip_suffix('-').unwrap_or(inner);
  Some(inner.trim().to_string())
}

/// Collect every output a template refers to.
fn template_references(
  source: &str,
  location: &str,
  resource_ids: &HashSet<String>,
) -> Result<BTreeSet<OutputRef>, ResolveError> {
  let mut references = BTreeSet::new();

  for block in expression_blocks(source) {
    for path in scan_paths(block) {
      match path.as_slice() {
        [node, attribute, ..] => {
          references.insert(OutputRef::new(node.clone(), attribute.clone()));
        }
        [name] if resource_ids.contains(name) => {
          return Err(ResolveError::InvalidReference {
            location: location.to_string(),
            reference: name.clone(),
          });
        }
        // Free variables that are not resources render as undefined.
        _ => {}
      }
    }
  }

  Ok(references)
}

/// Bodies of every `{{ ... }}` and `{% ... %}` block.
fn expression_blocks(source: &str) -> Vec<&str> {
  let mut blocks = Vec::new();
  let mut rest = source;

  loop {
    let open = match (rest.find("{{"), rest.find("{%")) {
      (Some(a), Some(b)) => a.min(b),
      (Some(a), None) | (None, Some(a)) => a,
      (None, None) => break,
    };
    let close = if rest[open..].starts_with("{{") { "}}" } else { "%}" };
    let body = &rest[open + 2..];

    match body.find(close) {
      Some(end) => {
        blocks.push(&body[..end]);
        rest = &body[end + 2..];
      }
      None => break,
    }
  }

  blocks
}

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

fn read_ident(chars: &[char], i: &mut usize) -> String {
  let start = *i;
  while *i < chars.len() && is_ident_char(chars[*i]) {
    *i += 1;
  }
  chars[start..*i].iter().collect()
}

/// Dotted variable paths in one expression, skipping string literals,
/// numbers, filter and test names, function calls and keywords.
fn scan_paths(expr: &str) -> Vec<Vec<String>> {
  let chars: Vec<char> = expr.chars().collect();
  let mut paths = Vec::new();
  let mut i = 0;
  let mut after_dot = false;
  let mut skip_next = false;

  while i < chars.len() {
    let c = chars[i];

    if c == '"' || c == '\'' {
      i += 1;
      while i < chars.len() && chars[i] != c {
        if chars[i] == '\\' {
          i += 1;
        }
        i += 1;
      }
      i += 1;
      after_dot = false;
      continue;
    }

    if c.is_ascii_digit() {
      while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '.') {
        i += 1;
      }
      after_dot = false;
      continue;
    }

    if is_ident_start(c) {
      let mut path = vec![read_ident(&chars, &mut i)];
      while i + 1 < chars.len() && chars[i] == '.' && is_ident_start(chars[i + 1]) {
        i += 1;
        path.push(read_ident(&chars, &mut i));
      }

      let called = chars[i..].iter().find(|c| !c.is_whitespace()) == Some(&'(');
      let was_after_dot = after_dot;
      after_dot = false;

      let head = path[0].as_str();
      if path.len() == 1 && head == "not" {
        continue;
      }
      if skip_next {
        skip_next = false;
        continue;
      }
      if path.len() == 1 && head == "is" {
        skip_next = true;
        continue;
      }
      if was_after_dot || called || KEYWORDS.contains(&head) {
        continue;
      }
      paths.push(path);
      continue;
    }

    match c {
      '.' => after_dot = true,
      '|' => {
        skip_next = true;
        after_dot = false;
      }
      c if c.is_whitespace() => {}
      _ => after_dot = false,
    }
    i += 1;
  }

  paths
}

#[cfg(test)]
mod tests {
  use super::*;
  use cirrus_value::{OutputMap, RealizedOutputs};
  use serde_json::json;

  fn ids(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  fn realized(node: &str, outputs: Value) -> RealizedOutputs {
    let outputs: OutputMap = serde_json::from_value(outputs).unwrap();
    let mut realized = RealizedOutputs::new();
    realized.record(node, outputs).unwrap();
    realized
  }

  #[test]
  fn test_scan_skips_filters_strings_and_calls() {
    let source = r#" bucket.id | replace("a.b", other) ~ range(3) ~ cdn.domain_name | upper "#;
    let paths = scan_paths(source);
    assert_eq!(
      paths,
      vec![
        vec!["bucket".to_string(), "id".to_string()],
        vec!["other".to_string()],
        vec!["cdn".to_string(), "domain_name".to_string()],
      ]
    );
  }

  #[test]
  fn test_scan_skips_tests_and_keywords() {
    let paths = scan_paths(" bucket.tags is not none and true ");
    assert_eq!(paths, vec![vec!["bucket".to_string(), "tags".to_string()]]);
  }

  #[test]
  fn test_plain_strings_stay_literal() {
    let input = lower_input(&json!("index.html"), "website.index", &ids(&[])).unwrap();
    assert!(matches!(input, InputValue::Literal(Value::String(s)) if s == "index.html"));
  }

  #[test]
  fn test_template_without_references_renders_at_lowering() {
    let input = lower_input(&json!("{{ 'abc' | upper }}"), "x", &ids(&[])).unwrap();
    assert!(matches!(input, InputValue::Literal(Value::String(s)) if s == "ABC"));
  }

  #[test]
  fn test_pure_reference_keeps_json_type() {
    let input = lower_input(&json!("{{ bucket.tags }}"), "cdn.tags", &ids(&["bucket"])).unwrap();
    let outputs = realized("bucket", json!({ "tags": { "env": "prod" } }));
    assert_eq!(input.resolve(&outputs).unwrap(), json!({ "env": "prod" }));
  }

  #[test]
  fn test_embedded_reference_renders_string() {
    let input = lower_input(
      &json!("arn:aws:s3:::{{ bucket.id }}/*"),
      "policy.policy",
      &ids(&["bucket"]),
    )
    .unwrap();
    assert_eq!(
      input.references().into_iter().collect::<Vec<_>>(),
      vec![OutputRef::new("bucket", "id")]
    );

    let outputs = realized("bucket", json!({ "id": "site-abc1234" }));
    assert_eq!(input.resolve(&outputs).unwrap(), json!("arn:aws:s3:::site-abc1234/*"));
  }

  #[test]
  fn test_nested_composite_keeps_literals() {
    let input = lower_input(
      &json!({
        "Version": "2012-10-17",
        "Statement": [{ "Effect": "Allow", "Resource": ["arn:aws:s3:::{{ bucket.id }}/*"] }]
      }),
      "policy.policy",
      &ids(&["bucket"]),
    )
    .unwrap();
    assert!(input.is_deferred());

    let outputs = realized("bucket", json!({ "id": "site-abc1234" }));
    let resolved = input.resolve(&outputs).unwrap();
    assert_eq!(resolved["Version"], json!("2012-10-17"));
    assert_eq!(resolved["Statement"][0]["Resource"][0], json!("arn:aws:s3:::site-abc1234/*"));
  }

  #[test]
  fn test_filters_apply_after_resolution() {
    let input = lower_input(&json!("{{ bucket.id | upper }}"), "x", &ids(&["bucket"])).unwrap();
    let outputs = realized("bucket", json!({ "id": "site" }));
    assert_eq!(input.resolve(&outputs).unwrap(), json!("SITE"));
  }

  #[test]
  fn test_filtered_output_stays_a_string() {
    let input = lower_input(&json!("{{ bucket.id | lower }}"), "x", &ids(&["bucket"])).unwrap();
    let outputs = realized("bucket", json!({ "id": "123" }));
    assert_eq!(input.resolve(&outputs).unwrap(), json!("123"));
  }

  #[test]
  fn test_pipe_inside_string_literal_is_not_a_filter() {
    assert!(has_filter("{{ bucket.id | lower }}"));
    assert!(!has_filter("{{ bucket.id ~ '|' }}"));
    assert!(!has_filter("prefix-{{ bucket.id | lower }}"));
  }

  #[test]
  fn test_syntax_error_is_invalid_template() {
    let err =
      lower_input(&json!("{{ bucket.id "), "website.bucket", &ids(&["bucket"])).unwrap_err();
    assert!(matches!(
      err,
      ResolveError::InvalidTemplate { location, .. } if location == "website.bucket"
    ));
  }

  #[test]
  fn test_bare_resource_name_is_rejected() {
    let err =
      lower_input(&json!("{{ bucket }}"), "website.bucket", &ids(&["bucket"])).unwrap_err();
    assert!(matches!(
      err,
      ResolveError::InvalidReference { reference, .. } if reference == "bucket"
    ));
  }
}
