use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ValueError;
use crate::output::{OutputRef, RealizedOutputs};

type ApplyFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A value that is not known until one or more resources are realized.
///
/// Building a `Deferred` never evaluates anything. Transformations registered
/// with [`map`](Deferred::map) or [`combine`](Deferred::combine) run only when
/// the value is resolved or previewed, so they must be pure.
///
/// ```ignore
/// let bucket_id = Deferred::output("bucket", "id");
/// let resource = bucket_id.try_map(|id| match id.as_str() {
///   Some(id) => Ok(json!(format!("arn:aws:s3:::{id}/*"))),
///   None => Err("bucket id must be a string"),
/// });
/// ```
#[derive(Clone)]
pub struct Deferred {
  kind: Arc<DeferredKind>,
}

enum DeferredKind {
  Output(OutputRef),
  Apply {
    inputs: Vec<Deferred>,
    f: Arc<ApplyFn>,
  },
}

/// Outcome of previewing a deferred value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  Known(Value),
  Unknown,
}

impl Deferred {
  /// Defer on a single output of a resource.
  pub fn output(node_id: impl Into<String>, attribute: impl Into<String>) -> Self {
    Self {
      kind: Arc::new(DeferredKind::Output(OutputRef::new(node_id, attribute))),
    }
  }

  /// Transform the eventual value.
  pub fn map<F>(&self, f: F) -> Self
  where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
  {
    self.try_map(move |value| Ok::<_, String>(f(value)))
  }

  /// Transform the eventual value with a function that may fail.
  pub fn try_map<F, E>(&self, f: F) -> Self
  where
    F: Fn(&Value) -> Result<Value, E> + Send + Sync + 'static,
    E: fmt::Display,
  {
    Self::try_combine([self.clone()], move |values| f(&values[0]))
  }

  /// Join several deferred values. `f` receives the resolved inputs in order.
  pub fn combine<I, F>(inputs: I, f: F) -> Self
  where
    I: IntoIterator<Item = Deferred>,
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
  {
    Self::try_combine(inputs, move |values| Ok::<_, String>(f(values)))
  }

  /// Join several deferred values with a function that may fail.
  pub fn try_combine<I, F, E>(inputs: I, f: F) -> Self
  where
    I: IntoIterator<Item = Deferred>,
    F: Fn(&[Value]) -> Result<Value, E> + Send + Sync + 'static,
    E: fmt::Display,
  {
    let f: Arc<ApplyFn> = Arc::new(move |values: &[Value]| f(values).map_err(|e| e.to_string()));
    Self {
      kind: Arc::new(DeferredKind::Apply {
        inputs: inputs.into_iter().collect(),
        f,
      }),
    }
  }

  /// The output this value reads directly, if it is a plain reference.
  pub fn as_output(&self) -> Option<&OutputRef> {
    match self.kind.as_ref() {
      DeferredKind::Output(reference) => Some(reference),
      DeferredKind::Apply { .. } => None,
    }
  }

  /// Every output this value transitively depends on.
  pub fn references(&self) -> BTreeSet<OutputRef> {
    let mut references = BTreeSet::new();
    self.collect_references(&mut references);
    references
  }

  pub(crate) fn collect_references(&self, out: &mut BTreeSet<OutputRef>) {
    match self.kind.as_ref() {
      DeferredKind::Output(reference) => {
        out.insert(reference.clone());
      }
      DeferredKind::Apply { inputs, .. } => {
        for input in inputs {
          input.collect_references(out);
        }
      }
    }
  }

  /// Resolve against realized outputs.
  ///
  /// Fails with [`ValueError::UnresolvedReference`] if any producer has not
  /// been realized.
  pub fn resolve(&self, outputs: &RealizedOutputs) -> Result<Value, ValueError> {
    match self.kind.as_ref() {
      DeferredKind::Output(reference) => outputs.get(reference).cloned(),
      DeferredKind::Apply { inputs, f } => {
        let values = inputs
          .iter()
          .map(|input| input.resolve(outputs))
          .collect::<Result<Vec<_>, _>>()?;
        f(&values).map_err(|message| ValueError::ApplyFailed { message })
      }
    }
  }

  /// Resolve as far as possible without failing on unrealized producers.
  ///
  /// Transformations run only when all of their inputs are known.
  pub fn preview(&self, outputs: &RealizedOutputs) -> Result<Resolution, ValueError> {
    match self.kind.as_ref() {
      DeferredKind::Output(reference) => match outputs.get(reference) {
        Ok(value) => Ok(Resolution::Known(value.clone())),
        Err(ValueError::UnresolvedReference { .. }) => Ok(Resolution::Unknown),
        Err(e) => Err(e),
      },
      DeferredKind::Apply { inputs, f } => {
        let mut values = Vec::with_capacity(inputs.len());
        for input in inputs {
          match input.preview(outputs)? {
            Resolution::Known(value) => values.push(value),
            Resolution::Unknown => return Ok(Resolution::Unknown),
          }
        }
        f(&values)
          .map(Resolution::Known)
          .map_err(|message| ValueError::ApplyFailed { message })
      }
    }
  }
}

impl fmt::Debug for Deferred {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind.as_ref() {
      DeferredKind::Output(reference) => write!(f, "Deferred({reference})"),
      DeferredKind::Apply { inputs, .. } => f.debug_tuple("Deferred::Apply").field(inputs).finish(),
    }
  }
}
