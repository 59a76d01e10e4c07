//! Stack apply engine.
//!
//! The `ApplyEngine` walks a validated stack and realizes each resource
//! through a provider once every resource it depends on has been realized.
//! Independent resources realize concurrently.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use cirrus_asset::AssetStore;
use cirrus_config::ResourceKind;
use cirrus_provider::{
  Provider, RealizeRequest, RealizeResponse, SOURCE_DIGEST_INPUT, SOURCE_SIZE_INPUT,
};
use cirrus_stack::{Resource, Stack};
use cirrus_value::RealizedOutputs;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, instrument, warn};

use crate::error::{ApplyError, NodeError};
use crate::events::{ApplyEvent, ApplyNotifier, NoopNotifier};
use crate::report::{ApplyReport, NodeOutcome, SkipCause};

/// Configuration for the apply engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Upper bound on provider calls in flight at once.
  pub max_concurrency: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_concurrency: 10,
    }
  }
}

type RealizeOutcome = (String, Result<RealizeResponse, NodeError>);

/// The stack apply engine.
///
/// Generic over `N: ApplyNotifier` to allow different notification strategies.
/// Use `ApplyEngine::new()` for an engine with no-op notifications, or
/// `ApplyEngine::with_notifier()` to observe events.
pub struct ApplyEngine<N: ApplyNotifier = NoopNotifier> {
  provider: Arc<dyn Provider>,
  assets: Arc<dyn AssetStore>,
  config: EngineConfig,
  notifier: N,
}

impl ApplyEngine<NoopNotifier> {
  pub fn new(
    provider: Arc<dyn Provider>,
    assets: Arc<dyn AssetStore>,
    config: EngineConfig,
  ) -> Self {
    Self::with_notifier(provider, assets, config, NoopNotifier)
  }
}

/// Mutable state of one apply run, owned by the scheduling loop.
struct Run<'a> {
  stack: &'a Stack,
  run_id: String,
  pending: BTreeSet<String>,
  realized: RealizedOutputs,
  outcomes: BTreeMap<String, NodeOutcome>,
  realize_order: Vec<String>,
  /// Node id of every realize task still in flight.
  tasks: HashMap<task::Id, String>,
}

impl<N: ApplyNotifier> ApplyEngine<N> {
  pub fn with_notifier(
    provider: Arc<dyn Provider>,
    assets: Arc<dyn AssetStore>,
    config: EngineConfig,
    notifier: N,
  ) -> Self {
    Self {
      provider,
      assets,
      config,
      notifier,
    }
  }

  /// Apply a stack.
  ///
  /// Resource failures do not abort the run, and neither does a panicking
  /// provider call: the failed resource's descendants are skipped and
  /// independent branches continue. Cancelling
  /// `cancel` stops scheduling, aborts in-flight provider calls and reports
  /// every unfinished resource as skipped.
  #[instrument(
    name = "stack_apply",
    skip_all,
    fields(stack_id = %stack.stack_id(), provider = %self.provider.name())
  )]
  pub async fn apply(
    &self,
    stack: &Stack,
    cancel: CancellationToken,
  ) -> Result<ApplyReport, ApplyError> {
    let run_id = uuid::Uuid::new_v4().to_string();

    info!(run_id = %run_id, resources = stack.len(), "apply_started");
    self.notifier.notify(ApplyEvent::ApplyStarted {
      run_id: run_id.clone(),
      stack_id: stack.stack_id().to_string(),
    });

    let mut run = Run {
      stack,
      run_id,
      pending: stack.resources().map(|r| r.id.clone()).collect(),
      realized: RealizedOutputs::new(),
      outcomes: BTreeMap::new(),
      realize_order: Vec::new(),
      tasks: HashMap::new(),
    };
    let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
    let mut running: JoinSet<RealizeOutcome> = JoinSet::new();
    let mut cancelled = false;

    loop {
      if cancel.is_cancelled() {
        cancelled = true;
        break;
      }

      for node_id in self.find_ready_nodes(&run) {
        run.pending.remove(&node_id);
        self.start_node(&mut run, &node_id, &semaphore, &mut running);
      }

      if running.is_empty() {
        break;
      }

      let joined = tokio::select! {
        joined = running.join_next_with_id() => joined,
        _ = cancel.cancelled() => {
          cancelled = true;
          break;
        }
      };

      match joined {
        Some(Ok((task_id, (node_id, result)))) => {
          run.tasks.remove(&task_id);
          match result {
            Ok(response) => self.record_realized(&mut run, node_id, response)?,
            Err(e) => self.fail_node(&mut run, &node_id, e),
          }
        }
        Some(Err(e)) => {
          // A panicked task only takes down its own node.
          let Some(node_id) = run.tasks.remove(&e.id()) else {
            continue;
          };
          let message = e.to_string();
          self.fail_node(&mut run, &node_id, NodeError::Panicked { message });
        }
        None => break,
      }
    }

    if cancelled {
      warn!(run_id = %run.run_id, "apply cancelled");
      running.abort_all();
      self.skip_unfinished(&mut run);
    }

    let (exports, unavailable_exports) = resolve_exports(stack, &run.realized);

    let report = ApplyReport {
      run_id: run.run_id,
      stack_id: stack.stack_id().to_string(),
      outcomes: run.outcomes,
      realize_order: run.realize_order,
      exports,
      unavailable_exports,
      outputs: run.realized,
      cancelled,
    };

    let succeeded = report.succeeded();
    info!(
      run_id = %report.run_id,
      realized = report.realize_order.len(),
      mutations = report.mutations(),
      succeeded,
      "apply_completed"
    );
    self.notifier.notify(ApplyEvent::ApplyCompleted {
      run_id: report.run_id.clone(),
      succeeded,
    });

    Ok(report)
  }

  /// Find pending nodes whose upstream nodes have all realized.
  fn find_ready_nodes(&self, run: &Run<'_>) -> Vec<String> {
    let graph = run.stack.graph();

    run
      .pending
      .iter()
      .filter(|id| graph.upstream(id).all(|up| run.realized.is_realized(up)))
      .cloned()
      .collect()
  }

  /// Resolve a ready node's inputs and spawn its realize call.
  fn start_node(
    &self,
    run: &mut Run<'_>,
    node_id: &str,
    semaphore: &Arc<Semaphore>,
    running: &mut JoinSet<RealizeOutcome>,
  ) {
    let stack = run.stack;
    let Some(resource) = stack.get(node_id) else {
      return;
    };

    let inputs = match resolve_inputs(resource, &run.realized) {
      Ok(inputs) => inputs,
      Err(e) => {
        self.fail_node(run, node_id, e);
        return;
      }
    };

    self.notifier.notify(ApplyEvent::NodeStarted {
      run_id: run.run_id.clone(),
      node_id: node_id.to_string(),
    });

    let request = RealizeRequest {
      node_id: node_id.to_string(),
      kind: resource.kind,
      inputs,
    };
    let provider = self.provider.clone();
    let assets = self.assets.clone();
    let semaphore = semaphore.clone();
    let span = info_span!("node_realize", node_id = %node_id, kind = %resource.kind);

    let handle = running.spawn(
      async move {
        // The semaphore is never closed.
        let _permit = semaphore.acquire_owned().await.ok();
        let node_id = request.node_id.clone();
        (node_id, realize_node(provider, assets, request).await)
      }
      .instrument(span),
    );
    run.tasks.insert(handle.id(), node_id.to_string());
  }

  fn record_realized(
    &self,
    run: &mut Run<'_>,
    node_id: String,
    response: RealizeResponse,
  ) -> Result<(), ApplyError> {
    info!(node_id = %node_id, action = %response.action, "node_realized");
    self.notifier.notify(ApplyEvent::NodeRealized {
      run_id: run.run_id.clone(),
      node_id: node_id.clone(),
      action: response.action,
      outputs: response.outputs.clone(),
    });

    run.realized.record(node_id.clone(), response.outputs)?;
    run.outcomes.insert(
      node_id.clone(),
      NodeOutcome::Realized {
        action: response.action,
      },
    );
    run.realize_order.push(node_id);
    Ok(())
  }

  /// Mark a node failed and skip every pending descendant.
  fn fail_node(&self, run: &mut Run<'_>, node_id: &str, e: NodeError) {
    error!(node_id = %node_id, error = %e, "node_failed");
    self.notifier.notify(ApplyEvent::NodeFailed {
      run_id: run.run_id.clone(),
      node_id: node_id.to_string(),
      error: e.to_string(),
    });
    run.outcomes.insert(
      node_id.to_string(),
      NodeOutcome::Failed {
        reason: e.to_string(),
      },
    );

    for descendant in run.stack.graph().descendants(node_id) {
      if run.pending.remove(&descendant) {
        self.skip_node(
          run,
          descendant,
          SkipCause::DependencyFailed {
            dependency: node_id.to_string(),
          },
        );
      }
    }
  }

  /// Skip every node without an outcome after cancellation.
  fn skip_unfinished(&self, run: &mut Run<'_>) {
    let unfinished: Vec<String> = run
      .stack
      .resources()
      .filter(|r| !run.outcomes.contains_key(&r.id))
      .map(|r| r.id.clone())
      .collect();

    run.pending.clear();
    for node_id in unfinished {
      self.skip_node(run, node_id, SkipCause::Cancelled);
    }
  }

  fn skip_node(&self, run: &mut Run<'_>, node_id: String, cause: SkipCause) {
    let outcome = NodeOutcome::Skipped { cause };
    warn!(node_id = %node_id, reason = %outcome, "node_skipped");
    self.notifier.notify(ApplyEvent::NodeSkipped {
      run_id: run.run_id.clone(),
      node_id: node_id.clone(),
      reason: outcome.to_string(),
    });
    run.outcomes.insert(node_id, outcome);
  }
}

/// Resolve every input of a resource against the outputs realized so far.
fn resolve_inputs(
  resource: &Resource,
  realized: &RealizedOutputs,
) -> Result<Map<String, Value>, NodeError> {
  let mut resolved = Map::new();
  for (name, input) in &resource.inputs {
    let value = input.resolve(realized).map_err(NodeError::Input)?;
    resolved.insert(name.clone(), value);
  }
  Ok(resolved)
}

/// Load the upload asset if needed, then call the provider.
async fn realize_node(
  provider: Arc<dyn Provider>,
  assets: Arc<dyn AssetStore>,
  mut request: RealizeRequest,
) -> Result<RealizeResponse, NodeError> {
  if request.kind == ResourceKind::UploadedObject {
    let source = request
      .inputs
      .get("source")
      .and_then(Value::as_str)
      .ok_or(NodeError::InvalidSource)?;
    let asset = assets.load(source).await?;

    request
      .inputs
      .insert(SOURCE_DIGEST_INPUT.to_string(), json!(asset.digest));
    request
      .inputs
      .insert(SOURCE_SIZE_INPUT.to_string(), json!(asset.size));
  }

  Ok(provider.realize(request).await?)
}

/// Resolve exports, splitting them into available and unavailable.
fn resolve_exports(
  stack: &Stack,
  realized: &RealizedOutputs,
) -> (BTreeMap<String, Value>, BTreeMap<String, String>) {
  let mut exports = BTreeMap::new();
  let mut unavailable = BTreeMap::new();

  for (name, value) in stack.exports() {
    match value.resolve(realized) {
      Ok(value) => {
        exports.insert(name.clone(), value);
      }
      Err(e) => {
        unavailable.insert(name.clone(), e.to_string());
      }
    }
  }

  (exports, unavailable)
}
