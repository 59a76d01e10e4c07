use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cirrus_config::ResourceKind;
use cirrus_value::{OutputMap, RealizedOutputs};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderAction, RealizeRequest, RealizeResponse};
use crate::SOURCE_DIGEST_INPUT;

/// Hosted zone shared by every CDN distribution.
const CDN_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// The last realized state of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
  pub kind: ResourceKind,
  pub inputs: Map<String, Value>,
  pub outputs: OutputMap,
}

/// Everything the local provider has realized, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderState {
  pub records: BTreeMap<String, ResourceRecord>,
}

impl ProviderState {
  /// Outputs of every recorded resource.
  pub fn realized_outputs(&self) -> RealizedOutputs {
    self
      .records
      .iter()
      .map(|(id, record)| (id.clone(), record.outputs.clone()))
      .collect()
  }
}

/// In-process provider that simulates bucket and CDN resources.
///
/// Generated identifiers look like the real ones (`site-3f9a2c1`,
/// `d1a2b3c4d5e6f7.cloudfront.net`) and stay stable across updates. State can
/// be persisted as JSON so repeated runs are idempotent.
pub struct LocalProvider {
  region: String,
  state: RwLock<ProviderState>,
  mutations: AtomicUsize,
  failures: HashSet<String>,
}

impl LocalProvider {
  pub fn new(region: impl Into<String>) -> Self {
    Self::with_state(region, ProviderState::default())
  }

  pub fn with_state(region: impl Into<String>, state: ProviderState) -> Self {
    Self {
      region: region.into(),
      state: RwLock::new(state),
      mutations: AtomicUsize::new(0),
      failures: HashSet::new(),
    }
  }

  /// Load state from `path`, starting empty if the file does not exist.
  pub async fn load(region: impl Into<String>, path: &Path) -> Result<Self, ProviderError> {
    let state = match fs::read_to_string(path).await {
      Ok(content) => serde_json::from_str(&content)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProviderState::default(),
      Err(e) => return Err(e.into()),
    };
    Ok(Self::with_state(region, state))
  }

  /// Write the current state to `path`, creating parent directories.
  pub async fn save(&self, path: &Path) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(&*self.state.read().await)?;
    fs::write(path, content).await?;
    Ok(())
  }

  /// Reject every realize call for `node_id`.
  pub fn fail_on(mut self, node_id: impl Into<String>) -> Self {
    self.failures.insert(node_id.into());
    self
  }

  pub fn region(&self) -> &str {
    &self.region
  }

  /// Number of create and update calls made so far.
  pub fn mutation_count(&self) -> usize {
    self.mutations.load(Ordering::SeqCst)
  }

  /// A snapshot of the current state.
  pub async fn state(&self) -> ProviderState {
    self.state.read().await.clone()
  }

  fn synthesize(
    &self,
    request: &RealizeRequest,
    previous: Option<&OutputMap>,
  ) -> Result<OutputMap, ProviderError> {
    let generated = |attribute: &str, make: &dyn Fn() -> String| -> Value {
      previous
        .and_then(|outputs| outputs.get(attribute))
        .cloned()
        .unwrap_or_else(|| json!(make()))
    };
    let region = &self.region;

    let outputs = match request.kind {
      ResourceKind::Bucket => {
        let prefix = optional_str(request, "bucket_prefix").unwrap_or(&request.node_id);
        let id = match optional_str(request, "bucket") {
          Some(name) => json!(name),
          None => generated("id", &|| format!("{prefix}-{}", short_hex(7))),
        };
        let name = generated_str(request, &id)?;
        json!({
          "id": name,
          "arn": format!("arn:aws:s3:::{name}"),
          "bucket_domain_name": format!("{name}.s3.amazonaws.com"),
          "bucket_regional_domain_name": format!("{name}.s3.{region}.amazonaws.com"),
        })
      }
      ResourceKind::PublicAccessSetting => {
        json!({ "id": required_str(request, "bucket")? })
      }
      ResourceKind::WebsiteConfig => {
        let bucket = required_str(request, "bucket")?;
        json!({
          "id": bucket,
          "website_endpoint": format!("{bucket}.s3-website-{region}.amazonaws.com"),
          "website_domain": format!("s3-website-{region}.amazonaws.com"),
        })
      }
      ResourceKind::UploadedObject => {
        let bucket = required_str(request, "bucket")?;
        let key = match optional_str(request, "key") {
          Some(key) => key.to_string(),
          None => {
            let source = required_str(request, "source")?;
            Path::new(source)
              .file_name()
              .map(|name| name.to_string_lossy().into_owned())
              .unwrap_or_else(|| source.to_string())
          }
        };
        let etag = optional_str(request, SOURCE_DIGEST_INPUT)
          .map(|digest| digest.trim_start_matches("sha256:").chars().take(32).collect())
          .unwrap_or_else(|| short_hex(32));
        json!({
          "id": format!("{bucket}/{key}"),
          "key": key,
          "etag": etag,
        })
      }
      ResourceKind::AccessPolicy => {
        validate_policy(request)?;
        json!({ "id": required_str(request, "bucket")? })
      }
      ResourceKind::OriginAccessControl => json!({
        "id": generated("id", &|| format!("E{}", short_hex(13).to_uppercase())),
        "etag": format!("E{}", short_hex(12).to_uppercase()),
      }),
      ResourceKind::CdnDistribution => {
        validate_origins(request)?;
        let id = generated("id", &|| format!("E{}", short_hex(13).to_uppercase()));
        let id_str = generated_str(request, &id)?;
        json!({
          "id": id_str,
          "arn": format!("arn:aws:cloudfront::000000000000:distribution/{id_str}"),
          "domain_name": generated("domain_name", &|| format!("d{}.cloudfront.net", short_hex(13))),
          "hosted_zone_id": CDN_HOSTED_ZONE_ID,
        })
      }
    };

    Ok(serde_json::from_value(outputs)?)
  }
}

#[async_trait]
impl Provider for LocalProvider {
  fn name(&self) -> &str {
    "local"
  }

  async fn realize(&self, request: RealizeRequest) -> Result<RealizeResponse, ProviderError> {
    if self.failures.contains(&request.node_id) {
      return Err(ProviderError::Rejected {
        node_id: request.node_id,
        message: "injected failure".to_string(),
      });
    }

    let mut state = self.state.write().await;

    let (action, outputs) = match state.records.get(&request.node_id) {
      Some(record) if record.kind == request.kind && record.inputs == request.inputs => {
        (ProviderAction::Unchanged, record.outputs.clone())
      }
      Some(record) if record.kind == request.kind => (
        ProviderAction::Update,
        self.synthesize(&request, Some(&record.outputs))?,
      ),
      _ => (ProviderAction::Create, self.synthesize(&request, None)?),
    };

    debug!(
      node_id = %request.node_id,
      kind = %request.kind,
      action = %action,
      "local provider realize"
    );

    if action.is_mutation() {
      self.mutations.fetch_add(1, Ordering::SeqCst);
      state.records.insert(
        request.node_id,
        ResourceRecord {
          kind: request.kind,
          inputs: request.inputs,
          outputs: outputs.clone(),
        },
      );
    }

    Ok(RealizeResponse { action, outputs })
  }
}

fn short_hex(len: usize) -> String {
  let mut hex = Uuid::new_v4().simple().to_string();
  while hex.len() < len {
    hex.push_str(&Uuid::new_v4().simple().to_string());
  }
  hex.truncate(len);
  hex
}

fn optional_str<'a>(request: &'a RealizeRequest, input: &str) -> Option<&'a str> {
  request.inputs.get(input).and_then(Value::as_str)
}

fn required_str<'a>(request: &'a RealizeRequest, input: &str) -> Result<&'a str, ProviderError> {
  optional_str(request, input)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| invalid(request, input, "expected a non-empty string"))
}

/// A generated id carried over from state must still be a string.
fn generated_str<'a>(request: &RealizeRequest, id: &'a Value) -> Result<&'a str, ProviderError> {
  id.as_str().ok_or_else(|| ProviderError::Rejected {
    node_id: request.node_id.clone(),
    message: format!("recorded id {id} is not a string"),
  })
}

fn invalid(request: &RealizeRequest, input: &str, message: &str) -> ProviderError {
  ProviderError::InvalidInput {
    node_id: request.node_id.clone(),
    input: input.to_string(),
    message: message.to_string(),
  }
}

/// `{Version, Statement: [{Effect, Principal, Action, Resource}]}`
fn validate_policy(request: &RealizeRequest) -> Result<(), ProviderError> {
  let policy = request
    .inputs
    .get("policy")
    .ok_or_else(|| invalid(request, "policy", "missing"))?;

  if !policy.get("Version").is_some_and(Value::is_string) {
    return Err(invalid(request, "policy", "missing Version"));
  }
  let statements = policy
    .get("Statement")
    .and_then(Value::as_array)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| invalid(request, "policy", "expected a non-empty Statement list"))?;

  for statement in statements {
    for field in ["Effect", "Principal", "Action", "Resource"] {
      if statement.get(field).is_none() {
        return Err(invalid(
          request,
          "policy",
          &format!("statement is missing {field}"),
        ));
      }
    }
  }
  Ok(())
}

fn validate_origins(request: &RealizeRequest) -> Result<(), ProviderError> {
  let origins = request
    .inputs
    .get("origins")
    .and_then(Value::as_array)
    .filter(|o| !o.is_empty())
    .ok_or_else(|| invalid(request, "origins", "expected a non-empty list"))?;

  if origins
    .iter()
    .any(|origin| !origin.get("domain_name").is_some_and(Value::is_string))
  {
    return Err(invalid(request, "origins", "every origin needs a domain_name"));
  }
  Ok(())
}
