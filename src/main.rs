use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cirrus_asset::FsAssetStore;
use cirrus_config::StackDef;
use cirrus_engine::{ApplyEngine, EngineConfig};
use cirrus_provider::LocalProvider;
use cirrus_resolver::{Resolver, StandardResolver};
use cirrus_stack::Stack;

/// Cirrus - Declarative static website provisioning
#[derive(Parser)]
#[command(name = "cirrus")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.cirrus)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Region used for generated endpoints
  #[arg(long, global = true, default_value = "us-east-1")]
  region: String,

  /// Maximum number of resources realized at once
  #[arg(long, global = true)]
  max_concurrency: Option<usize>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Realize every resource in a stack and print its exports
  Up {
    /// Path to the stack file (JSON)
    stack_file: PathBuf,
  },

  /// Show what an apply would do without calling the provider
  Preview {
    /// Path to the stack file (JSON)
    stack_file: PathBuf,
  },

  /// Print the exports of a previously applied stack
  Outputs {
    /// Path to the stack file (JSON)
    stack_file: PathBuf,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".cirrus"),
  };

  let mut config = EngineConfig::default();
  if let Some(max) = cli.max_concurrency {
    config.max_concurrency = max;
  }

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Up { stack_file }) => {
      rt.block_on(up(stack_file, data_dir, cli.region, config))
    }
    Some(Commands::Preview { stack_file }) => {
      rt.block_on(preview(stack_file, data_dir, cli.region))?;
      Ok(ExitCode::SUCCESS)
    }
    Some(Commands::Outputs { stack_file }) => {
      rt.block_on(outputs(stack_file, data_dir, cli.region))?;
      Ok(ExitCode::SUCCESS)
    }
    None => {
      println!("cirrus - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

async fn up(
  stack_file: PathBuf,
  data_dir: PathBuf,
  region: String,
  config: EngineConfig,
) -> Result<ExitCode> {
  let stack = load_stack(&stack_file).await?;
  info!(stack_id = %stack.stack_id(), resources = stack.len(), "loaded stack {}", stack.name());

  let state_path = state_path(&data_dir, stack.stack_id());
  let provider = Arc::new(
    LocalProvider::load(region, &state_path)
      .await
      .with_context(|| format!("failed to load state: {}", state_path.display()))?,
  );
  info!(region = %provider.region(), path = %state_path.display(), "state loaded");
  let assets = Arc::new(FsAssetStore::new());
  let engine = ApplyEngine::new(provider.clone(), assets, config);

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });

  let report = engine
    .apply(&stack, cancel)
    .await
    .context("stack apply failed")?;

  provider
    .save(&state_path)
    .await
    .with_context(|| format!("failed to save state: {}", state_path.display()))?;
  info!(path = %state_path.display(), "state saved");

  for resource in stack.resources() {
    if let Some(outcome) = report.outcome(&resource.id) {
      eprintln!("  {:<20} {}", resource.id, outcome);
    }
  }
  eprintln!(
    "Apply {}: {} changed, {} resources",
    if report.succeeded() { "completed" } else { "incomplete" },
    report.mutations(),
    report.outcomes.len()
  );
  for (name, reason) in &report.unavailable_exports {
    warn!(export = %name, reason = %reason, "export unavailable");
  }

  println!("{}", serde_json::to_string_pretty(&report.exports)?);

  Ok(if report.succeeded() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

async fn preview(stack_file: PathBuf, data_dir: PathBuf, region: String) -> Result<()> {
  let stack = load_stack(&stack_file).await?;
  let state_path = state_path(&data_dir, stack.stack_id());
  let provider = LocalProvider::load(region, &state_path)
    .await
    .with_context(|| format!("failed to load state: {}", state_path.display()))?;

  let known = provider.state().await.realized_outputs();
  let preview = cirrus_engine::preview(&stack, &known).context("failed to preview stack")?;

  println!("{}", serde_json::to_string_pretty(&preview)?);
  Ok(())
}

async fn outputs(stack_file: PathBuf, data_dir: PathBuf, region: String) -> Result<()> {
  let stack = load_stack(&stack_file).await?;
  let state_path = state_path(&data_dir, stack.stack_id());
  let provider = LocalProvider::load(region, &state_path)
    .await
    .with_context(|| format!("failed to load state: {}", state_path.display()))?;

  let known = provider.state().await.realized_outputs();
  let mut exports = serde_json::Map::new();
  for (name, value) in stack.exports() {
    let value = value
      .resolve(&known)
      .with_context(|| format!("export '{name}' is not available, run `cirrus up` first"))?;
    exports.insert(name.clone(), value);
  }

  println!("{}", serde_json::to_string_pretty(&exports)?);
  Ok(())
}

/// Read, parse and resolve a stack file. Relative upload sources resolve
/// against the stack file's directory.
async fn load_stack(stack_file: &Path) -> Result<Stack> {
  let content = tokio::fs::read_to_string(stack_file)
    .await
    .with_context(|| format!("failed to read stack file: {}", stack_file.display()))?;

  let stack_def: StackDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse stack file: {}", stack_file.display()))?;

  let base_dir = stack_file
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default();
  let resolver = StandardResolver::new().with_base_dir(base_dir);

  resolver
    .resolve(stack_def)
    .context("failed to resolve stack")
}

fn state_path(data_dir: &Path, stack_id: &str) -> PathBuf {
  data_dir.join("state").join(format!("{stack_id}.json"))
}
