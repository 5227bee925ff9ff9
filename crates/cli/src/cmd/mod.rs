//! Subcommand implementations and the options they share.

mod discover;
mod generate;
mod init;
mod scaffold;
mod vars;

pub use discover::cmd_discover;
pub use generate::cmd_generate;
pub use init::cmd_init;
pub use scaffold::cmd_scaffold;
pub use vars::cmd_vars;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stackcmp_lib::config::PluginConfig;
use stackcmp_lib::consts::{APP_NAME, CONFIG_ENV, STATE_DIR_ENV};
use stackcmp_lib::context::{ContextBuilder, ContextKey, InvocationContext, parse_assignment};
use stackcmp_lib::platform::paths;
use stackcmp_lib::store::StateStore;
use stackcmp_lib::{Invocation, PluginError};

/// Options accepted before or after any subcommand.
#[derive(Args, Debug)]
pub struct GlobalOptions {
  /// Plugin config file (default: <source>/.stackcmp.yaml)
  #[arg(long, global = true, env = CONFIG_ENV, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// Root directory for per-application init state
  #[arg(long, global = true, env = STATE_DIR_ENV, value_name = "DIR")]
  pub state_dir: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(flatten)]
  pub context: ContextArgs,
}

/// Overrides for the Argo CD invocation environment.
#[derive(Args, Debug, Default)]
pub struct ContextArgs {
  /// Application name (default: $ARGOCD_APP_NAME)
  #[arg(long, global = true, value_name = "NAME")]
  pub app_name: Option<String>,

  /// Application namespace (default: $ARGOCD_APP_NAMESPACE)
  #[arg(long, global = true, value_name = "NAMESPACE")]
  pub app_namespace: Option<String>,

  /// Source repository URL (default: $ARGOCD_APP_SOURCE_REPO_URL)
  #[arg(long, global = true, value_name = "URL")]
  pub repo_url: Option<String>,

  /// Application path within the repository (default: $ARGOCD_APP_SOURCE_PATH)
  #[arg(long, global = true, value_name = "PATH")]
  pub source_path: Option<String>,

  /// Resolved commit (default: $ARGOCD_APP_REVISION)
  #[arg(long, global = true, value_name = "SHA")]
  pub revision: Option<String>,

  /// Requested revision (default: $ARGOCD_APP_SOURCE_TARGET_REVISION)
  #[arg(long, global = true, value_name = "REF")]
  pub target_revision: Option<String>,

  /// Plugin parameter, may be repeated (default: $ARGOCD_APP_PARAMETERS)
  #[arg(long = "param", global = true, value_name = "KEY=VALUE")]
  pub params: Vec<String>,
}

impl ContextArgs {
  /// Build the invocation context from the process environment, then apply
  /// command-line overrides.
  pub fn build(&self) -> Result<InvocationContext> {
    let vars = std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
    let mut builder = ContextBuilder::from_vars(vars).context("Invalid Argo CD environment")?;

    let overrides = [
      (ContextKey::AppName, &self.app_name),
      (ContextKey::AppNamespace, &self.app_namespace),
      (ContextKey::SourceRepoUrl, &self.repo_url),
      (ContextKey::SourcePath, &self.source_path),
      (ContextKey::Revision, &self.revision),
      (ContextKey::TargetRevision, &self.target_revision),
    ];
    for (key, value) in overrides {
      if let Some(value) = value {
        builder = builder.set(key, value.clone());
      }
    }

    for param in &self.params {
      let (name, value) = parse_assignment(param)?;
      builder = builder.parameter(name, value);
    }

    Ok(builder.build())
  }
}

/// Arguments for commands that act on an application source.
#[derive(Args, Debug)]
pub struct InvocationArgs {
  /// Application source directory
  #[arg(long, default_value = ".", value_name = "DIR")]
  pub source: PathBuf,
}

/// Assemble an invocation from the command line and environment.
pub fn invocation(global: &GlobalOptions, args: &InvocationArgs) -> Result<Invocation> {
  let context = global.context.build()?;
  let config = PluginConfig::locate(global.config.as_deref(), &args.source).context("Failed to load plugin config")?;

  let state_dir = global.state_dir.clone().or_else(paths::state_dir).unwrap_or_else(|| {
    let fallback = std::env::temp_dir().join(APP_NAME);
    debug!(path = %fallback.display(), "no home directory, keeping state in temp dir");
    fallback
  });

  Ok(Invocation::new(&args.source, config, context, StateStore::new(state_dir)))
}

/// Run lifecycle steps on a blocking task. Ctrl-C cancels the invocation
/// before its next step.
pub fn run_cancellable<T, F>(invocation: Invocation, steps: F) -> Result<T>
where
  T: Send + 'static,
  F: FnOnce(&mut Invocation) -> Result<T, PluginError> + Send + 'static,
{
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let joined = rt.block_on(async move {
    let cancel = CancellationToken::new();
    let mut invocation = invocation.with_cancellation(cancel.clone());

    let interrupt = tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling before the next step");
        cancel.cancel();
      }
    });

    let joined = tokio::task::spawn_blocking(move || steps(&mut invocation)).await;
    interrupt.abort();
    joined
  });

  let result = joined.context("Plugin task failed")?;
  Ok(result?)
}
