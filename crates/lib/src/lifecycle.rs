//! Plugin lifecycle: discover, init, generate.
//!
//! An [`Invocation`] is one GitOps sync of one application. It owns every
//! piece of state the sync needs and walks an explicit state machine:
//!
//! ```text
//! Uninitialized --discover--> Discovered --init--> Initialized --generate--> Generated
//!       |                          |                   |
//!       +----------- any unrecoverable error ----------+---------> Failed
//! ```
//!
//! A negative discovery is not an error: the state stays `Uninitialized` and
//! the plugin simply does not apply. `Generated` and `Failed` are terminal.
//! A cancellation token is checked before every step.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ConfigError, PluginConfig};
use crate::context::{ContextError, ContextKey, InvocationContext};
use crate::manifest::{Emitter, ManifestError, RenderedManifest};
use crate::resolve::{ResolveError, Resolver};
use crate::scaffold::{STACK_TEMPLATE, ScaffoldError};
use crate::source::{SourceError, SourceFile, SourceTree};
use crate::store::{InitOutcome, InitRecord, StateStore, StoreError, TemplateDigest};
use crate::template::{ManifestTemplate, Renderer, TemplateSyntaxError};

/// Name under which the built-in template is reported.
pub const BUILTIN_TEMPLATE_NAME: &str = "<builtin>/stack.yaml.envsubst";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
  Uninitialized,
  Discovered,
  Initialized,
  Generated,
  Failed,
}

impl fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LifecycleState::Uninitialized => "uninitialized",
      LifecycleState::Discovered => "discovered",
      LifecycleState::Initialized => "initialized",
      LifecycleState::Generated => "generated",
      LifecycleState::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Errors surfaced to the GitOps controller.
#[derive(Debug, Error)]
pub enum PluginError {
  #[error("unresolved variable: {0}")]
  UnresolvedVariable(String),

  #[error(transparent)]
  TemplateSyntax(#[from] TemplateSyntaxError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  /// The plugin does not apply to this source. Not a failure.
  #[error("plugin does not apply: {marker} not found in {}", source_root.display())]
  DiscoveryMismatch { marker: String, source_root: PathBuf },

  #[error("invocation cancelled")]
  Cancelled,

  #[error(transparent)]
  Io(#[from] SourceError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Context(#[from] ContextError),

  #[error(transparent)]
  Scaffold(#[from] ScaffoldError),

  #[error("cannot {operation} from state {from}")]
  InvalidTransition {
    from: LifecycleState,
    operation: &'static str,
  },
}

impl From<ResolveError> for PluginError {
  fn from(err: ResolveError) -> Self {
    match err {
      ResolveError::UnresolvedVariable(name) => PluginError::UnresolvedVariable(name),
    }
  }
}

/// Output of a successful generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
  pub manifest: RenderedManifest,
  /// The validated multi-document YAML stream.
  pub output: String,
}

/// Terminal result of [`Invocation::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  NotApplicable,
  Generated(Generated),
}

/// Template sources loaded by init and rendered by generate.
#[derive(Debug, Clone, Default)]
struct LoadedSources {
  templates: Vec<SourceFile>,
  manifests: Vec<SourceFile>,
}

impl LoadedSources {
  fn digests(&self) -> Vec<TemplateDigest> {
    self
      .templates
      .iter()
      .chain(&self.manifests)
      .map(|file| TemplateDigest::of(&file.relative, &file.content))
      .collect()
  }
}

/// One plugin invocation.
pub struct Invocation {
  source: PathBuf,
  config: PluginConfig,
  context: InvocationContext,
  store: StateStore,
  cancel: CancellationToken,
  state: LifecycleState,
  tree: Option<SourceTree>,
  marker: Option<PathBuf>,
  sources: LoadedSources,
}

impl Invocation {
  pub fn new(source: impl Into<PathBuf>, config: PluginConfig, context: InvocationContext, store: StateStore) -> Self {
    Self {
      source: source.into(),
      config,
      context,
      store,
      cancel: CancellationToken::new(),
      state: LifecycleState::Uninitialized,
      tree: None,
      marker: None,
      sources: LoadedSources::default(),
    }
  }

  /// Use a caller-owned cancellation token.
  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn state(&self) -> LifecycleState {
    self.state
  }

  pub fn context(&self) -> &InvocationContext {
    &self.context
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  /// Marker file found by a positive discovery.
  pub fn marker(&self) -> Option<&Path> {
    self.marker.as_deref()
  }

  /// The record a previous init stored for this application, if any.
  pub fn stored_record(&self) -> Result<Option<InitRecord>, PluginError> {
    Ok(self.store.load(&self.context)?)
  }

  /// Run discover, init and generate in sequence.
  pub fn run(&mut self) -> Result<Outcome, PluginError> {
    if !self.discover()? {
      return Ok(Outcome::NotApplicable);
    }
    self.init()?;
    Ok(Outcome::Generated(self.generate()?))
  }

  /// Check whether the plugin applies to the source.
  ///
  /// On a negative match the state stays `Uninitialized`.
  pub fn discover(&mut self) -> Result<bool, PluginError> {
    self.step("discover", &[LifecycleState::Uninitialized], |inv| {
      let tree = SourceTree::open(&inv.source)?;
      let marker = tree.marker(&inv.config.discover.file_name);
      let applies = marker.is_some();

      if applies {
        inv.state = LifecycleState::Discovered;
        info!(source = %tree.root().display(), "plugin applies");
      } else {
        debug!(
          source = %tree.root().display(),
          marker = %inv.config.discover.file_name,
          "plugin does not apply"
        );
      }

      inv.tree = Some(tree);
      inv.marker = marker;
      Ok(applies)
    })
  }

  /// Load template sources and ensure the backing state store exists.
  /// Safe to call repeatedly.
  pub fn init(&mut self) -> Result<InitOutcome, PluginError> {
    self.step(
      "init",
      &[LifecycleState::Discovered, LifecycleState::Initialized],
      |inv| {
        let tree = inv.discovered_tree()?;
        let sources = LoadedSources {
          templates: tree.find_templates(&inv.config.templates)?,
          manifests: tree.find_manifests(&inv.config.manifests_dir)?,
        };

        let record = InitRecord::new(&inv.context, sources.digests());
        let outcome = inv.store.ensure(&inv.context, &record)?;

        info!(
          app = inv.context.get(ContextKey::AppName).unwrap_or("<unnamed>"),
          templates = sources.templates.len(),
          manifests = sources.manifests.len(),
          state_dir = %outcome.state_dir.display(),
          "initialized"
        );

        inv.sources = sources;
        inv.state = LifecycleState::Initialized;
        Ok(outcome)
      },
    )
  }

  /// Render, validate and emit the manifest.
  pub fn generate(&mut self) -> Result<Generated, PluginError> {
    self.step("generate", &[LifecycleState::Initialized], |inv| {
      let templates = inv.parse_templates()?;

      let defaults = inv.config.variable_defaults();
      let resolver = Resolver::new(&inv.context, &defaults);
      let manifest = Renderer::new(resolver).render_all(&templates)?;
      let output = Emitter::new(&inv.config.validation).emit(&manifest)?;

      info!(documents = manifest.len(), "generated manifest");
      inv.state = LifecycleState::Generated;
      Ok(Generated { manifest, output })
    })
  }

  /// Shared bookkeeping for every lifecycle step: precondition check,
  /// cancellation check, and the move to `Failed` on error.
  fn step<T>(
    &mut self,
    operation: &'static str,
    allowed: &[LifecycleState],
    body: impl FnOnce(&mut Self) -> Result<T, PluginError>,
  ) -> Result<T, PluginError> {
    if self.state == LifecycleState::Uninitialized && operation != "discover" {
      return Err(self.mismatch());
    }

    if !allowed.contains(&self.state) {
      let err = PluginError::InvalidTransition {
        from: self.state,
        operation,
      };
      return Err(self.fail(err));
    }

    if self.cancel.is_cancelled() {
      return Err(self.fail(PluginError::Cancelled));
    }

    debug!(operation, state = %self.state, "lifecycle step");
    body(self).map_err(|err| self.fail(err))
  }

  fn fail(&mut self, err: PluginError) -> PluginError {
    if !matches!(err, PluginError::DiscoveryMismatch { .. }) {
      error!(state = %self.state, error = %err, "invocation failed");
      self.state = LifecycleState::Failed;
    }
    err
  }

  fn mismatch(&self) -> PluginError {
    PluginError::DiscoveryMismatch {
      marker: self.config.discover.file_name.clone(),
      source_root: self
        .tree
        .as_ref()
        .map(|t| t.root().to_path_buf())
        .unwrap_or_else(|| self.source.clone()),
    }
  }

  fn discovered_tree(&self) -> Result<&SourceTree, PluginError> {
    self.tree.as_ref().ok_or_else(|| self.mismatch())
  }

  fn parse_templates(&self) -> Result<Vec<ManifestTemplate>, PluginError> {
    let mut templates = Vec::with_capacity(self.sources.templates.len() + self.sources.manifests.len() + 1);

    if self.sources.templates.is_empty() {
      debug!("no templates in source, using built-in Stack template");
      templates.push(ManifestTemplate::parse(BUILTIN_TEMPLATE_NAME, STACK_TEMPLATE)?);
    } else {
      for file in &self.sources.templates {
        templates.push(ManifestTemplate::parse(file.relative.as_str(), &file.content)?);
      }
    }

    for file in &self.sources.manifests {
      templates.push(ManifestTemplate::literal(file.relative.as_str(), &file.content));
    }

    Ok(templates)
  }
}
