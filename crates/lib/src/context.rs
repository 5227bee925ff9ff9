//! Invocation context supplied by the GitOps controller.
//!
//! Argo CD hands a config management plugin everything it knows about the
//! application being synced through environment variables. This module
//! collects them into an immutable [`InvocationContext`] that the resolver
//! reads names from.
//!
//! # Addressable names
//!
//! - Fixed keys, by Argo CD env name or dotted alias (see [`ContextKey`])
//! - `parameters.<name>` and `PARAM_<NAME>` for plugin parameters
//! - `env.<NAME>` and `ARGOCD_ENV_<NAME>` for opaque user-supplied extras
//!
//! Any other process variable is ignored so the host environment never leaks
//! into rendered manifests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Env var carrying plugin parameters as a JSON array.
pub const PARAMETERS_ENV: &str = "ARGOCD_APP_PARAMETERS";

const PARAM_PREFIX: &str = "PARAM_";
const PARAMETERS_PREFIX: &str = "parameters.";
const EXTRA_ENV_PREFIX: &str = "ARGOCD_ENV_";
const EXTRA_ALIAS_PREFIX: &str = "env.";

/// Errors that can occur while assembling a context.
#[derive(Debug, Error)]
pub enum ContextError {
  #[error("invalid {PARAMETERS_ENV}: {0}")]
  InvalidParameters(#[source] serde_json::Error),

  #[error("parameter '{0}' has no value (expected string, array or map)")]
  EmptyParameter(String),

  #[error("invalid parameter assignment '{0}' (expected KEY=VALUE)")]
  InvalidAssignment(String),
}

/// The fixed set of keys every invocation may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextKey {
  AppName,
  AppNamespace,
  Revision,
  SourceRepoUrl,
  SourcePath,
  TargetRevision,
}

impl ContextKey {
  pub const ALL: [ContextKey; 6] = [
    ContextKey::AppName,
    ContextKey::AppNamespace,
    ContextKey::Revision,
    ContextKey::SourceRepoUrl,
    ContextKey::SourcePath,
    ContextKey::TargetRevision,
  ];

  /// Name of the env var Argo CD sets for this key.
  pub fn env_name(self) -> &'static str {
    match self {
      ContextKey::AppName => "ARGOCD_APP_NAME",
      ContextKey::AppNamespace => "ARGOCD_APP_NAMESPACE",
      ContextKey::Revision => "ARGOCD_APP_REVISION",
      ContextKey::SourceRepoUrl => "ARGOCD_APP_SOURCE_REPO_URL",
      ContextKey::SourcePath => "ARGOCD_APP_SOURCE_PATH",
      ContextKey::TargetRevision => "ARGOCD_APP_SOURCE_TARGET_REVISION",
    }
  }

  /// Dotted alias usable in templates.
  pub fn alias(self) -> &'static str {
    match self {
      ContextKey::AppName => "app.name",
      ContextKey::AppNamespace => "app.namespace",
      ContextKey::Revision => "app.revision",
      ContextKey::SourceRepoUrl => "source.repoURL",
      ContextKey::SourcePath => "source.path",
      ContextKey::TargetRevision => "source.targetRevision",
    }
  }

  /// Look up a key by env name or alias. Case-sensitive.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|key| key.env_name() == name || key.alias() == name)
  }
}

impl fmt::Display for ContextKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.env_name())
  }
}

/// Variables for one application sync. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvocationContext {
  fixed: BTreeMap<ContextKey, String>,
  parameters: BTreeMap<String, String>,
  extras: BTreeMap<String, String>,
}

impl InvocationContext {
  pub fn builder() -> ContextBuilder {
    ContextBuilder::default()
  }

  pub fn get(&self, key: ContextKey) -> Option<&str> {
    self.fixed.get(&key).map(String::as_str)
  }

  pub fn parameter(&self, name: &str) -> Option<&str> {
    self.parameters.get(name).map(String::as_str)
  }

  pub fn parameters(&self) -> &BTreeMap<String, String> {
    &self.parameters
  }

  pub fn extras(&self) -> &BTreeMap<String, String> {
    &self.extras
  }

  /// Resolve a template variable name against this context.
  ///
  /// Returns `None` when the name is not part of the context; callers decide
  /// whether a default applies.
  pub fn lookup(&self, name: &str) -> Option<&str> {
    if let Some(key) = ContextKey::from_name(name) {
      return self.get(key);
    }
    if let Some(rest) = name.strip_prefix(PARAMETERS_PREFIX) {
      return self.parameter(rest);
    }
    if let Some(rest) = name.strip_prefix(PARAM_PREFIX) {
      return self
        .parameters
        .iter()
        .find(|(key, _)| param_env_suffix(key) == rest)
        .map(|(_, value)| value.as_str());
    }
    if let Some(rest) = name
      .strip_prefix(EXTRA_ENV_PREFIX)
      .or_else(|| name.strip_prefix(EXTRA_ALIAS_PREFIX))
    {
      return self.extras.get(rest).map(String::as_str);
    }
    None
  }

  /// Every name this context can resolve, in canonical form, with its value.
  pub fn entries(&self) -> Vec<(String, &str)> {
    let mut entries = Vec::with_capacity(self.fixed.len() + self.parameters.len() + self.extras.len());
    for (key, value) in &self.fixed {
      entries.push((key.env_name().to_string(), value.as_str()));
    }
    for (name, value) in &self.parameters {
      entries.push((format!("{PARAMETERS_PREFIX}{name}"), value.as_str()));
    }
    for (name, value) in &self.extras {
      entries.push((format!("{EXTRA_ENV_PREFIX}{name}"), value.as_str()));
    }
    entries
  }
}

/// Upper-cases a parameter name and replaces anything non-alphanumeric with `_`,
/// the way Argo CD derives `PARAM_*` variables.
pub fn param_env_suffix(name: &str) -> String {
  name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
    .collect()
}

/// Parse a `KEY=VALUE` parameter assignment from the command line.
pub fn parse_assignment(input: &str) -> Result<(String, String), ContextError> {
  match input.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(ContextError::InvalidAssignment(input.to_string())),
  }
}

/// One entry of `ARGOCD_APP_PARAMETERS`.
#[derive(Debug, Deserialize)]
struct ParameterAnnouncement {
  name: String,
  #[serde(default)]
  string: Option<String>,
  #[serde(default)]
  array: Option<Vec<String>>,
  #[serde(default)]
  map: Option<BTreeMap<String, String>>,
}

/// Builder for [`InvocationContext`].
#[derive(Debug, Default)]
pub struct ContextBuilder {
  ctx: InvocationContext,
}

impl ContextBuilder {
  /// Seed a builder from process-style variables.
  ///
  /// Only the fixed Argo CD keys, `ARGOCD_APP_PARAMETERS` and `ARGOCD_ENV_*`
  /// extras are read; everything else is dropped.
  pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ContextError>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    let mut builder = Self::default();

    for (name, value) in vars {
      let name = name.as_ref();
      if let Some(key) = ContextKey::ALL.into_iter().find(|key| key.env_name() == name) {
        builder = builder.set(key, value);
      } else if name == PARAMETERS_ENV {
        builder = builder.parameters_json(&value.into())?;
      } else if let Some(extra) = name.strip_prefix(EXTRA_ENV_PREFIX) {
        if !extra.is_empty() {
          builder = builder.extra(extra, value);
        }
      }
    }

    debug!(
      fixed = builder.ctx.fixed.len(),
      parameters = builder.ctx.parameters.len(),
      extras = builder.ctx.extras.len(),
      "collected invocation context"
    );

    Ok(builder)
  }

  pub fn set(mut self, key: ContextKey, value: impl Into<String>) -> Self {
    self.ctx.fixed.insert(key, value.into());
    self
  }

  pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.ctx.parameters.insert(name.into(), value.into());
    self
  }

  pub fn extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.ctx.extras.insert(name.into(), value.into());
    self
  }

  /// Merge parameters announced as JSON, flattening maps and arrays.
  pub fn parameters_json(mut self, json: &str) -> Result<Self, ContextError> {
    if json.trim().is_empty() {
      return Ok(self);
    }

    let announced: Vec<ParameterAnnouncement> = serde_json::from_str(json).map_err(ContextError::InvalidParameters)?;

    for param in announced {
      let mut any = false;
      if let Some(value) = param.string {
        self.ctx.parameters.insert(param.name.clone(), value);
        any = true;
      }
      if let Some(items) = param.array {
        for (index, value) in items.into_iter().enumerate() {
          self.ctx.parameters.insert(format!("{}.{index}", param.name), value);
        }
        any = true;
      }
      if let Some(map) = param.map {
        for (key, value) in map {
          self.ctx.parameters.insert(format!("{}.{key}", param.name), value);
        }
        any = true;
      }
      if !any {
        return Err(ContextError::EmptyParameter(param.name));
      }
    }

    Ok(self)
  }

  pub fn build(self) -> InvocationContext {
    self.ctx
  }
}
