//! Plugin configuration.
//!
//! Configuration is YAML, deserialized with `serde_yaml`. Every field has a
//! default, so an empty file (or no file at all) yields a working plugin that
//! discovers Pulumi projects and renders `*.envsubst` templates.
//!
//! ```yaml
//! discover:
//!   fileName: Pulumi.yaml
//! templates:
//!   - "*.envsubst"
//! manifestsDir: yaml
//! variables:
//!   defaults:
//!     ARGOCD_APP_SOURCE_PATH: "."
//! validation:
//!   rejectLiteralSecrets: true
//!   secretEnvKeys: [PULUMI_ACCESS_TOKEN]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  BUILTIN_VARIABLE_DEFAULTS, DEFAULT_MANIFESTS_DIR, DEFAULT_MARKER_FILE, DEFAULT_SECRET_ENV_KEYS,
  DEFAULT_TEMPLATE_GLOB, SOURCE_CONFIG_FILE,
};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid config {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_yaml::Error },

  #[error("invalid config: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct DiscoverConfig {
  /// File that must exist at the source root for the plugin to apply.
  pub file_name: String,
}

impl Default for DiscoverConfig {
  fn default() -> Self {
    Self {
      file_name: DEFAULT_MARKER_FILE.to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct VariablesConfig {
  /// Values used when the invocation context does not supply a name.
  pub defaults: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidationConfig {
  /// Fail when a Stack passes a secret env key as a literal.
  pub reject_literal_secrets: bool,
  pub secret_env_keys: Vec<String>,
}

impl Default for ValidationConfig {
  fn default() -> Self {
    Self {
      reject_literal_secrets: true,
      secret_env_keys: DEFAULT_SECRET_ENV_KEYS.iter().map(|k| k.to_string()).collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PluginConfig {
  pub discover: DiscoverConfig,
  /// Globs, relative to the source root, selecting template files.
  pub templates: Vec<String>,
  /// Directory of plain manifests appended verbatim. Empty disables it.
  pub manifests_dir: String,
  pub variables: VariablesConfig,
  pub validation: ValidationConfig,
}

impl Default for PluginConfig {
  fn default() -> Self {
    Self {
      discover: DiscoverConfig::default(),
      templates: vec![DEFAULT_TEMPLATE_GLOB.to_string()],
      manifests_dir: DEFAULT_MANIFESTS_DIR.to_string(),
      variables: VariablesConfig::default(),
      validation: ValidationConfig::default(),
    }
  }
}

impl PluginConfig {
  /// Parse configuration from YAML text.
  pub fn from_yaml(path: &Path, content: &str) -> Result<Self, ConfigError> {
    let config: PluginConfig = if content.trim().is_empty() {
      PluginConfig::default()
    } else {
      serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      })?
    };
    config.validate()?;
    Ok(config)
  }

  /// Load configuration from a file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loading plugin config");
    Self::from_yaml(path, &content)
  }

  /// Pick the configuration for a source: an explicit path, else
  /// `.stackcmp.yaml` in the source root, else defaults.
  pub fn locate(explicit: Option<&Path>, source_root: &Path) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::load(path);
    }

    let in_source = source_root.join(SOURCE_CONFIG_FILE);
    if in_source.is_file() {
      return Self::load(&in_source);
    }

    debug!("no plugin config found, using defaults");
    Ok(Self::default())
  }

  /// Fallback values for the resolver: the built-in defaults for keys Argo CD
  /// always sets, overlaid with `variables.defaults`.
  pub fn variable_defaults(&self) -> BTreeMap<String, String> {
    let mut defaults: BTreeMap<String, String> = BUILTIN_VARIABLE_DEFAULTS
      .iter()
      .map(|(name, value)| (name.to_string(), value.to_string()))
      .collect();
    defaults.extend(self.variables.defaults.clone());
    defaults
  }

  fn validate(&self) -> Result<(), ConfigError> {
    let marker = &self.discover.file_name;
    if marker.is_empty() || marker.contains('/') || marker.contains('\\') {
      return Err(ConfigError::Invalid(format!(
        "discover.fileName must be a plain file name, got '{marker}'"
      )));
    }
    for glob in &self.templates {
      if glob.is_empty() || glob.starts_with('/') || glob.contains("..") {
        return Err(ConfigError::Invalid(format!(
          "template globs must be relative to the source root, got '{glob}'"
        )));
      }
      if let Err(e) = glob::Pattern::new(glob) {
        return Err(ConfigError::Invalid(format!("invalid template glob '{glob}': {e}")));
      }
    }
    if self.manifests_dir.starts_with('/') || self.manifests_dir.contains("..") {
      return Err(ConfigError::Invalid(format!(
        "manifestsDir must be relative to the source root, got '{}'",
        self.manifests_dir
      )));
    }
    Ok(())
  }
}
