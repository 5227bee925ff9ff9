//! Scaffold the files an Argo CD sidecar and an application repo need.
//!
//! `plugin.yaml` is mounted into the CMP sidecar; `stack.yaml.envsubst` is a
//! starting point for repos that want to customize the Stack resource.

mod templates;

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

pub use templates::{PLUGIN_YAML, STACK_TEMPLATE};

pub const PLUGIN_YAML_FILE: &str = "plugin.yaml";
pub const STACK_TEMPLATE_FILE: &str = "stack.yaml.envsubst";

/// Errors that can occur while scaffolding.
#[derive(Debug, Error)]
pub enum ScaffoldError {
  #[error("file already exists: {} (use --force to overwrite)", path.display())]
  PathExists { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: std::io::Error },

  #[error("failed to canonicalize path {}: {source}", path.display())]
  Canonicalize { path: PathBuf, source: std::io::Error },
}

/// Options for scaffolding a directory.
pub struct ScaffoldOptions {
  /// Directory to write into, created if missing
  pub dir: PathBuf,
  /// Overwrite existing files
  pub force: bool,
}

/// Result of a successful scaffold.
#[derive(Debug)]
pub struct ScaffoldResult {
  /// The target directory (canonicalized)
  pub dir: PathBuf,
  pub plugin_yaml: PathBuf,
  pub stack_template: PathBuf,
}

/// Write `plugin.yaml` and `stack.yaml.envsubst` into a directory.
///
/// # Errors
///
/// Returns an error if either file already exists and `force` is not set,
/// or if directory creation or file writing fails.
pub fn scaffold(options: &ScaffoldOptions) -> Result<ScaffoldResult, ScaffoldError> {
  fs::create_dir_all(&options.dir).map_err(|source| ScaffoldError::CreateDir {
    path: options.dir.clone(),
    source,
  })?;

  let dir = dunce::canonicalize(&options.dir).map_err(|source| ScaffoldError::Canonicalize {
    path: options.dir.clone(),
    source,
  })?;

  let plugin_yaml = dir.join(PLUGIN_YAML_FILE);
  let stack_template = dir.join(STACK_TEMPLATE_FILE);

  // Check both before writing either, so a refusal leaves the directory untouched.
  if !options.force {
    for path in [&plugin_yaml, &stack_template] {
      if path.exists() {
        return Err(ScaffoldError::PathExists { path: path.clone() });
      }
    }
  }

  for (path, content) in [(&plugin_yaml, PLUGIN_YAML), (&stack_template, STACK_TEMPLATE)] {
    fs::write(path, content).map_err(|source| ScaffoldError::WriteFile {
      path: path.clone(),
      source,
    })?;
  }

  info!(dir = %dir.display(), "scaffolded plugin files");

  Ok(ScaffoldResult {
    dir,
    plugin_yaml,
    stack_template,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::template::ManifestTemplate;
  use tempfile::TempDir;

  #[test]
  fn scaffold_creates_all_files() {
    let temp = TempDir::new().unwrap();
    let options = ScaffoldOptions {
      dir: temp.path().join("nested").join("plugin"),
      force: false,
    };

    let result = scaffold(&options).unwrap();

    assert_eq!(fs::read_to_string(&result.plugin_yaml).unwrap(), PLUGIN_YAML);
    assert_eq!(fs::read_to_string(&result.stack_template).unwrap(), STACK_TEMPLATE);
  }

  #[test]
  fn scaffold_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(STACK_TEMPLATE_FILE), "# mine").unwrap();

    let options = ScaffoldOptions {
      dir: temp.path().to_path_buf(),
      force: false,
    };
    let err = scaffold(&options).unwrap_err();

    assert!(matches!(err, ScaffoldError::PathExists { .. }));
    assert!(err.to_string().contains(STACK_TEMPLATE_FILE));
    assert!(!temp.path().join(PLUGIN_YAML_FILE).exists(), "nothing written on refusal");
  }

  #[test]
  fn scaffold_force_overwrites() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(PLUGIN_YAML_FILE), "old").unwrap();

    let options = ScaffoldOptions {
      dir: temp.path().to_path_buf(),
      force: true,
    };
    let result = scaffold(&options).unwrap();

    assert_eq!(fs::read_to_string(result.plugin_yaml).unwrap(), PLUGIN_YAML);
  }

  #[test]
  fn plugin_yaml_is_a_config_management_plugin() {
    let value: serde_yaml::Value = serde_yaml::from_str(PLUGIN_YAML).unwrap();
    assert_eq!(value["kind"].as_str(), Some("ConfigManagementPlugin"));
    assert_eq!(value["spec"]["version"].as_str(), Some("v1.0"));
    assert_eq!(value["spec"]["generate"]["command"][1].as_str(), Some("generate"));
  }

  #[test]
  fn stack_template_references_argocd_environment() {
    let template = ManifestTemplate::parse(STACK_TEMPLATE_FILE, STACK_TEMPLATE).unwrap();

    assert_eq!(template.documents().len(), 3);
    assert_eq!(
      template.references().collect::<Vec<_>>(),
      vec![
        "ARGOCD_APP_NAME",
        "ARGOCD_APP_NAMESPACE",
        "PARAM_ORG",
        "PARAM_PROJECT",
        "PARAM_STACK",
        "ARGOCD_APP_SOURCE_REPO_URL",
        "ARGOCD_APP_SOURCE_PATH",
        "ARGOCD_APP_REVISION",
      ]
    );
  }
}
