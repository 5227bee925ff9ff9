//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const PULUMI_YAML: &str = "name: widgets\nruntime: nodejs\n";

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the application
/// source and the state store.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// An application source containing only `Pulumi.yaml`.
  pub fn pulumi_project() -> Self {
    let env = Self::empty();
    env.write_file("Pulumi.yaml", PULUMI_YAML);
    env
  }

  /// An empty application source.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("app")).unwrap();
    Self { temp }
  }

  /// Write a file relative to the application source.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.source_path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Application source directory.
  pub fn source_path(&self) -> PathBuf {
    let p = self.temp.path().join("app");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// State store root (isolated per test).
  pub fn state_path(&self) -> PathBuf {
    let p = self.temp.path().join("state");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a Command for the stackcmp binary with a clean environment.
  ///
  /// The host's `ARGOCD_*` variables never leak in. Sets:
  /// - `HOME`: the temp directory
  /// - `STACKCMP_STATE_DIR`: isolated state path
  pub fn stackcmp_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("stackcmp");
    cmd.env_clear();
    cmd.env("HOME", self.temp.path());
    cmd.env("STACKCMP_STATE_DIR", self.state_path());
    cmd.current_dir(self.source_path());
    cmd
  }

  /// Command preloaded with the Argo CD environment of the demo app.
  pub fn argocd_cmd(&self) -> Command {
    let mut cmd = self.stackcmp_cmd();
    cmd.env("ARGOCD_APP_NAME", "demo");
    cmd.env("ARGOCD_APP_NAMESPACE", "team-a");
    cmd.env("ARGOCD_APP_REVISION", "4f1c2a9");
    cmd.env("ARGOCD_APP_SOURCE_REPO_URL", "https://github.com/acme/widgets.git");
    cmd.env("ARGOCD_APP_SOURCE_PATH", "infra");
    cmd.env("ARGOCD_APP_SOURCE_TARGET_REVISION", "main");
    cmd.env(
      "ARGOCD_APP_PARAMETERS",
      r#"[{"name":"org","string":"acme"},{"name":"project","string":"widgets"},{"name":"stack","string":"prod"}]"#,
    );
    cmd
  }
}

/// Split a YAML stream into documents.
pub fn documents(stream: &[u8]) -> Vec<serde_yaml::Value> {
  let text = std::str::from_utf8(stream).unwrap();
  serde_yaml::Deserializer::from_str(text)
    .map(|doc| serde::Deserialize::deserialize(doc).unwrap())
    .collect()
}
