//! Backing state store ensured by the init step.
//!
//! Each application gets a directory under the state root, named by a digest
//! of its identity. Init writes a deterministic `init.json` record there: no
//! timestamps, no revision, so running init any number of times with the same
//! inputs leaves byte-identical state.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DIGEST_PREFIX_LEN, INIT_RECORD_FILE, PLUGIN_VERSION};
use crate::context::{ContextKey, InvocationContext};

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to create state directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: io::Error },

  #[error("failed to write {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("corrupt init record {}: {source}", path.display())]
  Corrupt { path: PathBuf, source: serde_json::Error },

  #[error("failed to serialize init record: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// Digest of one template file the manifest is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDigest {
  pub path: String,
  pub sha256: String,
}

impl TemplateDigest {
  pub fn of(path: &str, content: &str) -> Self {
    Self {
      path: path.to_string(),
      sha256: sha256_hex(content.as_bytes()),
    }
  }
}

/// What init records about an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRecord {
  pub version: u32,
  pub plugin_version: String,
  pub app_name: Option<String>,
  pub app_namespace: Option<String>,
  pub repo_url: Option<String>,
  pub source_path: Option<String>,
  pub templates: Vec<TemplateDigest>,
}

impl InitRecord {
  pub fn new(context: &InvocationContext, templates: Vec<TemplateDigest>) -> Self {
    let get = |key| context.get(key).map(str::to_string);
    Self {
      version: RECORD_VERSION,
      plugin_version: PLUGIN_VERSION.to_string(),
      app_name: get(ContextKey::AppName),
      app_namespace: get(ContextKey::AppNamespace),
      repo_url: get(ContextKey::SourceRepoUrl),
      source_path: get(ContextKey::SourcePath),
      templates,
    }
  }
}

/// Result of ensuring the state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
  pub state_dir: PathBuf,
  pub record_path: PathBuf,
  /// Whether this call changed anything on disk.
  pub changed: bool,
}

/// Root of per-application state directories.
#[derive(Debug, Clone)]
pub struct StateStore {
  root: PathBuf,
}

impl StateStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Directory for an application, stable across revisions.
  pub fn app_dir(&self, context: &InvocationContext) -> PathBuf {
    let identity = [
      ContextKey::AppNamespace,
      ContextKey::AppName,
      ContextKey::SourceRepoUrl,
      ContextKey::SourcePath,
    ]
    .map(|key| context.get(key).unwrap_or_default())
    .join("\n");

    let digest = sha256_hex(identity.as_bytes());
    self.root.join(&digest[..DIGEST_PREFIX_LEN])
  }

  /// Create the application's state directory and record. Idempotent: a
  /// second call with the same record changes nothing.
  pub fn ensure(&self, context: &InvocationContext, record: &InitRecord) -> Result<InitOutcome, StoreError> {
    let state_dir = self.app_dir(context);
    let record_path = state_dir.join(INIT_RECORD_FILE);

    fs::create_dir_all(&state_dir).map_err(|source| StoreError::CreateDir {
      path: state_dir.clone(),
      source,
    })?;

    let mut content = serde_json::to_string_pretty(record).map_err(StoreError::Serialize)?;
    content.push('\n');

    let unchanged = match fs::read_to_string(&record_path) {
      Ok(existing) => existing == content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => false,
      Err(source) => {
        return Err(StoreError::Read {
          path: record_path,
          source,
        });
      }
    };

    if unchanged {
      debug!(path = %record_path.display(), "init record up to date");
      return Ok(InitOutcome {
        state_dir,
        record_path,
        changed: false,
      });
    }

    write_atomic(&state_dir, &record_path, content.as_bytes())?;
    info!(path = %record_path.display(), "wrote init record");

    Ok(InitOutcome {
      state_dir,
      record_path,
      changed: true,
    })
  }

  /// Load the record for an application, if init has run.
  pub fn load(&self, context: &InvocationContext) -> Result<Option<InitRecord>, StoreError> {
    let path = self.app_dir(context).join(INIT_RECORD_FILE);
    let content = match fs::read_to_string(&path) {
      Ok(c) => c,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(StoreError::Read { path, source }),
    };
    serde_json::from_str(&content)
      .map(Some)
      .map_err(|source| StoreError::Corrupt { path, source })
  }
}

/// Write through a temp file in the same directory and rename into place, so
/// concurrent readers never see a partial record.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
  let write_err = |source| StoreError::Write {
    path: path.to_path_buf(),
    source,
  };

  let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
  tmp.write_all(bytes).map_err(write_err)?;
  tmp.persist(path).map_err(|e| write_err(e.error))?;
  Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn context(name: &str) -> InvocationContext {
    InvocationContext::builder()
      .set(ContextKey::AppName, name)
      .set(ContextKey::AppNamespace, "team-a")
      .set(ContextKey::SourceRepoUrl, "https://github.com/acme/infra.git")
      .set(ContextKey::Revision, "abc123")
      .build()
  }

  fn record(ctx: &InvocationContext) -> InitRecord {
    InitRecord::new(ctx, vec![TemplateDigest::of("stack.yaml.envsubst", "kind: Stack\n")])
  }

  #[test]
  fn ensure_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let ctx = context("demo");

    let first = store.ensure(&ctx, &record(&ctx)).unwrap();
    let bytes_after_first = fs::read(&first.record_path).unwrap();
    let second = store.ensure(&ctx, &record(&ctx)).unwrap();
    let bytes_after_second = fs::read(&second.record_path).unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(first.state_dir, second.state_dir);
    assert_eq!(bytes_after_first, bytes_after_second);
    assert_eq!(fs::read_dir(&first.state_dir).unwrap().count(), 1, "no stray temp files");
  }

  #[test]
  fn template_change_rewrites_record() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let ctx = context("demo");

    store.ensure(&ctx, &record(&ctx)).unwrap();
    let updated = InitRecord::new(&ctx, vec![TemplateDigest::of("stack.yaml.envsubst", "kind: Other\n")]);
    let outcome = store.ensure(&ctx, &updated).unwrap();

    assert!(outcome.changed);
    assert_eq!(store.load(&ctx).unwrap(), Some(updated));
  }

  #[test]
  fn app_dir_ignores_revision_but_not_identity() {
    let store = StateStore::new("/state");
    let a = context("demo");
    let b = InvocationContext::builder()
      .set(ContextKey::AppName, "demo")
      .set(ContextKey::AppNamespace, "team-a")
      .set(ContextKey::SourceRepoUrl, "https://github.com/acme/infra.git")
      .set(ContextKey::Revision, "def456")
      .build();

    assert_eq!(store.app_dir(&a), store.app_dir(&b));
    assert_ne!(store.app_dir(&a), store.app_dir(&context("other")));
    assert_eq!(
      store.app_dir(&a).file_name().unwrap().len(),
      DIGEST_PREFIX_LEN,
      "digest prefix names the directory"
    );
  }

  #[test]
  fn load_before_init_is_none() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    assert_eq!(store.load(&context("demo")).unwrap(), None);
  }

  #[test]
  fn corrupt_record_is_reported() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let ctx = context("demo");
    let dir = store.app_dir(&ctx);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(INIT_RECORD_FILE), "{").unwrap();

    assert!(matches!(store.load(&ctx), Err(StoreError::Corrupt { .. })));
  }

  #[test]
  fn sha256_is_hex_encoded() {
    assert_eq!(
      sha256_hex(b""),
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }
}
