//! Rendered manifests and the emitter that validates and serializes them.
//!
//! The emitter is the last gate before output reaches the GitOps controller.
//! It checks every document and only then produces the YAML stream, so a
//! manifest set is either emitted whole or not at all.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ValidationConfig;

/// Errors raised while validating rendered documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
  #[error("{location}: document is empty")]
  EmptyDocument { location: String },

  #[error("{location}: missing required field '{field}'")]
  MissingRequiredField { location: String, field: &'static str },

  #[error("{location}: invalid YAML: {message}")]
  InvalidYaml { location: String, message: String },

  #[error("{location}: Stack env '{key}' is a literal value; reference a Secret instead")]
  LiteralSecret { location: String, key: String },
}

/// One rendered YAML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
  /// Name of the template the document came from.
  pub source: String,
  /// Position of the document within its template.
  pub index: usize,
  /// Line in the template where the document starts.
  pub line: usize,
  pub content: String,
}

impl RenderedDocument {
  pub fn location(&self) -> String {
    format!("{} (document {}, line {})", self.source, self.index + 1, self.line)
  }
}

/// Ordered documents produced by rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedManifest {
  documents: Vec<RenderedDocument>,
}

impl RenderedManifest {
  pub fn new(documents: Vec<RenderedDocument>) -> Self {
    Self { documents }
  }

  pub fn documents(&self) -> &[RenderedDocument] {
    &self.documents
  }

  pub fn len(&self) -> usize {
    self.documents.len()
  }

  pub fn is_empty(&self) -> bool {
    self.documents.is_empty()
  }

  pub fn extend(&mut self, other: RenderedManifest) {
    self.documents.extend(other.documents);
  }
}

/// Identity of a validated Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
  pub api_version: String,
  pub kind: String,
  pub name: Option<String>,
  pub namespace: Option<String>,
}

/// Validates rendered documents and joins them into a YAML stream.
#[derive(Debug, Clone)]
pub struct Emitter {
  reject_literal_secrets: bool,
  secret_env_keys: Vec<String>,
}

impl Default for Emitter {
  fn default() -> Self {
    Self::new(&ValidationConfig::default())
  }
}

impl Emitter {
  pub fn new(policy: &ValidationConfig) -> Self {
    Self {
      reject_literal_secrets: policy.reject_literal_secrets,
      secret_env_keys: policy.secret_env_keys.clone(),
    }
  }

  /// Validate every document, returning a summary of each in order.
  pub fn validate(&self, manifest: &RenderedManifest) -> Result<Vec<ObjectSummary>, ManifestError> {
    let mut summaries = Vec::with_capacity(manifest.len());
    let mut stacks = Vec::new();

    for doc in manifest.documents() {
      let object = parse_object(doc)?;
      let summary = summarize(doc, &object)?;

      if summary.kind == "Stack" {
        if self.reject_literal_secrets {
          self.check_secret_refs(doc, &object)?;
        }
        if let Some(account) = lookup_str(&object, &["spec", "serviceAccountName"]) {
          stacks.push((summaries.len(), account.to_string(), summary.namespace.clone()));
        }
      }

      summaries.push(summary);
    }

    lint_service_account_order(&summaries, &stacks);

    debug!(documents = summaries.len(), "validated manifest");
    Ok(summaries)
  }

  /// Validate and serialize. Nothing is returned unless every document passes.
  pub fn emit(&self, manifest: &RenderedManifest) -> Result<String, ManifestError> {
    self.validate(manifest)?;

    if manifest.is_empty() {
      return Ok(String::new());
    }

    // Content is kept byte for byte: a trailing `|+` block owns its blank lines.
    let mut out = String::new();
    for (index, doc) in manifest.documents().iter().enumerate() {
      if index > 0 {
        out.push_str("---\n");
      }
      out.push_str(&doc.content);
      if !doc.content.ends_with('\n') {
        out.push('\n');
      }
    }
    Ok(out)
  }

  fn check_secret_refs(&self, doc: &RenderedDocument, object: &Mapping) -> Result<(), ManifestError> {
    if let Some(env_refs) = lookup(object, &["spec", "envRefs"]).and_then(Value::as_mapping) {
      for (key, entry) in env_refs {
        let Some(key) = key.as_str() else { continue };
        let is_literal = entry.get("type").and_then(Value::as_str) == Some("Literal");
        if is_literal && self.is_secret_key(key) {
          return Err(ManifestError::LiteralSecret {
            location: doc.location(),
            key: key.to_string(),
          });
        }
      }
    }

    // Older Stack revisions carried plain `envs`; any secret key there is a literal.
    if let Some(envs) = lookup(object, &["spec", "envs"]).and_then(Value::as_mapping) {
      for key in envs.keys().filter_map(Value::as_str) {
        if self.is_secret_key(key) {
          return Err(ManifestError::LiteralSecret {
            location: doc.location(),
            key: key.to_string(),
          });
        }
      }
    }

    Ok(())
  }

  fn is_secret_key(&self, key: &str) -> bool {
    self.secret_env_keys.iter().any(|k| k == key)
  }
}

fn is_blank(content: &str) -> bool {
  content.lines().all(|line| {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
  })
}

fn parse_object(doc: &RenderedDocument) -> Result<Mapping, ManifestError> {
  if is_blank(&doc.content) {
    return Err(ManifestError::EmptyDocument {
      location: doc.location(),
    });
  }

  let value: Value = serde_yaml::from_str(&doc.content).map_err(|e| ManifestError::InvalidYaml {
    location: doc.location(),
    message: e.to_string(),
  })?;

  match value {
    Value::Mapping(mapping) => Ok(mapping),
    Value::Null => Err(ManifestError::EmptyDocument {
      location: doc.location(),
    }),
    _ => Err(ManifestError::MissingRequiredField {
      location: doc.location(),
      field: "apiVersion",
    }),
  }
}

fn summarize(doc: &RenderedDocument, object: &Mapping) -> Result<ObjectSummary, ManifestError> {
  let required = |field: &'static str| {
    object
      .get(field)
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .ok_or_else(|| ManifestError::MissingRequiredField {
        location: doc.location(),
        field,
      })
  };

  Ok(ObjectSummary {
    api_version: required("apiVersion")?,
    kind: required("kind")?,
    name: lookup_str(object, &["metadata", "name"]).map(str::to_string),
    namespace: lookup_str(object, &["metadata", "namespace"]).map(str::to_string),
  })
}

fn lookup<'v>(object: &'v Mapping, path: &[&str]) -> Option<&'v Value> {
  let (first, rest) = path.split_first()?;
  let mut current = object.get(*first)?;
  for key in rest {
    current = current.get(*key)?;
  }
  Some(current)
}

fn lookup_str<'v>(object: &'v Mapping, path: &[&str]) -> Option<&'v str> {
  lookup(object, path).and_then(Value::as_str)
}

/// Warn when a Stack names a ServiceAccount that is declared after it.
///
/// Apply order is the controller's business (sync waves); this only flags
/// templates whose emitted order reads backwards.
fn lint_service_account_order(summaries: &[ObjectSummary], stacks: &[(usize, String, Option<String>)]) {
  for (stack_index, account, namespace) in stacks {
    let declared_later = summaries.iter().enumerate().skip(stack_index + 1).any(|(_, s)| {
      s.kind == "ServiceAccount"
        && s.name.as_deref() == Some(account.as_str())
        && (s.namespace.is_none() || namespace.is_none() || &s.namespace == namespace)
    });

    if declared_later {
      warn!(
        service_account = %account,
        stack = summaries[*stack_index].name.as_deref().unwrap_or("<unnamed>"),
        "Stack references a ServiceAccount declared after it"
      );
    }
  }
}
