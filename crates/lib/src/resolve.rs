//! Variable resolution against an invocation context.
//!
//! The resolver maps every name a template references to a value, taken from
//! the [`InvocationContext`] first and from declared defaults second. A name
//! found in neither is an error: nothing is ever substituted as an empty
//! string by accident.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::context::InvocationContext;

/// Errors that can occur during variable resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error("unresolved variable: {0}")]
  UnresolvedVariable(String),
}

/// Name to value mapping produced by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVariables(BTreeMap<String, String>);

impl ResolvedVariables {
  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  /// Like [`get`](Self::get), but a missing name is an error.
  pub fn require(&self, name: &str) -> Result<&str, ResolveError> {
    self
      .get(name)
      .ok_or_else(|| ResolveError::UnresolvedVariable(name.to_string()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<BTreeMap<String, String>> for ResolvedVariables {
  fn from(map: BTreeMap<String, String>) -> Self {
    Self(map)
  }
}

/// Resolves names against a context plus declared defaults.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
  context: &'a InvocationContext,
  defaults: &'a BTreeMap<String, String>,
}

impl<'a> Resolver<'a> {
  pub fn new(context: &'a InvocationContext, defaults: &'a BTreeMap<String, String>) -> Self {
    Self { context, defaults }
  }

  /// Look up a single name. Context values win over defaults.
  pub fn lookup(&self, name: &str) -> Option<&'a str> {
    self
      .context
      .lookup(name)
      .or_else(|| self.defaults.get(name).map(String::as_str))
  }

  /// Resolve every name, failing on the first one that has no value.
  pub fn resolve<'n, I>(&self, names: I) -> Result<ResolvedVariables, ResolveError>
  where
    I: IntoIterator<Item = &'n str>,
  {
    let mut resolved = BTreeMap::new();
    for name in names {
      let value = self
        .lookup(name)
        .ok_or_else(|| ResolveError::UnresolvedVariable(name.to_string()))?;
      resolved.insert(name.to_string(), value.to_string());
    }

    debug!(count = resolved.len(), "resolved template variables");
    Ok(ResolvedVariables(resolved))
  }
}
