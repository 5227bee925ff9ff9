//! Application source tree access: discovery and template loading.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// `*` and `?` never cross a `/`; only `**` descends into directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: false,
};

/// I/O failures while reading the application source.
#[derive(Debug, Error)]
pub enum SourceError {
  #[error("source path {} is not accessible: {source}", path.display())]
  Open { path: PathBuf, source: io::Error },

  #[error("source path {} is not a directory", path.display())]
  NotADirectory { path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to walk {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error("invalid template glob '{pattern}': {source}")]
  Pattern { pattern: String, source: PatternError },
}

/// A file loaded from the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
  /// Path relative to the source root, `/`-separated.
  pub relative: String,
  pub content: String,
}

/// The application source checked out by the GitOps controller.
#[derive(Debug, Clone)]
pub struct SourceTree {
  root: PathBuf,
}

impl SourceTree {
  pub fn open(path: &Path) -> Result<Self, SourceError> {
    let root = dunce::canonicalize(path).map_err(|source| SourceError::Open {
      path: path.to_path_buf(),
      source,
    })?;
    if !root.is_dir() {
      return Err(SourceError::NotADirectory { path: root });
    }
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Path of the marker file if it exists at the source root.
  pub fn marker(&self, file_name: &str) -> Option<PathBuf> {
    let path = self.root.join(file_name);
    let found = path.is_file();
    debug!(marker = %path.display(), found, "checked discovery marker");
    found.then_some(path)
  }

  /// Files matching any of the globs, sorted by relative path.
  ///
  /// A glob without `**` is only matched as deep as it has path components,
  /// so `*.envsubst` never walks large trees like `node_modules`.
  pub fn find_templates(&self, globs: &[String]) -> Result<Vec<SourceFile>, SourceError> {
    let mut matches = Vec::new();

    for glob in globs {
      let pattern = Pattern::new(glob).map_err(|source| SourceError::Pattern {
        pattern: glob.clone(),
        source,
      })?;
      let depth = if glob.contains("**") {
        usize::MAX
      } else {
        glob.split('/').count()
      };

      for relative in self.walk_files(&self.root, depth)? {
        if pattern.matches_with(&relative, MATCH_OPTIONS) && !matches.contains(&relative) {
          matches.push(relative);
        }
      }
    }

    matches.sort();
    matches.into_iter().map(|relative| self.read(relative)).collect()
  }

  /// Every `*.yaml` / `*.yml` file below `dir`, sorted by relative path.
  /// A missing directory yields nothing.
  pub fn find_manifests(&self, dir: &str) -> Result<Vec<SourceFile>, SourceError> {
    if dir.is_empty() {
      return Ok(Vec::new());
    }
    let base = self.root.join(dir);
    if !base.is_dir() {
      return Ok(Vec::new());
    }

    let mut files: Vec<String> = self
      .walk_files(&base, usize::MAX)?
      .into_iter()
      .filter(|relative| relative.ends_with(".yaml") || relative.ends_with(".yml"))
      .collect();
    files.sort();
    files.into_iter().map(|relative| self.read(relative)).collect()
  }

  fn walk_files(&self, base: &Path, max_depth: usize) -> Result<Vec<String>, SourceError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(base).min_depth(1).max_depth(max_depth) {
      let entry = entry.map_err(|source| SourceError::Walk {
        path: base.to_path_buf(),
        source,
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      if let Ok(relative) = entry.path().strip_prefix(&self.root) {
        let relative = relative
          .components()
          .map(|c| c.as_os_str().to_string_lossy())
          .collect::<Vec<_>>()
          .join("/");
        files.push(relative);
      }
    }
    Ok(files)
  }

  fn read(&self, relative: String) -> Result<SourceFile, SourceError> {
    let path = self.root.join(&relative);
    let content = fs::read_to_string(&path).map_err(|source| SourceError::Read { path, source })?;
    Ok(SourceFile { relative, content })
  }
}
