//! Manifest templates with `${NAME}` variable references.
//!
//! A template is split into YAML documents on `---` delimiter lines *before*
//! any substitution happens, so substituted values can never change how many
//! documents a template produces or their order.
//!
//! # Syntax
//!
//! - `${NAME}` references a variable. `NAME` is an identifier optionally
//!   followed by dotted segments, e.g. `${ARGOCD_APP_NAME}` or
//!   `${parameters.org}`.
//! - A `$` not followed by `{` is literal, so `$HOME` passes through.
//! - `$${` produces a literal `${`.
//!
//! # Example
//!
//! ```
//! use stackcmp_lib::template::ManifestTemplate;
//!
//! let template = ManifestTemplate::parse("stack.yaml.envsubst", "kind: Stack\nname: ${app.name}\n").unwrap();
//! assert_eq!(template.documents().len(), 1);
//! assert_eq!(template.references().collect::<Vec<_>>(), vec!["app.name"]);
//! ```

mod render;

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::manifest::RenderedDocument;
use crate::resolve::{ResolveError, ResolvedVariables};

pub use render::Renderer;

/// What went wrong in a malformed variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
  /// `${` without a closing `}` on the same line.
  Unclosed,
  /// `${}`.
  EmptyName,
  /// A name that is not `IDENT(.SEGMENT)*`.
  InvalidName(String),
}

impl fmt::Display for SyntaxErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SyntaxErrorKind::Unclosed => f.write_str("unclosed variable reference"),
      SyntaxErrorKind::EmptyName => f.write_str("empty variable reference"),
      SyntaxErrorKind::InvalidName(name) => write!(f, "invalid variable name '{name}'"),
    }
  }
}

/// Malformed variable-reference syntax, located in the template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template syntax error in {template} at line {line}, column {column}: {kind}")]
pub struct TemplateSyntaxError {
  pub template: String,
  pub line: usize,
  pub column: usize,
  pub kind: SyntaxErrorKind,
}

/// A piece of a template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Variable(String),
}

/// One YAML document of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
  /// Line in the template source where this document starts (1-based).
  pub line: usize,
  pub segments: Vec<Segment>,
}

impl TemplateDocument {
  fn substitute(&self, vars: &ResolvedVariables) -> Result<String, ResolveError> {
    let mut out = String::new();
    for segment in &self.segments {
      match segment {
        Segment::Literal(text) => out.push_str(text),
        Segment::Variable(name) => out.push_str(vars.require(name)?),
      }
    }
    Ok(out)
  }
}

/// A parsed template: an ordered list of documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTemplate {
  name: String,
  documents: Vec<TemplateDocument>,
}

impl ManifestTemplate {
  /// Parse template source. `name` identifies the template in errors and output.
  pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, TemplateSyntaxError> {
    let name = name.into();
    let documents = split_documents(source)
      .into_iter()
      .map(|(line, text)| {
        Ok(TemplateDocument {
          line,
          segments: parse_segments(&name, text, line)?,
        })
      })
      .collect::<Result<Vec<_>, TemplateSyntaxError>>()?;

    Ok(Self { name, documents })
  }

  /// Treat source as plain manifests: split into documents, no substitution.
  pub fn literal(name: impl Into<String>, source: &str) -> Self {
    let documents = split_documents(source)
      .into_iter()
      .map(|(line, text)| TemplateDocument {
        line,
        segments: vec![Segment::Literal(text.to_string())],
      })
      .collect();

    Self {
      name: name.into(),
      documents,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn documents(&self) -> &[TemplateDocument] {
    &self.documents
  }

  /// Referenced variable names in order of first appearance.
  pub fn references(&self) -> impl Iterator<Item = &str> {
    let mut seen = std::collections::HashSet::new();
    self
      .documents
      .iter()
      .flat_map(|doc| doc.segments.iter())
      .filter_map(|segment| match segment {
        Segment::Variable(name) => Some(name.as_str()),
        Segment::Literal(_) => None,
      })
      .filter(move |name| seen.insert(*name))
  }

  /// Substitute resolved variables into every document, preserving order.
  pub fn render(&self, vars: &ResolvedVariables) -> Result<Vec<RenderedDocument>, ResolveError> {
    self
      .documents
      .iter()
      .enumerate()
      .map(|(index, doc)| {
        Ok(RenderedDocument {
          source: self.name.clone(),
          index,
          line: doc.line,
          content: doc.substitute(vars)?,
        })
      })
      .collect()
  }
}

fn is_delimiter(line: &str) -> bool {
  line.trim_end() == "---"
}

/// Lines that carry no YAML content.
fn is_insignificant(text: &str) -> bool {
  text.lines().all(|line| {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
  })
}

/// Split source into `(start_line, text)` documents on `---` lines.
///
/// A blank or comment-only chunk before the first delimiter or after the last
/// one is dropped; interior empty documents are kept for the emitter to reject.
fn split_documents(source: &str) -> Vec<(usize, &str)> {
  let mut chunks = Vec::new();
  let mut start = 0;
  let mut start_line = 1;
  let mut offset = 0;
  let mut line_no = 1;

  for line in source.split_inclusive('\n') {
    if is_delimiter(line) {
      chunks.push((start_line, &source[start..offset]));
      start = offset + line.len();
      start_line = line_no + 1;
    }
    offset += line.len();
    line_no += 1;
  }
  chunks.push((start_line, &source[start..]));

  if chunks.last().is_some_and(|(_, text)| is_insignificant(text)) {
    chunks.pop();
  }
  if chunks.first().is_some_and(|(_, text)| is_insignificant(text)) {
    chunks.remove(0);
  }

  chunks
}

struct Cursor<'a> {
  chars: Peekable<Chars<'a>>,
  line: usize,
  column: usize,
}

impl<'a> Cursor<'a> {
  fn new(text: &'a str, line: usize) -> Self {
    Self {
      chars: text.chars().peekable(),
      line,
      column: 1,
    }
  }

  fn peek(&mut self) -> Option<char> {
    self.chars.peek().copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.chars.next()?;
    if c == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(c)
  }
}

fn parse_segments(template: &str, text: &str, first_line: usize) -> Result<Vec<Segment>, TemplateSyntaxError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut cursor = Cursor::new(text, first_line);

  let error = |line, column, kind| TemplateSyntaxError {
    template: template.to_string(),
    line,
    column,
    kind,
  };

  while let Some(ch) = cursor.peek() {
    if ch != '$' {
      literal.push(ch);
      cursor.bump();
      continue;
    }

    let (line, column) = (cursor.line, cursor.column);
    cursor.bump();

    match cursor.peek() {
      Some('$') => {
        cursor.bump();
        if cursor.peek() == Some('{') {
          // Escaped: $${ -> ${
          cursor.bump();
          literal.push_str("${");
        } else {
          literal.push_str("$$");
        }
      }
      Some('{') => {
        cursor.bump();

        let mut name = String::new();
        let mut closed = false;
        while let Some(c) = cursor.bump() {
          match c {
            '}' => {
              closed = true;
              break;
            }
            '\n' => break,
            _ => name.push(c),
          }
        }

        if !closed {
          return Err(error(line, column, SyntaxErrorKind::Unclosed));
        }
        if name.is_empty() {
          return Err(error(line, column, SyntaxErrorKind::EmptyName));
        }
        if !is_valid_name(&name) {
          return Err(error(line, column, SyntaxErrorKind::InvalidName(name)));
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Variable(name));
      }
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// `IDENT(.SEGMENT)*` where IDENT is `[A-Za-z_][A-Za-z0-9_]*` and SEGMENT is
/// `[A-Za-z0-9_-]+`.
fn is_valid_name(name: &str) -> bool {
  let mut parts = name.split('.');
  let Some(head) = parts.next() else {
    return false;
  };

  let mut head_chars = head.chars();
  let head_ok = head_chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && head_chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

  head_ok
    && parts.all(|part| {
      !part.is_empty()
        && part
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}
