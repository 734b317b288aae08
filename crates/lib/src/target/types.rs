use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::TargetKey;

/// Declaration data of one target, as written in a build file.
///
/// `options` holds kind-specific properties. The kind factory removes what it
/// understands; anything left over is reported as an unrecognized option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetDecl {
  pub name: String,
  pub srcs: Vec<String>,
  pub deps: Vec<String>,
  pub visibility: Option<Vec<String>>,
  pub options: BTreeMap<String, Value>,
  /// Line of the declaration inside its build file, if known.
  pub line: Option<usize>,
}

impl TargetDecl {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn srcs<S: Into<String>>(mut self, srcs: impl IntoIterator<Item = S>) -> Self {
    self.srcs = srcs.into_iter().map(Into::into).collect();
    self
  }

  pub fn deps<S: Into<String>>(mut self, deps: impl IntoIterator<Item = S>) -> Self {
    self.deps = deps.into_iter().map(Into::into).collect();
    self
  }

  pub fn visibility<S: Into<String>>(mut self, visibility: impl IntoIterator<Item = S>) -> Self {
    self.visibility = Some(visibility.into_iter().map(Into::into).collect());
    self
  }

  pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.options.insert(name.into(), value.into());
    self
  }

  pub fn line(mut self, line: usize) -> Self {
    self.line = Some(line);
    self
  }
}

/// Which targets may depend on a target.
///
/// Targets declared in the same directory always see each other. Checked by
/// [`crate::graph::TargetGraph::check_visibility`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
  Public,
  Only(Vec<TargetKey>),
}

impl Visibility {
  pub fn is_public(&self) -> bool {
    matches!(self, Visibility::Public)
  }

  pub fn to_json(&self) -> Value {
    match self {
      Visibility::Public => Value::String(crate::consts::PUBLIC_VISIBILITY.to_string()),
      Visibility::Only(keys) => Value::Array(keys.iter().map(|k| Value::String(k.0.clone())).collect()),
    }
  }
}

/// One generated artifact, or a group of artifacts sharing a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetFile {
  Single(String),
  Multiple(Vec<String>),
}

impl TargetFile {
  pub fn paths(&self) -> Vec<&str> {
    match self {
      TargetFile::Single(path) => vec![path.as_str()],
      TargetFile::Multiple(paths) => paths.iter().map(String::as_str).collect(),
    }
  }

  /// Space separated form, as substituted into commands.
  pub fn joined(&self) -> String {
    self.paths().join(" ")
  }
}

impl From<&str> for TargetFile {
  fn from(path: &str) -> Self {
    TargetFile::Single(path.to_string())
  }
}

impl From<String> for TargetFile {
  fn from(path: String) -> Self {
    TargetFile::Single(path)
  }
}

impl From<Vec<String>> for TargetFile {
  fn from(paths: Vec<String>) -> Self {
    TargetFile::Multiple(paths)
  }
}

/// Where a target was declared, e.g. `common/base/BUILD:12`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
  pub file: String,
  pub line: Option<usize>,
}

impl std::fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.line {
      Some(line) => write!(f, "{}:{}", self.file, line),
      None => write!(f, "{}", self.file),
    }
  }
}
