//! Build file discovery and evaluation.
//!
//! A build file is a TOML document named `BUILD` holding one `[[target]]`
//! table per target:
//!
//! ```toml
//! [[target]]
//! type = "gen_rule"
//! name = "version"
//! srcs = ["version.in"]
//! deps = ["//tools:stamp"]
//! visibility = ["//app:..."]
//! outs = ["version.h"]
//! cmd = "$(location //tools:stamp) $SRCS > $OUTS"
//! ```
//!
//! Keys other than `type`, `name`, `srcs`, `deps` and `visibility` are kind
//! options.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::consts::{BUILD_FILE_NAME, ROOT_DIR};
use crate::kinds::{self, take_string, take_strings};
use crate::registry::{Registry, TargetDatabase};
use crate::target::{Target, TargetDecl, TargetError};
use crate::util::path::join;

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to traverse directory {path}: {source}")]
  WalkDir {
    path: String,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to parse {path}: {message}")]
  Parse { path: String, message: String },

  #[error("{location}: target \"{key}\" is already defined")]
  DuplicateTarget { location: String, key: String },

  #[error("{location}: {source}")]
  Target {
    location: String,
    #[source]
    source: TargetError,
  },
}

/// One `[[target]]` entry before kind dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
  pub type_name: String,
  pub decl: TargetDecl,
}

#[derive(Deserialize)]
struct BuildFile {
  #[serde(default)]
  target: Vec<toml::Spanned<toml::Table>>,
}

/// Parse the content of one build file.
///
/// `path` is only used in error messages.
pub fn parse_build_file(content: &str, path: &str) -> Result<Vec<Declaration>, LoadError> {
  let file: BuildFile = toml::from_str(content).map_err(|e| LoadError::Parse {
    path: path.to_string(),
    message: e.to_string(),
  })?;

  let mut declarations = Vec::with_capacity(file.target.len());
  for entry in file.target {
    let line = line_of(content, entry.span().start);
    let table = entry.into_inner();
    let location = format!("{path}:{line}");
    let declaration = declaration_from_table(table, line).map_err(|source| LoadError::Target { location, source })?;
    declarations.push(declaration);
  }
  Ok(declarations)
}

fn line_of(content: &str, offset: usize) -> usize {
  let offset = offset.min(content.len());
  content.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

fn declaration_from_table(table: toml::Table, line: usize) -> Result<Declaration, TargetError> {
  let mut options: BTreeMap<String, Value> = table
    .into_iter()
    .map(|(k, v)| serde_json::to_value(v).map(|v| (k, v)))
    .collect::<Result<_, _>>()
    .map_err(|e| TargetError::InvalidFormat(e.to_string()))?;

  let type_name = take_string(&mut options, "type")?.ok_or_else(|| TargetError::InvalidOption {
    option: "type".to_string(),
    message: "is required".to_string(),
  })?;
  let name = take_string(&mut options, "name")?.unwrap_or_default();
  let srcs = take_strings(&mut options, "srcs")?;
  let deps = take_strings(&mut options, "deps")?;
  let visibility = if options.contains_key("visibility") {
    Some(take_strings(&mut options, "visibility")?)
  } else {
    None
  };

  Ok(Declaration {
    type_name,
    decl: TargetDecl {
      name,
      srcs,
      deps,
      visibility,
      options,
      line: Some(line),
    },
  })
}

/// Evaluate the build file of directory `dir` (relative to `root`).
///
/// Returns the number of targets registered.
pub fn load_build_file(root: &Path, dir: &str, registry: &TargetDatabase) -> Result<usize, LoadError> {
  let rel_path = join(dir, BUILD_FILE_NAME);
  let path = root.join(&rel_path);
  let content = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
    path: path.display().to_string(),
    source,
  })?;

  registry.set_current_source_dir(dir);
  let declarations = parse_build_file(&content, &rel_path)?;
  let count = declarations.len();

  for Declaration { type_name, mut decl } in declarations {
    let location = format!("{}:{}", rel_path, decl.line.unwrap_or(0));
    let to_load_error = |source| LoadError::Target {
      location: location.clone(),
      source,
    };

    let kind = kinds::create(&type_name, &mut decl.options).map_err(to_load_error)?;
    let target = Target::new(decl, kind, registry).map_err(to_load_error)?;
    let key = target.key().to_string();
    if !registry.register(Arc::new(target)) {
      return Err(LoadError::DuplicateTarget { location, key });
    }
  }

  debug!(file = %rel_path, targets = count, "loaded build file");
  Ok(count)
}

/// Find and evaluate every build file below `root`.
///
/// Hidden directories and the build directory are skipped. Files are visited
/// in sorted order so registration order is reproducible.
pub fn load_tree(root: &Path, registry: &TargetDatabase) -> Result<usize, LoadError> {
  let build_dir = root.join(registry.build_dir());
  let mut total = 0;

  let walker = WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| !is_skipped_dir(entry, root, &build_dir));

  for entry in walker {
    let entry = entry.map_err(|source| LoadError::WalkDir {
      path: root.display().to_string(),
      source,
    })?;
    if !entry.file_type().is_file() || entry.file_name() != BUILD_FILE_NAME {
      continue;
    }

    let dir = entry
      .path()
      .parent()
      .and_then(|parent| parent.strip_prefix(root).ok())
      .map(relative_dir)
      .unwrap_or_else(|| ROOT_DIR.to_string());
    total += load_build_file(root, &dir, registry)?;
  }

  info!(targets = total, "loaded build files");
  Ok(total)
}

fn is_skipped_dir(entry: &DirEntry, root: &Path, build_dir: &Path) -> bool {
  if !entry.file_type().is_dir() || entry.path() == root {
    return false;
  }
  entry.path() == build_dir || entry.file_name().to_string_lossy().starts_with('.')
}

fn relative_dir(path: &Path) -> String {
  let parts: Vec<String> = path
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();
  if parts.is_empty() {
    ROOT_DIR.to_string()
  } else {
    parts.join("/")
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::TempDir;

  use super::*;
  use crate::config::Config;
  use crate::key::TargetKey;

  fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  const TOOLS_BUILD: &str = r#"
[[target]]
type = "gen_rule"
name = "stamp"
outs = ["stamp.sh"]
cmd = "echo date > $OUTS"
"#;

  const APP_BUILD: &str = r#"
[[target]]
type = "gen_rule"
name = "version"
srcs = ["version.in"]
visibility = ["PUBLIC"]
outs = "version.h"
cmd = "$(location //tools:stamp) $SRCS > $OUTS"

[[target]]
type = "gen_rule"
name = "banner"
deps = [":version"]
outs = ["banner.txt"]
cmd = "cat $(location :version) > $OUTS"
"#;

  #[test]
  fn parse_declarations() {
    let declarations = parse_build_file(APP_BUILD, "app/BUILD").unwrap();
    assert_eq!(declarations.len(), 2);

    let version = &declarations[0];
    assert_eq!(version.type_name, "gen_rule");
    assert_eq!(version.decl.name, "version");
    assert_eq!(version.decl.srcs, vec!["version.in"]);
    assert_eq!(version.decl.visibility, Some(vec!["PUBLIC".to_string()]));
    assert_eq!(version.decl.options.get("outs"), Some(&serde_json::json!("version.h")));

    let banner = &declarations[1];
    assert_eq!(banner.decl.deps, vec![":version"]);
    assert_eq!(banner.decl.visibility, None);
    assert!(banner.decl.line.unwrap() > version.decl.line.unwrap());
  }

  #[test]
  fn parse_requires_type() {
    let err = parse_build_file("[[target]]\nname = \"x\"\n", "BUILD").unwrap_err();
    assert!(matches!(err, LoadError::Target { ref location, .. } if location.starts_with("BUILD:")));
  }

  #[test]
  fn parse_reports_syntax_errors() {
    let err = parse_build_file("[[target]\n", "a/BUILD").unwrap_err();
    assert!(matches!(err, LoadError::Parse { ref path, .. } if path == "a/BUILD"));
  }

  #[test]
  fn line_counting() {
    assert_eq!(line_of("a\nb\nc", 0), 1);
    assert_eq!(line_of("a\nb\nc", 2), 2);
    assert_eq!(line_of("a\nb\nc", 100), 3);
  }

  #[test]
  fn load_tree_registers_all_targets() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "tools/BUILD", TOOLS_BUILD);
    write(temp.path(), "app/BUILD", APP_BUILD);
    write(temp.path(), "build64_release/stale/BUILD", "not toml [");
    write(temp.path(), ".git/BUILD", "not toml [");

    let db = TargetDatabase::new(Config::default());
    let count = load_tree(temp.path(), &db).unwrap();

    assert_eq!(count, 3);
    let keys: Vec<String> = db.keys().into_iter().map(|k| k.0).collect();
    assert_eq!(keys, vec!["app:banner", "app:version", "tools:stamp"]);

    let version = db.lookup(&TargetKey("app:version".to_string())).unwrap();
    assert_eq!(version.deps()[0].as_str(), "tools:stamp");
    assert_eq!(version.source_location().file, "app/BUILD");
  }

  #[test]
  fn load_root_build_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "BUILD", TOOLS_BUILD);

    let db = TargetDatabase::new(Config::default());
    load_tree(temp.path(), &db).unwrap();
    assert!(db.contains(&TargetKey(".:stamp".to_string())));
  }

  #[test]
  fn duplicate_target_is_rejected() {
    let temp = TempDir::new().unwrap();
    let twice = format!("{TOOLS_BUILD}\n{TOOLS_BUILD}");
    write(temp.path(), "tools/BUILD", &twice);

    let db = TargetDatabase::new(Config::default());
    let err = load_tree(temp.path(), &db).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateTarget { ref key, .. } if key == "tools:stamp"));
  }

  #[test]
  fn unknown_type_and_options_are_rejected() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a/BUILD", "[[target]]\ntype = \"cc_library\"\nname = \"x\"\n");
    let db = TargetDatabase::new(Config::default());
    let err = load_tree(temp.path(), &db).unwrap_err();
    assert!(err.to_string().contains("unknown target type \"cc_library\""));

    let temp = TempDir::new().unwrap();
    write(
      temp.path(),
      "a/BUILD",
      "[[target]]\ntype = \"gen_rule\"\nname = \"x\"\nouts = \"o\"\ncmd = \"true\"\nlinkflags = []\n",
    );
    let db = TargetDatabase::new(Config::default());
    let err = load_tree(temp.path(), &db).unwrap_err();
    assert!(matches!(
      err,
      LoadError::Target { source: TargetError::UnrecognizedOptions(ref names), .. } if names == &["linkflags"]
    ));
  }
}
