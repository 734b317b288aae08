//! Writing generated rules to ninja files.
//!
//! Each target gets its own `<build_dir>/<dir>/<name>.ninja`, whose first line
//! records the rule hash the file was generated from. A file whose recorded
//! hash equals the current one is left untouched, so unchanged targets cost
//! one line read. The root `build.ninja` defines the shared rules and
//! includes every per-target file.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::{RULE_HASH_HEADER, ROOT_NINJA_FILE};
use crate::kinds::rule_prelude;
use crate::registry::Registry;
use crate::target::{Target, TargetError};
use crate::util::hash::ContentHash;
use crate::util::path::{join, normpath};

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("failed to write {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Target(#[from] TargetError),
}

/// What [`write_target`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Written,
  Unchanged,
}

/// Per-target ninja file, relative to the source root.
pub fn ninja_file(target: &Target, registry: &dyn Registry) -> String {
  normpath(&join(
    &join(registry.build_dir(), target.path()),
    &format!("{}.ninja", target.name()),
  ))
}

/// Hash recorded in the first line of an existing ninja file.
pub fn recorded_hash(path: &Path) -> Option<ContentHash> {
  let file = fs::File::open(path).ok()?;
  let mut first = String::new();
  BufReader::new(file).read_line(&mut first).ok()?;
  first
    .trim_end()
    .strip_prefix(RULE_HASH_HEADER)
    .map(|hash| ContentHash(hash.to_string()))
}

/// Write the ninja file of `target` unless it already matches `hash`.
pub fn write_target(
  root: &Path,
  target: &Target,
  hash: &ContentHash,
  registry: &dyn Registry,
) -> Result<WriteOutcome, BackendError> {
  let rel_path = ninja_file(target, registry);
  let path = root.join(&rel_path);

  if recorded_hash(&path).as_ref() == Some(hash) {
    debug!(key = %target.key(), "rules unchanged");
    return Ok(WriteOutcome::Unchanged);
  }

  let rules = target.get_rules(registry)?;
  let content = format!("{RULE_HASH_HEADER}{hash}\n{}", rules.text());
  write_file(&path, &content)?;
  debug!(key = %target.key(), file = %rel_path, "wrote rules");
  Ok(WriteOutcome::Written)
}

/// Write the root ninja file including every per-target file.
pub fn write_root(root: &Path, registry: &dyn Registry, ninja_files: &[String]) -> Result<PathBuf, BackendError> {
  let mut content = String::new();
  content.push_str(&format!("ninja_required_version = 1.7\nbuilddir = {}\n\n", registry.build_dir()));
  content.push_str(&rule_prelude());
  for file in ninja_files {
    content.push_str(&format!("subninja {file}\n"));
  }

  let path = root.join(ROOT_NINJA_FILE);
  write_file(&path, &content)?;
  info!(path = %path.display(), files = ninja_files.len(), "wrote root build file");
  Ok(path)
}

/// Remove the clean list of every target; returns the number of paths removed.
pub fn clean(root: &Path, targets: &[&Target], registry: &dyn Registry) -> Result<usize, BackendError> {
  let mut removed = 0;
  for target in targets {
    for rel_path in target.get_clean_list(registry)? {
      let path = root.join(&rel_path);
      let result = if path.is_dir() {
        fs::remove_dir_all(&path)
      } else if path.exists() {
        fs::remove_file(&path)
      } else {
        continue;
      };
      match result {
        Ok(()) => removed += 1,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
          warn!(path = %rel_path, "already removed");
        }
        Err(source) => return Err(BackendError::Remove { path: rel_path, source }),
      }
    }
  }
  info!(removed, "cleaned generated files");
  Ok(removed)
}

fn write_file(path: &Path, content: &str) -> Result<(), BackendError> {
  let to_error = |source| BackendError::Write {
    path: path.display().to_string(),
    source,
  };
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(to_error)?;
  }
  fs::write(path, content).map_err(to_error)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use tempfile::TempDir;

  use super::*;
  use crate::target::TargetDecl;
  use crate::util::testutil::{declare, test_db};

  fn setup() -> (TempDir, crate::registry::TargetDatabase, Arc<Target>) {
    let temp = TempDir::new().unwrap();
    let db = test_db();
    let target = declare(&db, "a/b", TargetDecl::new("t").srcs(["t.in"]));
    (temp, db, target)
  }

  #[test]
  fn ninja_file_location() {
    let (_temp, db, target) = setup();
    assert_eq!(ninja_file(&target, &db), "build64_release/a/b/t.ninja");
    let top = declare(&db, ".", TargetDecl::new("top"));
    assert_eq!(ninja_file(&top, &db), "build64_release/top.ninja");
  }

  #[test]
  fn write_target_records_hash_and_skips_unchanged() {
    let (temp, db, target) = setup();
    let hash = target.rule_hash(&db).unwrap();

    assert_eq!(write_target(temp.path(), &target, &hash, &db).unwrap(), WriteOutcome::Written);
    let path = temp.path().join("build64_release/a/b/t.ninja");
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with(&format!("# rule_hash: {hash}\n")));
    assert!(content.contains("build build64_release/a/b/t.out: test_rule a/b/t.in\n"));
    assert_eq!(recorded_hash(&path), Some(hash.clone()));

    assert_eq!(write_target(temp.path(), &target, &hash, &db).unwrap(), WriteOutcome::Unchanged);

    let changed = ContentHash("0".repeat(64));
    assert_eq!(write_target(temp.path(), &target, &changed, &db).unwrap(), WriteOutcome::Written);
    assert_eq!(recorded_hash(&path), Some(changed));
  }

  #[test]
  fn root_file_includes_targets() {
    let (temp, db, target) = setup();
    let path = write_root(temp.path(), &db, &[ninja_file(&target, &db)]).unwrap();
    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("builddir = build64_release\n"));
    assert!(content.contains("rule gen_rule\n"));
    assert!(content.ends_with("subninja build64_release/a/b/t.ninja\n"));
  }

  #[test]
  fn clean_removes_outputs() {
    let (temp, db, target) = setup();
    let out = temp.path().join("build64_release/a/b/t.out");
    fs::create_dir_all(out.parent().unwrap()).unwrap();
    fs::write(&out, "generated").unwrap();

    assert_eq!(clean(temp.path(), &[target.as_ref()], &db).unwrap(), 1);
    assert!(!out.exists());
    assert_eq!(clean(temp.path(), &[target.as_ref()], &db).unwrap(), 0);
  }

  #[test]
  fn missing_ninja_file_has_no_hash() {
    let temp = TempDir::new().unwrap();
    assert_eq!(recorded_hash(&temp.path().join("none.ninja")), None);
  }
}
