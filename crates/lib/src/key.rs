//! Target keys, command line patterns and dependency references.
//!
//! Every target is identified by a canonical key `dir:name`:
//!
//! - `dir` is relative to the source root, `.` for the root itself and `#` for
//!   system libraries
//! - `name` is a literal target name, `*` (every target directly in `dir`) or
//!   `...` (every target in `dir` and its subdirectories)
//!
//! Keys are the only identifiers used for dependency edges, so equality is
//! plain string equality after normalization.
//!
//! # Example
//!
//! ```
//! use buildgen_lib::key::{TargetKey, matches, normalize, unify_dep};
//!
//! let patterns = normalize(&["common/...", "//net:http"], ".").unwrap();
//! assert_eq!(patterns[0].as_str(), "common:...");
//!
//! let key = TargetKey::new("common/base", "string");
//! assert!(matches(&key, &patterns[0]));
//!
//! assert_eq!(unify_dep("net", ":socket").unwrap().as_str(), "net:socket");
//! ```

use serde::{Deserialize, Serialize};

use crate::consts::{ROOT_DIR, SYSTEM_LIBRARY_DIR};
use crate::target::TargetError;
use crate::util::path::{join, normpath};

/// A canonical `dir:name` target key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetKey(pub String);

impl TargetKey {
  pub fn new(path: &str, name: &str) -> Self {
    Self(format!("{path}:{name}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Split into `(dir, name)` at the last `:`.
  pub fn split(&self) -> (&str, &str) {
    self.0.rsplit_once(':').unwrap_or((self.0.as_str(), ""))
  }

  pub fn path(&self) -> &str {
    self.split().0
  }

  pub fn name(&self) -> &str {
    self.split().1
  }

  /// Display form used in diagnostics, e.g. `//common/base:string`.
  pub fn fullname(&self) -> String {
    format!("//{}", self.0)
  }

  pub fn is_system_library(&self) -> bool {
    self.path() == SYSTEM_LIBRARY_DIR
  }
}

impl std::fmt::Display for TargetKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Normalize one command line target into a canonical key.
///
/// - `//dir:name` is relative to the source root
/// - `/dir:name` is rejected
/// - anything else is relative to `working_dir`
/// - `dir` without a name means every target in `dir` (`dir:*`)
/// - `dir/...` means every target in `dir` and below (`dir:...`)
pub fn normalize_one(target: &str, working_dir: &str) -> Result<TargetKey, TargetError> {
  let target = if let Some(rest) = target.strip_prefix("//") {
    rest.to_string()
  } else if target.starts_with('/') {
    return Err(TargetError::RootPath(target.to_string()));
  } else if working_dir != ROOT_DIR {
    join(working_dir, target)
  } else {
    target.to_string()
  };

  let (path, name) = if let Some((path, name)) = target.rsplit_once(':') {
    (path, name)
  } else if let Some(path) = target.strip_suffix("...") {
    (path, "...")
  } else {
    (target.as_str(), "*")
  };

  Ok(TargetKey::new(&normpath(path), name))
}

/// Normalize a list of command line targets into canonical keys.
pub fn normalize<S: AsRef<str>>(targets: &[S], working_dir: &str) -> Result<Vec<TargetKey>, TargetError> {
  targets
    .iter()
    .map(|target| normalize_one(target.as_ref(), working_dir))
    .collect()
}

/// Check whether a target key matches a normalized pattern.
///
/// `dir:...` matches `dir` and every directory below it, but never a sibling
/// sharing a textual prefix (`foo2` is not under `foo`). `dir:*` matches only
/// targets directly in `dir`. Any other pattern must equal the key.
pub fn matches(key: &TargetKey, pattern: &TargetKey) -> bool {
  let (key_path, _) = key.split();
  let (pattern_path, pattern_name) = pattern.split();

  match pattern_name {
    "..." => {
      key_path == pattern_path
        || (pattern_path == ROOT_DIR && key_path != SYSTEM_LIBRARY_DIR)
        || key_path
          .strip_prefix(pattern_path)
          .is_some_and(|rest| rest.starts_with('/'))
    }
    "*" => key_path == pattern_path,
    _ => key == pattern,
  }
}

/// Basic format check of a dependency or visibility entry from a build file.
pub fn check_format(entry: &str) -> Result<(), TargetError> {
  let known_form = [":", "#", "//", "./"].iter().any(|prefix| entry.starts_with(prefix));
  if !known_form {
    return Err(TargetError::InvalidFormat(entry.to_string()));
  }
  if entry.matches(':').count() > 1 {
    return Err(TargetError::MultipleSeparators(entry.to_string()));
  }
  Ok(())
}

/// Translate a dependency reference into a canonical key.
///
/// | Form | Resolution |
/// |---|---|
/// | `:name` | `base_dir:name` |
/// | `//path:name` | `path:name` |
/// | `#name` | `#:name` (system library) |
/// | `rel/path:name` | `base_dir/rel/path:name`, `..` is rejected |
///
/// This function is pure: registering the system library behind a `#name`
/// reference is left to the caller.
pub fn unify_dep(base_dir: &str, dep: &str) -> Result<TargetKey, TargetError> {
  if let Some(name) = dep.strip_prefix(':') {
    return Ok(TargetKey::new(&normpath(base_dir), name));
  }

  if let Some(rest) = dep.strip_prefix("//") {
    let (path, name) = rest
      .rsplit_once(':')
      .ok_or_else(|| TargetError::MissingSeparator(dep.to_string()))?;
    return Ok(TargetKey::new(&normpath(path), name));
  }

  if let Some(name) = dep.strip_prefix('#') {
    return Ok(TargetKey::new(SYSTEM_LIBRARY_DIR, name));
  }

  let (path, name) = dep
    .rsplit_once(':')
    .ok_or_else(|| TargetError::MissingSeparator(dep.to_string()))?;
  if path.contains("..") {
    return Err(TargetError::ParentReference(dep.to_string()));
  }
  Ok(TargetKey::new(&normpath(&join(base_dir, path)), name))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(s: &str) -> TargetKey {
    TargetKey(s.to_string())
  }

  // ==========================================================================
  // normalize
  // ==========================================================================

  #[test]
  fn normalize_forms() {
    let keys = normalize(&["foo:bar", "foo", "foo/...", "//a/b:c", "...", "./x/../y:z"], ".").unwrap();
    let keys: Vec<&str> = keys.iter().map(TargetKey::as_str).collect();
    assert_eq!(keys, vec!["foo:bar", "foo:*", "foo:...", "a/b:c", ".:...", "y:z"]);
  }

  #[test]
  fn normalize_relative_to_working_dir() {
    let keys = normalize(&["lib:x", "...", "//other:y"], "app/server").unwrap();
    let keys: Vec<&str> = keys.iter().map(TargetKey::as_str).collect();
    assert_eq!(keys, vec!["app/server/lib:x", "app/server:...", "other:y"]);
  }

  #[test]
  fn normalize_rejects_root_path() {
    let result = normalize_one("/usr/lib:x", ".");
    assert_eq!(result, Err(TargetError::RootPath("/usr/lib:x".to_string())));
  }

  #[test]
  fn normalize_is_idempotent() {
    for raw in ["foo:bar", "foo", "foo/...", "//a//b/./c:d", "...", "a/b/../c", "x/y:*"] {
      let once = normalize_one(raw, ".").unwrap();
      let twice = normalize_one(once.as_str(), ".").unwrap();
      assert_eq!(once, twice, "not idempotent for {raw:?}");
    }
  }

  // ==========================================================================
  // matches
  // ==========================================================================

  #[test]
  fn recursive_pattern_is_prefix_safe() {
    assert!(!matches(&key("foo2:bar"), &key("foo:...")));
    assert!(matches(&key("foo/baz:bar"), &key("foo:...")));
    assert!(matches(&key("foo:bar"), &key("foo:...")));
  }

  #[test]
  fn star_pattern_does_not_descend() {
    assert!(matches(&key("foo:bar"), &key("foo:*")));
    assert!(!matches(&key("foo/x:bar"), &key("foo:*")));
  }

  #[test]
  fn literal_pattern_requires_equality() {
    assert!(matches(&key("foo:bar"), &key("foo:bar")));
    assert!(!matches(&key("foo:baz"), &key("foo:bar")));
  }

  #[test]
  fn root_recursive_pattern_matches_everything_but_system_libraries() {
    let root = key(".:...");
    assert!(matches(&key(".:top"), &root));
    assert!(matches(&key("a/b:c"), &root));
    assert!(!matches(&key("#:pthread"), &root));
    assert!(matches(&key("#:pthread"), &key("#:*")));
  }

  // ==========================================================================
  // unify_dep / check_format
  // ==========================================================================

  #[test]
  fn unify_dep_forms() {
    assert_eq!(unify_dep("a/b", ":t").unwrap(), key("a/b:t"));
    assert_eq!(unify_dep("a/b", "//a/b:t").unwrap(), key("a/b:t"));
    assert_eq!(unify_dep("a/b", "//x/./y:t").unwrap(), key("x/y:t"));
    assert_eq!(unify_dep("a/b", "#pthread").unwrap(), key("#:pthread"));
    assert_eq!(unify_dep("a/b", "./sub:t").unwrap(), key("a/b/sub:t"));
    assert_eq!(unify_dep(".", "sub/dir:t").unwrap(), key("sub/dir:t"));
  }

  #[test]
  fn unify_dep_requires_separator() {
    assert_eq!(
      unify_dep("a", "//a/b"),
      Err(TargetError::MissingSeparator("//a/b".to_string()))
    );
    assert_eq!(unify_dep("a", "./sub"), Err(TargetError::MissingSeparator("./sub".to_string())));
  }

  #[test]
  fn unify_dep_rejects_parent_reference() {
    let err = unify_dep("a/b", "./../c:t").unwrap_err();
    assert_eq!(err, TargetError::ParentReference("./../c:t".to_string()));
  }

  #[test]
  fn check_format_accepts_known_forms() {
    for entry in [":a", "#m", "//x:y", "./sub:z"] {
      assert!(check_format(entry).is_ok(), "{entry} should be accepted");
    }
  }

  #[test]
  fn check_format_rejects_unknown_forms() {
    assert_eq!(check_format("x:y"), Err(TargetError::InvalidFormat("x:y".to_string())));
    assert_eq!(
      check_format("//a:b//c:d"),
      Err(TargetError::MultipleSeparators("//a:b//c:d".to_string()))
    );
  }

  #[test]
  fn key_accessors() {
    let k = key("common/base:string");
    assert_eq!(k.path(), "common/base");
    assert_eq!(k.name(), "string");
    assert_eq!(k.fullname(), "//common/base:string");
    assert!(!k.is_system_library());
    assert!(key("#:pthread").is_system_library());
  }
}
