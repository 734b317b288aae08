//! Targets: named, buildable units declared in build files.
//!
//! A [`Target`] is constructed from a [`TargetDecl`] plus a [`TargetKind`].
//! Construction resolves the target's identity and dependency keys eagerly and
//! claims ownership of its source files. Later, on demand:
//!
//! - [`Target::rule_hash`] computes a digest over everything that affects the
//!   generated rules, pulling the memoized hashes of direct dependencies
//! - [`Target::get_rules`] runs the kind's rule generation exactly once
//!
//! A target is mutable only until it is shared: kinds add location references
//! and implicit libraries from [`TargetKind::configure`], then the target is
//! wrapped in an `Arc` and registered.
//!
//! # Submodules
//!
//! - `hash` - rule hash computation
//! - `rules` - build statement emission and artifact tracking

mod error;
mod hash;
mod kind;
mod rules;
mod types;

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, OnceLock};

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::config::DuplicateSourceAction;
use crate::consts::{BUILD_FILE_NAME, PUBLIC_VISIBILITY, SYSTEM_LIBRARY_DIR};
use crate::key::{self, TargetKey};
use crate::location;
use crate::registry::{Registry, SourceClaim, SourceOwner};
use crate::util::hash::ContentHash;
use crate::util::lock;
use crate::util::path::{join, normpath};

pub use error::{ErrorKind, TargetError};
pub use kind::{SystemLibrary, TargetKind};
pub use rules::{BuildStatement, GeneratedRules, IntoPaths, RuleCtx};
pub use types::{SourceLocation, TargetDecl, TargetFile, Visibility};

use rules::Generation;

/// The core target entity.
#[derive(Debug)]
pub struct Target {
  name: String,
  path: String,
  key: TargetKey,
  fullname: String,
  source_location: SourceLocation,
  srcs: Vec<String>,
  deps: Vec<TargetKey>,
  expanded_deps: Vec<TargetKey>,
  visibility: Visibility,
  attr: BTreeMap<String, Value>,
  /// Transient working state, never part of the rule hash.
  data: Mutex<BTreeMap<String, Value>>,
  kind: Box<dyn TargetKind>,

  rule_hash: OnceLock<ContentHash>,
  generation: Mutex<Generation>,
  generation_done: Condvar,
}

impl Target {
  /// Construct a target declared in the registry's current source directory.
  ///
  /// # Errors
  ///
  /// Any malformed name, source path, dependency or visibility entry, and
  /// source ownership conflicts under the `error` policy. The error is also
  /// logged with the declaration's source location.
  pub fn new(decl: TargetDecl, kind: Box<dyn TargetKind>, registry: &dyn Registry) -> Result<Self, TargetError> {
    let path = registry.current_source_dir();
    Self::declare(&path, decl, kind, registry)
  }

  /// Construct the pseudo-target behind a `#name` dependency.
  pub fn system_library(name: &str, registry: &dyn Registry) -> Result<Self, TargetError> {
    let decl = TargetDecl::new(name).visibility([PUBLIC_VISIBILITY]);
    Self::declare(SYSTEM_LIBRARY_DIR, decl, Box::new(SystemLibrary), registry)
  }

  fn declare(
    path: &str,
    decl: TargetDecl,
    kind: Box<dyn TargetKind>,
    registry: &dyn Registry,
  ) -> Result<Self, TargetError> {
    let key = TargetKey::new(path, &decl.name);
    let mut attr = kind.attrs();
    if let Some(timeout) = registry.config().get_item("global_config", "test_timeout") {
      attr.insert("test_timeout".to_string(), timeout);
    }

    let mut target = Self {
      name: decl.name.clone(),
      path: path.to_string(),
      fullname: key.fullname(),
      key,
      source_location: SourceLocation {
        file: join(path, BUILD_FILE_NAME),
        line: decl.line,
      },
      srcs: decl.srcs.clone(),
      deps: Vec::new(),
      expanded_deps: Vec::new(),
      visibility: Visibility::Public,
      attr,
      data: Mutex::new(BTreeMap::new()),
      kind,
      rule_hash: OnceLock::new(),
      generation: Mutex::new(Generation::Pending),
      generation_done: Condvar::new(),
    };

    if let Err(e) = target.init(&decl, registry) {
      target.error(&e.to_string());
      return Err(e);
    }
    Ok(target)
  }

  fn init(&mut self, decl: &TargetDecl, registry: &dyn Registry) -> Result<(), TargetError> {
    self.check_name()?;
    self.check_options(decl)?;
    self.check_srcs(registry)?;
    self.init_deps(&decl.deps, registry)?;
    self.init_visibility(decl.visibility.as_deref(), registry)?;

    // Temporarily take the kind out so it can mutate the target it belongs to.
    let kind = std::mem::replace(&mut self.kind, Box::new(SystemLibrary));
    let result = kind.configure(self, registry);
    self.kind = kind;
    result
  }

  // ==========================================================================
  // Accessors
  // ==========================================================================

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Directory of the build file declaring this target.
  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn key(&self) -> &TargetKey {
    &self.key
  }

  /// Display name, e.g. `//common/base:string`.
  pub fn fullname(&self) -> &str {
    &self.fullname
  }

  pub fn type_name(&self) -> &'static str {
    self.kind.type_name()
  }

  pub fn kind(&self) -> &dyn TargetKind {
    self.kind.as_ref()
  }

  pub fn source_location(&self) -> &SourceLocation {
    &self.source_location
  }

  /// Source files relative to [`Target::path`].
  pub fn srcs(&self) -> &[String] {
    &self.srcs
  }

  /// Direct dependencies, in declaration order.
  pub fn deps(&self) -> &[TargetKey] {
    &self.deps
  }

  /// Direct dependencies plus location references and implicit libraries.
  pub fn expanded_deps(&self) -> &[TargetKey] {
    &self.expanded_deps
  }

  pub fn visibility(&self) -> &Visibility {
    &self.visibility
  }

  pub fn attr(&self) -> &BTreeMap<String, Value> {
    &self.attr
  }

  /// Set a declared property. Only possible before the target is shared.
  pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.attr.insert(name.into(), value.into());
  }

  pub fn data(&self, name: &str) -> Option<Value> {
    lock(&self.data).get(name).cloned()
  }

  /// Store transient working state; does not affect the rule hash.
  pub fn set_data(&self, name: impl Into<String>, value: impl Into<Value>) {
    lock(&self.data).insert(name.into(), value.into());
  }

  /// Serializable summary of the declaration.
  pub fn dump(&self) -> Value {
    let mut dump = json!({
      "type": self.type_name(),
      "path": self.path,
      "name": self.name,
      "srcs": self.srcs,
      "deps": self.deps,
      "visibility": self.visibility.to_json(),
    });
    if let Value::Object(map) = &mut dump {
      for (name, value) in &self.attr {
        map.insert(name.clone(), value.clone());
      }
    }
    dump
  }

  // ==========================================================================
  // Diagnostics
  // ==========================================================================

  fn format_message(&self, level: &str, msg: &str) -> String {
    format!("{} {}: {}: {}", self.source_location, level, self.name, msg)
  }

  pub fn debug(&self, msg: &str) {
    debug!(target_key = %self.key, "{}", self.format_message("debug", msg));
  }

  pub fn info(&self, msg: &str) {
    info!(target_key = %self.key, "{}", self.format_message("info", msg));
  }

  pub fn warning(&self, msg: &str) {
    warn!(target_key = %self.key, "{}", self.format_message("warning", msg));
  }

  pub fn error(&self, msg: &str) {
    error!(target_key = %self.key, "{}", self.format_message("error", msg));
  }

  // ==========================================================================
  // Declaration checks
  // ==========================================================================

  fn check_name(&self) -> Result<(), TargetError> {
    if self.name.is_empty() {
      return Err(TargetError::MissingName);
    }
    if self.name.contains('/') {
      return Err(TargetError::InvalidName(self.name.clone()));
    }
    Ok(())
  }

  fn check_options(&self, decl: &TargetDecl) -> Result<(), TargetError> {
    if decl.options.is_empty() {
      return Ok(());
    }
    Err(TargetError::UnrecognizedOptions(decl.options.keys().cloned().collect()))
  }

  fn check_srcs(&self, registry: &dyn Registry) -> Result<(), TargetError> {
    let mut seen = std::collections::HashSet::new();
    let mut dups = Vec::new();
    for src in &self.srcs {
      if !seen.insert(src.as_str()) {
        dups.push(src.clone());
      }
    }
    if !dups.is_empty() {
      return Err(TargetError::DuplicateSources(dups));
    }

    let action = registry.config().duplicated_source_action();
    let allows_duplicate = self.kind.allows_duplicate_source();

    for src in &self.srcs {
      if src.contains("..") || src.starts_with('/') {
        return Err(TargetError::InvalidSource(src.clone()));
      }

      let full_src = normpath(&join(&self.path, src));
      let owner = SourceOwner::new(self.fullname.clone(), allows_duplicate);
      match registry.claim_source(&full_src, owner) {
        SourceClaim::Claimed | SourceClaim::Shared { .. } => {}
        SourceClaim::Displaced { previous } => {
          self.debug(&format!("takes ownership of \"{full_src}\" from \"{previous}\""));
        }
        SourceClaim::Conflict { owner } => {
          let conflict = TargetError::OwnershipConflict { src: full_src, owner };
          match action {
            DuplicateSourceAction::Error => return Err(conflict),
            DuplicateSourceAction::Warning => self.warning(&conflict.to_string()),
            DuplicateSourceAction::Ignore => {}
          }
        }
      }
    }
    Ok(())
  }

  // ==========================================================================
  // Dependencies
  // ==========================================================================

  /// Unify a dependency reference relative to this target's directory.
  ///
  /// A `#name` reference registers the system library on first use.
  pub fn unify_dep(&self, dep: &str, registry: &dyn Registry) -> Result<TargetKey, TargetError> {
    let key = key::unify_dep(&self.path, dep)?;
    if key.is_system_library() {
      add_system_library(&key, registry)?;
    }
    Ok(key)
  }

  fn init_deps(&mut self, deps: &[String], registry: &dyn Registry) -> Result<(), TargetError> {
    for dep in deps {
      key::check_format(dep)?;
    }
    for dep in deps {
      let key = self.unify_dep(dep, registry)?;
      self.add_dep(key);
    }
    Ok(())
  }

  fn init_visibility(&mut self, visibility: Option<&[String]>, registry: &dyn Registry) -> Result<(), TargetError> {
    let Some(entries) = visibility else {
      return Ok(());
    };
    if entries.len() == 1 && entries[0] == PUBLIC_VISIBILITY {
      return Ok(());
    }

    let mut keys = Vec::new();
    for entry in entries {
      key::check_format(entry)?;
      let key = self.unify_dep(entry, registry)?;
      if !keys.contains(&key) {
        keys.push(key);
      }
    }
    self.visibility = Visibility::Only(keys);
    Ok(())
  }

  fn add_dep(&mut self, key: TargetKey) {
    if !self.expanded_deps.contains(&key) {
      self.expanded_deps.push(key.clone());
    }
    if !self.deps.contains(&key) {
      self.deps.push(key);
    }
  }

  /// Register the location references in `text` as dependencies.
  ///
  /// Returns the `(key, output_type)` of every reference; keys already in
  /// `deps` keep their position.
  pub fn add_location_references(
    &mut self,
    text: &str,
    registry: &dyn Registry,
  ) -> Result<Vec<(TargetKey, String)>, TargetError> {
    let mut found = Vec::new();
    for reference in location::references(text) {
      let key = self.unify_dep(&reference.key, registry)?;
      self.add_dep(key.clone());
      found.push((key, reference.output_type));
    }
    Ok(found)
  }

  /// Add implicit library dependencies required by the target kind.
  ///
  /// They land in `expanded_deps` only; bare paths are taken as root relative.
  pub fn add_hardcode_library<S: AsRef<str>>(&mut self, deps: &[S], registry: &dyn Registry) -> Result<(), TargetError> {
    for dep in deps {
      let dep = dep.as_ref();
      let dep = if dep.starts_with("//") || dep.starts_with('#') {
        dep.to_string()
      } else {
        format!("//{dep}")
      };
      let key = self.unify_dep(&dep, registry)?;
      if !self.expanded_deps.contains(&key) {
        self.expanded_deps.push(key);
      }
    }
    Ok(())
  }
}

/// Register the system library behind `key` unless it already exists.
fn add_system_library(key: &TargetKey, registry: &dyn Registry) -> Result<(), TargetError> {
  if registry.contains(key) {
    return Ok(());
  }
  let library = Target::system_library(key.name(), registry)?;
  if registry.register(Arc::new(library)) {
    debug!(key = %key, "added system library");
  }
  Ok(())
}
