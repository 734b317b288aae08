//! The target registry.
//!
//! Targets never see the whole graph: each target pulls its direct
//! dependencies out of a [`Registry`] by key. The registry also owns the
//! source ownership map, the configuration and the build directory, so
//! everything that is shared between targets during one evaluation pass is
//! injected through this single interface.
//!
//! # Submodules
//!
//! - [`sources`] - source file ownership tracking

pub mod sources;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::Config;
use crate::consts::{REVISION, ROOT_DIR};
use crate::key::TargetKey;
use crate::target::Target;
use crate::util::lock;
use crate::util::path::normpath;

pub use sources::{SourceClaim, SourceOwner, SourceOwnership};

/// Shared state consulted by targets during construction, hashing and rule
/// generation.
///
/// Implementations must be safe to share between threads: construction and
/// hashing of independent targets may run in parallel.
pub trait Registry: Send + Sync {
  /// Add a target. Returns `false` and keeps the existing entry if the key is
  /// already registered.
  fn register(&self, target: Arc<Target>) -> bool;

  /// Look up a registered target by key.
  fn lookup(&self, key: &TargetKey) -> Option<Arc<Target>>;

  fn contains(&self, key: &TargetKey) -> bool {
    self.lookup(key).is_some()
  }

  /// All registered keys, sorted.
  fn keys(&self) -> Vec<TargetKey>;

  /// Record the owner of a normalized source path.
  fn claim_source(&self, path: &str, owner: SourceOwner) -> SourceClaim;

  /// Output directory relative to the source root.
  fn build_dir(&self) -> &str;

  /// Directory of the build file currently being evaluated.
  fn current_source_dir(&self) -> String;

  /// Tool revision marker mixed into every rule hash.
  fn revision(&self) -> &str;

  fn config(&self) -> &Config;
}

/// In-memory [`Registry`] used for one evaluation pass.
#[derive(Debug)]
pub struct TargetDatabase {
  targets: Mutex<BTreeMap<TargetKey, Arc<Target>>>,
  sources: SourceOwnership,
  config: Config,
  build_dir: String,
  current_source_dir: Mutex<String>,
  revision: String,
}

impl TargetDatabase {
  /// Create an empty database; the build directory comes from the config.
  pub fn new(config: Config) -> Self {
    let build_dir = normpath(&config.global_config.build_dir);
    Self {
      targets: Mutex::new(BTreeMap::new()),
      sources: SourceOwnership::new(),
      config,
      build_dir,
      current_source_dir: Mutex::new(ROOT_DIR.to_string()),
      revision: REVISION.to_string(),
    }
  }

  pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
    self.revision = revision.into();
    self
  }

  /// Set the directory whose build file is being evaluated.
  pub fn set_current_source_dir(&self, dir: &str) {
    *lock(&self.current_source_dir) = normpath(dir);
  }

  pub fn len(&self) -> usize {
    lock(&self.targets).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Registry for TargetDatabase {
  fn register(&self, target: Arc<Target>) -> bool {
    let mut targets = lock(&self.targets);
    if targets.contains_key(target.key()) {
      return false;
    }
    debug!(key = %target.key(), kind = target.type_name(), "registered target");
    targets.insert(target.key().clone(), target);
    true
  }

  fn lookup(&self, key: &TargetKey) -> Option<Arc<Target>> {
    lock(&self.targets).get(key).cloned()
  }

  fn keys(&self) -> Vec<TargetKey> {
    lock(&self.targets).keys().cloned().collect()
  }

  fn claim_source(&self, path: &str, owner: SourceOwner) -> SourceClaim {
    self.sources.claim(path, owner)
  }

  fn build_dir(&self) -> &str {
    &self.build_dir
  }

  fn current_source_dir(&self) -> String {
    lock(&self.current_source_dir).clone()
  }

  fn revision(&self) -> &str {
    &self.revision
  }

  fn config(&self) -> &Config {
    &self.config
  }
}
