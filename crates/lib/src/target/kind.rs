use std::collections::BTreeMap;

use serde_json::Value;

use super::{RuleCtx, Target, TargetError};
use crate::registry::Registry;

/// Behaviour specific to one kind of target (library, binary, generated file...).
///
/// The base [`Target`] handles identity, dependencies, visibility and hashing;
/// a kind decides which outputs its sources map to.
pub trait TargetKind: Send + Sync + std::fmt::Debug {
  /// Tag identifying the kind, e.g. `cc_library`.
  fn type_name(&self) -> &'static str;

  /// Declared kind-specific properties, stored in the target's `attr`.
  fn attrs(&self) -> BTreeMap<String, Value> {
    BTreeMap::new()
  }

  /// Whether the target may list source files owned by another target.
  fn allows_duplicate_source(&self) -> bool {
    false
  }

  /// Hook run at the end of construction, while the target is still mutable.
  ///
  /// Kinds register location references found in their text attributes and
  /// inject implicit library dependencies here.
  fn configure(&self, _target: &mut Target, _registry: &dyn Registry) -> Result<(), TargetError> {
    Ok(())
  }

  /// Extra entropy mixed into the rule hash.
  ///
  /// Defaults to the whole `attr` map. Override to drop purely informational
  /// properties or to add derived values that change the generated rules.
  fn hash_entropy(&self, target: &Target) -> BTreeMap<String, Value> {
    target.attr().clone()
  }

  /// Emit the build statements of `target`. Called at most once per target.
  fn generate(&self, target: &Target, ctx: &mut RuleCtx<'_>) -> Result<(), TargetError>;
}

/// An external library referenced as `#name`, with no build file entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLibrary;

impl TargetKind for SystemLibrary {
  fn type_name(&self) -> &'static str {
    "system_library"
  }

  fn generate(&self, _target: &Target, _ctx: &mut RuleCtx<'_>) -> Result<(), TargetError> {
    Ok(())
  }
}
