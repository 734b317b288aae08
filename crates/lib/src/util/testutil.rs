//! Test utilities for buildgen-lib.
//!
//! Provides a registry with the default configuration and a minimal target
//! kind whose rules are easy to predict.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::config::Config;
use crate::registry::{Registry, TargetDatabase};
use crate::target::{BuildStatement, RuleCtx, Target, TargetDecl, TargetError, TargetKind};

/// Registry with the default configuration (build dir `build64_release`).
pub fn test_db() -> TargetDatabase {
  TargetDatabase::new(Config::default())
}

/// Construct a [`TestKind`] target declared in `dir`, without registering it.
pub fn build(db: &TargetDatabase, dir: &str, decl: TargetDecl) -> Target {
  db.set_current_source_dir(dir);
  Target::new(decl, Box::new(TestKind::default()), db).unwrap()
}

/// Construct and register a [`TestKind`] target declared in `dir`.
pub fn declare(db: &TargetDatabase, dir: &str, decl: TargetDecl) -> Arc<Target> {
  register(db, dir, decl, TestKind::default())
}

/// Construct and register a target of `kind` declared in `dir`.
pub fn register(db: &TargetDatabase, dir: &str, decl: TargetDecl, kind: impl TargetKind + 'static) -> Arc<Target> {
  db.set_current_source_dir(dir);
  let target = Arc::new(Target::new(decl, Box::new(kind), db).unwrap());
  assert!(db.register(Arc::clone(&target)), "duplicate test target {}", target.key());
  target
}

/// Kind emitting one `test_rule` statement from all sources to `<name>.out`.
///
/// Dependency artifacts become implicit inputs, so generating a target also
/// generates its dependencies.
#[derive(Debug, Default)]
pub struct TestKind {
  allows_duplicate: bool,
  ignored_attr: Option<String>,
  generated: Arc<AtomicUsize>,
}

impl TestKind {
  pub fn allowing_duplicates() -> Self {
    Self {
      allows_duplicate: true,
      ..Self::default()
    }
  }

  /// A kind whose rule hash does not depend on attribute `name`.
  pub fn ignoring(name: &str) -> Self {
    Self {
      ignored_attr: Some(name.to_string()),
      ..Self::default()
    }
  }

  /// A kind counting how often its rules are generated.
  pub fn counting() -> (Self, Arc<AtomicUsize>) {
    let kind = Self::default();
    let generated = Arc::clone(&kind.generated);
    (kind, generated)
  }
}

impl TargetKind for TestKind {
  fn type_name(&self) -> &'static str {
    "test_kind"
  }

  fn allows_duplicate_source(&self) -> bool {
    self.allows_duplicate
  }

  fn hash_entropy(&self, target: &Target) -> BTreeMap<String, Value> {
    let mut entropy = target.attr().clone();
    if let Some(name) = &self.ignored_attr {
      entropy.remove(name);
    }
    entropy
  }

  fn generate(&self, target: &Target, ctx: &mut RuleCtx<'_>) -> Result<(), TargetError> {
    self.generated.fetch_add(1, Ordering::SeqCst);
    let deps = ctx.dep_target_files()?;
    if target.srcs().is_empty() {
      return Ok(());
    }

    let inputs: Vec<String> = target.srcs().iter().map(|src| ctx.source_file_path(src)).collect();
    let output = ctx.target_file_path(&format!("{}.out", target.name()));
    ctx.ninja_build(
      BuildStatement::new("test_rule", &output)
        .inputs(inputs)
        .implicit_deps(deps),
    );
    ctx.add_target_file("out", output);
    Ok(())
  }
}
