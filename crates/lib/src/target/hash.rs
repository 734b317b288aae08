//! Rule hash computation.
//!
//! The rule hash digests everything that affects a target's generated rules.
//! Only direct dependency hashes are pulled in; each of them already covers its
//! own dependencies, so a change anywhere below a target changes its hash.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use super::{Target, TargetError};
use crate::key::TargetKey;
use crate::registry::Registry;
use crate::util::hash::{ContentHash, canonical_json, hash_bytes};

impl Target {
  /// Digest of the target's declared inputs and its dependencies' hashes.
  ///
  /// Memoized for the lifetime of the target. Dependencies must already be
  /// registered.
  ///
  /// # Errors
  ///
  /// - [`TargetError::UnknownDependency`] if a dependency is not registered
  /// - [`TargetError::Cycle`] if the dependencies loop back to a target being hashed
  /// - [`TargetError::UnstableEntropy`] if the entropy cannot be serialized
  pub fn rule_hash(&self, registry: &dyn Registry) -> Result<ContentHash, TargetError> {
    self.rule_hash_inner(registry, &mut Vec::new())
  }

  fn rule_hash_inner(&self, registry: &dyn Registry, stack: &mut Vec<TargetKey>) -> Result<ContentHash, TargetError> {
    if let Some(hash) = self.rule_hash.get() {
      return Ok(hash.clone());
    }
    if stack.contains(&self.key) {
      return Err(TargetError::Cycle(self.fullname.clone()));
    }

    stack.push(self.key.clone());
    let entropy = self.hash_entropy(registry, stack);
    stack.pop();

    let serialized = canonical_json(&entropy?).map_err(|e| TargetError::UnstableEntropy(e.to_string()))?;
    let hash = hash_bytes(serialized.as_bytes());
    trace!(key = %self.key, hash = %hash, "computed rule hash");

    // Another thread may have won the race; both computed the same value.
    Ok(self.rule_hash.get_or_init(|| hash).clone())
  }

  fn hash_entropy(
    &self,
    registry: &dyn Registry,
    stack: &mut Vec<TargetKey>,
  ) -> Result<BTreeMap<String, Value>, TargetError> {
    let config_digest = registry
      .config()
      .digest()
      .map_err(|e| TargetError::UnstableEntropy(e.to_string()))?;

    let mut dep_hashes = Vec::with_capacity(self.deps.len());
    for key in &self.deps {
      let dep = registry.lookup(key).ok_or_else(|| TargetError::UnknownDependency {
        target: self.fullname.clone(),
        dep: key.to_string(),
      })?;
      let hash = dep.rule_hash_inner(registry, stack)?;
      dep_hashes.push(Value::String(hash.0));
    }

    let mut entropy = BTreeMap::new();
    entropy.insert("revision".to_string(), Value::from(registry.revision()));
    entropy.insert("config".to_string(), Value::String(config_digest.0));
    entropy.insert("type".to_string(), Value::from(self.type_name()));
    entropy.insert("name".to_string(), Value::from(self.name.as_str()));
    entropy.insert(
      "srcs".to_string(),
      Value::Array(self.srcs.iter().map(|s| Value::from(s.as_str())).collect()),
    );
    entropy.insert("deps".to_string(), Value::Array(dep_hashes));
    entropy.extend(self.kind.hash_entropy(self));
    Ok(entropy)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::config::Config;
  use crate::registry::TargetDatabase;
  use crate::target::TargetDecl;
  use crate::util::testutil::{TestKind, build, declare, test_db};

  /// Build `app` depending on `mid` depending on `leaf` and return app's hash.
  fn chain_hash(leaf_srcs: &[&str]) -> ContentHash {
    let db = test_db();
    declare(&db, "leaf", TargetDecl::new("leaf").srcs(leaf_srcs.iter().copied()));
    declare(&db, "mid", TargetDecl::new("mid").deps(["//leaf:leaf"]));
    let app = declare(&db, "app", TargetDecl::new("app").deps(["//mid:mid"]));
    app.rule_hash(&db).unwrap()
  }

  #[test]
  fn hash_is_deterministic_across_registries() {
    let first = chain_hash(&["a.cc"]);
    let second = chain_hash(&["a.cc"]);
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 64);
  }

  #[test]
  fn hash_changes_with_sources() {
    let db = test_db();
    let a = build(&db, "x", TargetDecl::new("a").srcs(["one.cc"]));
    let other = test_db();
    let b = build(&other, "x", TargetDecl::new("a").srcs(["two.cc"]));
    assert_ne!(a.rule_hash(&db).unwrap(), b.rule_hash(&other).unwrap());
  }

  #[test]
  fn hash_propagates_from_leaf_dependency() {
    assert_ne!(chain_hash(&["a.cc"]), chain_hash(&["a.cc", "b.cc"]));
  }

  #[test]
  fn hash_ignores_data() {
    let db = test_db();
    let target = build(&db, "x", TargetDecl::new("a"));
    let other_db = test_db();
    let other = build(&other_db, "x", TargetDecl::new("a"));
    other.set_data("cflags", json!(["-O2"]));
    assert_eq!(target.rule_hash(&db).unwrap(), other.rule_hash(&other_db).unwrap());
  }

  #[test]
  fn hash_covers_attrs_revision_and_config() {
    let db = test_db();
    let base = build(&db, "x", TargetDecl::new("a")).rule_hash(&db).unwrap();

    let mut with_attr = build(&test_db(), "x", TargetDecl::new("a"));
    with_attr.set_attr("warning", "no");
    assert_ne!(with_attr.rule_hash(&test_db()).unwrap(), base);

    let revised = test_db().with_revision("other");
    let target = build(&revised, "x", TargetDecl::new("a"));
    assert_ne!(target.rule_hash(&revised).unwrap(), base);

    let configured = TargetDatabase::new(Config::from_toml("[cc_config]\ncppflags = [\"-DNDEBUG\"]\n").unwrap());
    let target = build(&configured, "x", TargetDecl::new("a"));
    assert_ne!(target.rule_hash(&configured).unwrap(), base);
  }

  #[test]
  fn hash_omits_kind_filtered_attrs() {
    let hash_with_note = |kind: TestKind, note: &str| {
      let db = test_db();
      let mut target = Target::new(TargetDecl::new("a"), Box::new(kind), &db).unwrap();
      target.set_attr("note", note);
      target.rule_hash(&db).unwrap()
    };

    assert_eq!(
      hash_with_note(TestKind::ignoring("note"), "first"),
      hash_with_note(TestKind::ignoring("note"), "second")
    );
    assert_ne!(
      hash_with_note(TestKind::default(), "first"),
      hash_with_note(TestKind::default(), "second")
    );
  }

  #[test]
  fn hash_is_memoized() {
    let db = test_db();
    declare(&db, "leaf", TargetDecl::new("leaf").srcs(["a.cc"]));
    let app = declare(&db, "app", TargetDecl::new("app").deps(["//leaf:leaf"]));
    let first = app.rule_hash(&db).unwrap();
    assert_eq!(app.rule_hash(&db).unwrap(), first);
  }

  #[test]
  fn unknown_dependency_is_reported() {
    let db = test_db();
    let app = declare(&db, "app", TargetDecl::new("app").deps(["//missing:dep"]));
    let err = app.rule_hash(&db).unwrap_err();
    assert_eq!(
      err,
      TargetError::UnknownDependency {
        target: "//app:app".to_string(),
        dep: "missing:dep".to_string(),
      }
    );
  }

  #[test]
  fn cycle_is_reported() {
    let db = test_db();
    declare(&db, "a", TargetDecl::new("a").deps(["//b:b"]));
    let b = declare(&db, "b", TargetDecl::new("b").deps(["//a:a"]));
    assert!(matches!(b.rule_hash(&db), Err(TargetError::Cycle(_))));
  }

  #[test]
  fn system_library_dependency_hashes() {
    let db = test_db();
    let app = declare(&db, "app", TargetDecl::new("app").deps(["#pthread"]));
    let hash = app.rule_hash(&db).unwrap();
    let library = db.lookup(&TargetKey("#:pthread".to_string())).unwrap();
    assert!(library.rule_hash(&db).is_ok());
    assert_eq!(hash.as_str().len(), 64);
  }
}
