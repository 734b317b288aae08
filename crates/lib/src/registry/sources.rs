//! Source file ownership.
//!
//! Every source file belongs to at most one target. Targets that explicitly
//! allow sharing (for example header-only aggregations) may list a file that
//! another target already owns; a target that disallows sharing always keeps
//! or takes ownership over one that allows it.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::util::lock;

/// Owner recorded for a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOwner {
  /// Display name of the owning target, e.g. `//a:lib`.
  pub fullname: String,
  /// Whether the owner tolerates other targets listing the same file.
  pub allows_duplicate: bool,
}

impl SourceOwner {
  pub fn new(fullname: impl Into<String>, allows_duplicate: bool) -> Self {
    Self {
      fullname: fullname.into(),
      allows_duplicate,
    }
  }
}

/// Outcome of [`SourceOwnership::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceClaim {
  /// The claimant owns the file (first claim, or a repeated identical claim).
  Claimed,
  /// The previous owner allowed duplicates and was replaced by the claimant.
  Displaced { previous: String },
  /// The claimant allows duplicates, the existing owner is kept.
  Shared { owner: String },
  /// Neither side allows duplicates; the existing owner is kept.
  Conflict { owner: String },
}

/// Process-wide map from normalized source path to its owner.
#[derive(Debug, Default)]
pub struct SourceOwnership {
  owners: Mutex<HashMap<String, SourceOwner>>,
}

impl SourceOwnership {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `owner` for `path`, resolving competing claims.
  ///
  /// The first owner that disallows duplicates wins and is never displaced.
  /// Reporting a [`SourceClaim::Conflict`] is left to the caller's policy.
  pub fn claim(&self, path: &str, owner: SourceOwner) -> SourceClaim {
    let mut owners = lock(&self.owners);

    let Some(existing) = owners.get(path) else {
      owners.insert(path.to_string(), owner);
      return SourceClaim::Claimed;
    };

    if *existing == owner {
      return SourceClaim::Claimed;
    }

    if existing.allows_duplicate {
      let previous = existing.fullname.clone();
      owners.insert(path.to_string(), owner);
      SourceClaim::Displaced { previous }
    } else if owner.allows_duplicate {
      SourceClaim::Shared {
        owner: existing.fullname.clone(),
      }
    } else {
      SourceClaim::Conflict {
        owner: existing.fullname.clone(),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  impl SourceOwnership {
    fn owner(&self, path: &str) -> Option<SourceOwner> {
      lock(&self.owners).get(path).cloned()
    }
  }

  #[test]
  fn first_claim_records_owner() {
    let sources = SourceOwnership::new();
    assert_eq!(sources.claim("a/x.cc", SourceOwner::new("//a:x", false)), SourceClaim::Claimed);
    assert_eq!(sources.owner("a/x.cc"), Some(SourceOwner::new("//a:x", false)));
  }

  #[test]
  fn identical_claim_is_not_a_conflict() {
    let sources = SourceOwnership::new();
    sources.claim("a/x.cc", SourceOwner::new("//a:x", false));
    assert_eq!(sources.claim("a/x.cc", SourceOwner::new("//a:x", false)), SourceClaim::Claimed);
  }

  #[test]
  fn disallowing_owners_conflict_and_first_wins() {
    let sources = SourceOwnership::new();
    sources.claim("a/x.cc", SourceOwner::new("//a:first", false));

    let claim = sources.claim("a/x.cc", SourceOwner::new("//a:second", false));
    assert_eq!(
      claim,
      SourceClaim::Conflict {
        owner: "//a:first".to_string()
      }
    );
    assert_eq!(sources.owner("a/x.cc").unwrap().fullname, "//a:first");
  }

  #[test]
  fn allowing_claimant_never_displaces_disallowing_owner() {
    let sources = SourceOwnership::new();
    sources.claim("a/x.cc", SourceOwner::new("//a:strict", false));

    let claim = sources.claim("a/x.cc", SourceOwner::new("//a:lenient", true));
    assert_eq!(
      claim,
      SourceClaim::Shared {
        owner: "//a:strict".to_string()
      }
    );
    assert_eq!(sources.owner("a/x.cc").unwrap().fullname, "//a:strict");
  }

  #[test]
  fn allowing_owner_is_displaced() {
    let sources = SourceOwnership::new();
    sources.claim("a/x.cc", SourceOwner::new("//a:lenient", true));

    let claim = sources.claim("a/x.cc", SourceOwner::new("//a:strict", false));
    assert_eq!(
      claim,
      SourceClaim::Displaced {
        previous: "//a:lenient".to_string()
      }
    );
    assert_eq!(sources.owner("a/x.cc").unwrap().fullname, "//a:strict");

    // Once a disallowing owner holds the file it stays.
    let claim = sources.claim("a/x.cc", SourceOwner::new("//a:other", true));
    assert!(matches!(claim, SourceClaim::Shared { .. }));
  }
}
