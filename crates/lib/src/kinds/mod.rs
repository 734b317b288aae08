//! Concrete target kinds declarable in build files.
//!
//! # Submodules
//!
//! - [`gen_rule`] - run a shell command producing declared outputs

pub mod gen_rule;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::target::{TargetError, TargetKind};

pub use gen_rule::GenRule;

/// Type names accepted in the `type` field of a build file entry.
pub const KNOWN_TYPES: &[&str] = &[gen_rule::TYPE_NAME];

/// Build the kind named `type_name`, consuming the options it understands.
///
/// Options left in `options` afterwards are reported by target construction.
pub fn create(type_name: &str, options: &mut BTreeMap<String, Value>) -> Result<Box<dyn TargetKind>, TargetError> {
  match type_name {
    gen_rule::TYPE_NAME => Ok(Box::new(GenRule::from_options(options)?)),
    _ => Err(TargetError::UnknownType(type_name.to_string())),
  }
}

/// Rule definitions shared by every generated per-target file.
pub fn rule_prelude() -> String {
  let mut prelude = String::new();
  prelude.push_str(gen_rule::RULE);
  prelude
}

/// Remove option `name`, which must be a string.
pub(crate) fn take_string(options: &mut BTreeMap<String, Value>, name: &str) -> Result<Option<String>, TargetError> {
  match options.remove(name) {
    None => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(_) => Err(TargetError::InvalidOption {
      option: name.to_string(),
      message: "expected a string".to_string(),
    }),
  }
}

/// Remove option `name`, which must be a string or a list of strings.
pub(crate) fn take_strings(options: &mut BTreeMap<String, Value>, name: &str) -> Result<Vec<String>, TargetError> {
  let invalid = || TargetError::InvalidOption {
    option: name.to_string(),
    message: "expected a string or a list of strings".to_string(),
  };
  match options.remove(name) {
    None => Ok(Vec::new()),
    Some(Value::String(s)) => Ok(vec![s]),
    Some(Value::Array(items)) => items
      .into_iter()
      .map(|item| match item {
        Value::String(s) => Ok(s),
        _ => Err(invalid()),
      })
      .collect(),
    Some(_) => Err(invalid()),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn create_consumes_known_options() {
    let mut options = BTreeMap::from([
      ("outs".to_string(), json!(["a.h"])),
      ("cmd".to_string(), json!("touch $OUTS")),
      ("extra".to_string(), json!(true)),
    ]);
    let kind = create("gen_rule", &mut options).unwrap();
    assert_eq!(kind.type_name(), "gen_rule");
    assert_eq!(options.keys().collect::<Vec<_>>(), vec!["extra"]);
  }

  #[test]
  fn create_rejects_unknown_type() {
    let err = create("cc_library", &mut BTreeMap::new()).unwrap_err();
    assert_eq!(err, TargetError::UnknownType("cc_library".to_string()));
  }

  #[test]
  fn take_strings_accepts_scalar_or_list() {
    let mut options = BTreeMap::from([
      ("one".to_string(), json!("a")),
      ("many".to_string(), json!(["a", "b"])),
      ("bad".to_string(), json!([1])),
    ]);
    assert_eq!(take_strings(&mut options, "one").unwrap(), vec!["a"]);
    assert_eq!(take_strings(&mut options, "many").unwrap(), vec!["a", "b"]);
    assert!(take_strings(&mut options, "bad").is_err());
    assert!(take_strings(&mut options, "absent").unwrap().is_empty());
  }

  #[test]
  fn prelude_defines_rules() {
    assert!(rule_prelude().contains("rule gen_rule\n"));
  }
}
