//! `gen_rule`: produce declared outputs by running a shell command.
//!
//! The command may use location references and these variables:
//!
//! | Variable | Value |
//! |---|---|
//! | `$SRCS` | source paths, space separated |
//! | `$OUTS` | output paths, space separated |
//! | `$FIRST_SRC` / `$FIRST_OUT` | first source / output path |
//! | `$SRC_DIR` | directory of the build file |
//! | `$OUT_DIR` | that directory under the build directory |
//! | `$BUILD_DIR` | the build directory |
//!
//! Every output is registered as an artifact labeled by its declared name;
//! the first one is the default artifact.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Value, json};

use super::{take_string, take_strings};
use crate::registry::Registry;
use crate::target::{BuildStatement, RuleCtx, Target, TargetError, TargetKind};

pub const TYPE_NAME: &str = "gen_rule";

pub(super) const RULE: &str = "rule gen_rule\n  command = $cmd\n  description = $desc\n\n";

const DEFAULT_CMD_NAME: &str = "COMMAND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenRule {
  outs: Vec<String>,
  cmd: String,
  cmd_name: String,
}

impl GenRule {
  /// Consume `outs`, `cmd` and `cmd_name` from the declaration options.
  pub fn from_options(options: &mut BTreeMap<String, Value>) -> Result<Self, TargetError> {
    let outs = take_strings(options, "outs")?;
    let cmd = take_string(options, "cmd")?;
    let cmd_name = take_string(options, "cmd_name")?.unwrap_or_else(|| DEFAULT_CMD_NAME.to_string());

    if outs.is_empty() {
      return Err(missing("outs"));
    }
    let mut seen = HashSet::new();
    for out in &outs {
      if out.contains("..") || out.starts_with('/') {
        return Err(TargetError::InvalidOption {
          option: "outs".to_string(),
          message: format!("\"{out}\" must be a relative path inside the target directory"),
        });
      }
      if !seen.insert(out.as_str()) {
        return Err(TargetError::InvalidOption {
          option: "outs".to_string(),
          message: format!("\"{out}\" is listed more than once"),
        });
      }
    }
    let cmd = cmd.filter(|c| !c.trim().is_empty()).ok_or_else(|| missing("cmd"))?;

    Ok(Self { outs, cmd, cmd_name })
  }

  fn substitute(&self, cmd: &str, srcs: &[String], outs: &[String], target: &Target, ctx: &RuleCtx<'_>) -> String {
    let build_dir = ctx.registry().build_dir();
    let out_dir = ctx.target_file_path(".");
    let first = |paths: &[String]| paths.first().cloned().unwrap_or_default();

    let vars = [
      ("$FIRST_SRC", first(srcs)),
      ("$FIRST_OUT", first(outs)),
      ("$SRC_DIR", target.path().to_string()),
      ("$OUT_DIR", out_dir),
      ("$BUILD_DIR", build_dir.to_string()),
      ("$SRCS", srcs.join(" ")),
      ("$OUTS", outs.join(" ")),
    ];
    substitute_vars(cmd, &vars)
  }
}

/// Replace whole-word `$NAME` variables in a single left-to-right pass.
///
/// `$SRCS_LIST` is not `$SRCS` followed by `_LIST`, and substituted values
/// are never scanned again.
fn substitute_vars(cmd: &str, vars: &[(&str, String)]) -> String {
  let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
  let mut out = String::with_capacity(cmd.len());
  let mut rest = cmd;
  while let Some(pos) = rest.find('$') {
    out.push_str(&rest[..pos]);
    rest = &rest[pos..];
    let matched = vars
      .iter()
      .find(|(name, _)| rest.strip_prefix(name).is_some_and(|tail| !tail.starts_with(is_word)));
    match matched {
      Some((name, value)) => {
        out.push_str(value);
        rest = &rest[name.len()..];
      }
      None => {
        out.push('$');
        rest = &rest[1..];
      }
    }
  }
  out.push_str(rest);
  out
}

fn missing(option: &str) -> TargetError {
  TargetError::InvalidOption {
    option: option.to_string(),
    message: "is required".to_string(),
  }
}

/// Escape `$` so the value survives ninja's own variable expansion.
fn ninja_escape(value: &str) -> String {
  value.replace('$', "$$")
}

impl TargetKind for GenRule {
  fn type_name(&self) -> &'static str {
    TYPE_NAME
  }

  fn attrs(&self) -> BTreeMap<String, Value> {
    BTreeMap::from([
      ("outs".to_string(), json!(self.outs)),
      ("cmd".to_string(), json!(self.cmd)),
      ("cmd_name".to_string(), json!(self.cmd_name)),
    ])
  }

  fn hash_entropy(&self, target: &Target) -> BTreeMap<String, Value> {
    let mut entropy = target.attr().clone();
    entropy.remove("cmd_name");
    entropy
  }

  fn configure(&self, target: &mut Target, registry: &dyn Registry) -> Result<(), TargetError> {
    target.add_location_references(&self.cmd, registry)?;
    Ok(())
  }

  fn generate(&self, target: &Target, ctx: &mut RuleCtx<'_>) -> Result<(), TargetError> {
    let srcs: Vec<String> = target.srcs().iter().map(|src| ctx.source_file_path(src)).collect();
    let outs: Vec<String> = self.outs.iter().map(|out| ctx.target_file_path(out)).collect();

    let cmd = ctx.expand_locations(&self.cmd)?;
    let cmd = self.substitute(&cmd, &srcs, &outs, target, ctx);
    let implicit_deps = ctx.dep_target_files()?;

    ctx.ninja_build(
      BuildStatement::new(TYPE_NAME, outs.clone())
        .inputs(srcs)
        .implicit_deps(implicit_deps)
        .variable("cmd", ninja_escape(&cmd))
        .variable("desc", ninja_escape(&format!("{} {}", self.cmd_name, target.fullname()))),
    );
    for (out, path) in self.outs.iter().zip(outs) {
      ctx.add_target_file(out.as_str(), path);
    }
    Ok(())
  }
}
