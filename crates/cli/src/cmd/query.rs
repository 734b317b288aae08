//! Query command implementation.
//!
//! Shows the declaration of each selected target together with its direct
//! and expanded dependencies.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use buildgen_lib::registry::Registry;

use crate::cmd::Workspace;
use crate::output::{OutputFormat, print_dependency, print_field, print_json, print_target_heading};

pub fn cmd_query(root: &Path, config: Option<&Path>, patterns: &[String], output: OutputFormat) -> Result<()> {
  let ws = Workspace::load(root, config)?;
  let graph = ws.graph(patterns)?;

  let targets: Vec<_> = graph.selected().iter().filter_map(|key| ws.db.lookup(key)).collect();

  if output.is_json() {
    let items: Vec<Value> = targets
      .iter()
      .map(|target| {
        let mut dump = target.dump();
        if let Value::Object(map) = &mut dump {
          map.insert("key".to_string(), Value::String(target.key().to_string()));
          map.insert(
            "expanded_deps".to_string(),
            target.expanded_deps().iter().map(|d| Value::String(d.to_string())).collect(),
          );
        }
        dump
      })
      .collect();
    return print_json(&items);
  }

  for target in &targets {
    print_target_heading(target.fullname(), target.type_name());
    print_field("Defined at", &target.source_location().to_string());
    if !target.srcs().is_empty() {
      print_field("Sources", &target.srcs().join(" "));
    }
    for dep in target.expanded_deps() {
      print_dependency(&dep.fullname(), !target.deps().contains(dep));
    }
  }
  Ok(())
}
