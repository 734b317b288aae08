use std::path::Path;

use anyhow::Result;

use buildgen_lib::backend;
use buildgen_lib::registry::Registry;

use crate::cmd::Workspace;
use crate::output::{print_note, print_ok};

/// Remove the generated outputs of the selected targets.
pub fn cmd_clean(root: &Path, config: Option<&Path>, patterns: &[String]) -> Result<()> {
  let ws = Workspace::load(root, config)?;
  let graph = ws.graph(patterns)?;

  let targets: Vec<_> = graph.selected().iter().filter_map(|key| ws.db.lookup(key)).collect();
  let refs: Vec<_> = targets.iter().map(|t| t.as_ref()).collect();
  let removed = backend::clean(&ws.root, &refs, &ws.db)?;

  if removed == 0 {
    print_note("Nothing to clean");
  } else {
    print_ok(&format!("Removed {removed} generated path(s)"));
  }
  Ok(())
}
