use std::path::Path;

use anyhow::Result;

use crate::cmd::Workspace;

/// Print `key hash` for every selected target.
pub fn cmd_hash(root: &Path, config: Option<&Path>, patterns: &[String]) -> Result<()> {
  let ws = Workspace::load(root, config)?;
  let graph = ws.graph(patterns)?;
  let hashes = graph.compute_hashes(&ws.db)?;

  for key in graph.selected() {
    if let Some(hash) = hashes.get(key) {
      println!("{} {}", key.fullname(), hash);
    }
  }
  Ok(())
}
