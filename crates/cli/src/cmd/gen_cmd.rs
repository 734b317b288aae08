//! Gen command implementation.
//!
//! Validates the selected graph, hashes it and rewrites the ninja file of
//! every target whose rule hash changed.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use buildgen_lib::backend::{self, WriteOutcome};
use buildgen_lib::registry::Registry;

use crate::cmd::Workspace;
use crate::output::{GenSummary, print_summary, print_written};

pub fn cmd_gen(root: &Path, config: Option<&Path>, patterns: &[String]) -> Result<()> {
  let start = Instant::now();
  let ws = Workspace::load(root, config)?;
  let graph = ws.graph(patterns)?;
  graph.check_visibility(&ws.db)?;
  let hashes = graph.compute_hashes(&ws.db)?;

  let mut summary = GenSummary::default();
  let mut ninja_files = Vec::new();

  for (key, hash) in &hashes {
    if key.is_system_library() {
      continue;
    }
    let target = ws
      .db
      .lookup(key)
      .with_context(|| format!("Target {} disappeared from the database", key.fullname()))?;

    match backend::write_target(&ws.root, &target, hash, &ws.db)? {
      WriteOutcome::Written => {
        summary.written += 1;
        print_written(&key.fullname(), hash.as_str());
      }
      WriteOutcome::Unchanged => summary.unchanged += 1,
    }
    ninja_files.push(backend::ninja_file(&target, &ws.db));
  }

  let root_file = backend::write_root(&ws.root, &ws.db, &ninja_files)?;

  summary.targets = ninja_files.len();
  summary.elapsed = start.elapsed();
  print_summary(&format!("Generated {}", root_file.display()), &summary);
  Ok(())
}
