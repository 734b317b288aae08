mod clean;
mod gen_cmd;
mod hash;
mod query;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use buildgen_lib::config::Config;
use buildgen_lib::consts::{CONFIG_FILE_NAME, ROOT_DIR};
use buildgen_lib::graph::TargetGraph;
use buildgen_lib::key;
use buildgen_lib::loader;
use buildgen_lib::registry::TargetDatabase;

pub use clean::cmd_clean;
pub use gen_cmd::cmd_gen;
pub use hash::cmd_hash;
pub use query::cmd_query;

/// A loaded source tree: every build file evaluated into one database.
pub struct Workspace {
  pub root: PathBuf,
  pub db: TargetDatabase,
}

impl Workspace {
  pub fn load(root: &Path, config: Option<&Path>) -> Result<Self> {
    let root = dunce::canonicalize(root).with_context(|| format!("Source root {} not found", root.display()))?;
    let config_path = config.map(Path::to_path_buf).unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
    let config = Config::load_or_default(&config_path)?;

    let db = TargetDatabase::new(config);
    let declared = loader::load_tree(&root, &db)?;
    if db.is_empty() {
      bail!("No targets declared under {}", root.display());
    }
    debug!(root = %root.display(), declared, registered = db.len(), "loaded workspace");
    Ok(Self { root, db })
  }

  /// Graph of the targets matched by `patterns`, relative to the source root.
  pub fn graph(&self, patterns: &[String]) -> Result<TargetGraph> {
    let patterns = key::normalize(patterns, ROOT_DIR)?;
    Ok(TargetGraph::build(&self.db, &patterns)?)
  }
}
