//! Global build configuration.
//!
//! Configuration is read from an optional TOML file at the source root
//! (`BUILD_CONFIG.toml`). Every build-affecting setting participates in the
//! configuration digest, which in turn is mixed into every rule hash: changing
//! the configuration regenerates all per-target build files.
//!
//! # Example
//!
//! ```toml
//! [global_config]
//! duplicated_source_action = "error"
//! test_timeout = 600
//! build_dir = "build64_release"
//!
//! [cc_config]
//! cppflags = ["-DNDEBUG"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::util::hash::{ContentHash, HashError, Hashable};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse configuration: {0}")]
  Parse(String),
}

/// What to do when two targets claim the same source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateSourceAction {
  /// Keep the first owner without saying anything.
  Ignore,
  /// Keep the first owner and emit a warning.
  #[default]
  #[serde(alias = "warn")]
  Warning,
  /// Abort evaluation.
  Error,
}

/// The `[global_config]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
  pub duplicated_source_action: DuplicateSourceAction,
  /// Default test timeout in seconds, `0` meaning unlimited.
  pub test_timeout: u64,
  /// Output directory, relative to the source root.
  pub build_dir: String,
}

impl Default for GlobalConfig {
  fn default() -> Self {
    Self {
      duplicated_source_action: DuplicateSourceAction::default(),
      test_timeout: 0,
      build_dir: "build64_release".to_string(),
    }
  }
}

/// The complete configuration store.
///
/// Sections other than `[global_config]` are kept verbatim so that kinds can
/// read their own settings with [`Config::get_item`]; they are still part of
/// the digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub global_config: GlobalConfig,

  #[serde(flatten)]
  pub sections: BTreeMap<String, serde_json::Value>,

  #[serde(skip)]
  digest: OnceLock<ContentHash>,
}

impl Hashable for Config {}

impl Config {
  /// Load configuration from a TOML file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let config = Self::from_toml(&content)?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
  }

  /// Load configuration from `path` if it exists, defaults otherwise.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    if path.is_file() {
      Self::load(path)
    } else {
      debug!(path = %path.display(), "no configuration file, using defaults");
      Ok(Self::default())
    }
  }

  /// Parse configuration from a TOML string.
  pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
  }

  /// Stable hash of all build-affecting configuration, computed once.
  pub fn digest(&self) -> Result<ContentHash, HashError> {
    if let Some(digest) = self.digest.get() {
      return Ok(digest.clone());
    }
    let digest = self.compute_hash()?;
    Ok(self.digest.get_or_init(|| digest).clone())
  }

  /// Look up `key` inside `[section]`.
  ///
  /// Returns `None` when either the section or the key is missing.
  pub fn get_item(&self, section: &str, key: &str) -> Option<serde_json::Value> {
    if section == "global_config" {
      let global = serde_json::to_value(&self.global_config).ok()?;
      return global.get(key).cloned();
    }
    self.sections.get(section)?.get(key).cloned()
  }

  pub fn duplicated_source_action(&self) -> DuplicateSourceAction {
    self.global_config.duplicated_source_action
  }
}
