//! Constants shared across the crate.

/// Name of the application, used in generated file headers.
pub const APP_NAME: &str = "buildgen";

/// File name of a build description inside a source directory.
pub const BUILD_FILE_NAME: &str = "BUILD";

/// Default configuration file name at the source root.
pub const CONFIG_FILE_NAME: &str = "BUILD_CONFIG.toml";

/// Canonical directory of the source root.
pub const ROOT_DIR: &str = ".";

/// Pseudo directory holding system library targets (`#name`).
pub const SYSTEM_LIBRARY_DIR: &str = "#";

/// Visibility marker meaning "any target may depend on this one".
pub const PUBLIC_VISIBILITY: &str = "PUBLIC";

/// Tool revision marker mixed into every rule hash.
///
/// Bump whenever the shape of emitted build statements changes so that cached
/// per-target ninja files are regenerated.
pub const REVISION: &str = concat!(env!("CARGO_PKG_VERSION"), "+rules.1");

/// Name of the root ninja file written at the source root.
pub const ROOT_NINJA_FILE: &str = "build.ninja";

/// Header prefix of per-target ninja files recording the rule hash.
pub const RULE_HASH_HEADER: &str = "# rule_hash: ";
