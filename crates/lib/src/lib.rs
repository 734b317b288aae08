//! buildgen-lib: Target and dependency core of the buildgen build generator
//!
//! This crate turns declarative build files into ninja build statements:
//! - `key`: canonical target keys, command line patterns and dependency references
//! - `target`: the target entity, its rule hash and its generated rules
//! - `registry`: shared target table and source ownership map
//! - `graph`: selection, validation and parallel hashing of the dependency graph
//! - `backend`: per-target ninja files regenerated only when their hash changes

pub mod backend;
pub mod config;
pub mod consts;
pub mod graph;
pub mod key;
pub mod kinds;
pub mod loader;
pub mod location;
pub mod registry;
pub mod target;
pub mod util;
