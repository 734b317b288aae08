//! Hashing utilities for change detection.
//!
//! This module provides:
//! - `ContentHash`: a full 64-character SHA-256 digest
//! - `Hashable`: hash any serializable value through its canonical JSON form
//! - `canonical_json()`: order-independent serialization used before hashing
//! - `hash_bytes()`: arbitrary byte hashing

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type HashError = serde_json::Error;

/// A full SHA-256 digest, rendered as lowercase hex.
///
/// Used both as the configuration digest and as the rule hash of a target.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Types whose identity for change detection is their serialized form.
pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ContentHash, HashError> {
    let serialized = canonical_json(self)?;
    Ok(hash_bytes(serialized.as_bytes()))
  }
}

/// Serialize a value to JSON with every object's keys sorted.
///
/// Going through [`serde_json::Value`] sorts map keys recursively, so two
/// values that only differ in map insertion order produce the same string.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
  let value = serde_json::to_value(value)?;
  serde_json::to_string(&value)
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}
