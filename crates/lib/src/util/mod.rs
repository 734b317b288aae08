//! Shared utilities.
//!
//! Common utilities used across the crate including hashing, lexical path
//! handling and test helpers.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod hash;
pub mod path;

#[cfg(test)]
pub mod testutil;

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
///
/// Every mutex in this crate guards plain state whose invariants hold between
/// statements, so a poisoned guard is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
