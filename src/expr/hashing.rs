//! Hash folding shared by semantic and plan hashes
//!
//! Hashes are `i32` folds of the form `31 * h + x` with wrapping arithmetic,
//! so they are stable across processes and platforms. Strings fold through
//! CRC32.

use serde_json::Value;

/// Folds `x` into `h`
pub(crate) fn combine(h: i32, x: i32) -> i32 {
    h.wrapping_mul(31).wrapping_add(x)
}

/// Folds every element of `items` into a fresh hash
pub(crate) fn combine_all(items: impl IntoIterator<Item = i32>) -> i32 {
    items.into_iter().fold(1, combine)
}

/// Hash of a string
pub(crate) fn hash_str(s: &str) -> i32 {
    crc32fast::hash(s.as_bytes()) as i32
}

/// Hash of a JSON value via its canonical serialization
pub(crate) fn hash_json(value: &Value) -> i32 {
    hash_str(&value.to_string())
}
