//! Content hashing over whitespace-normalized text.
//!
//! All digests are computed over the normalized form so that symbols and
//! chunks survive cosmetic reformatting.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_64;

/// Normalize a text fragment for hashing: split on line terminators, trim
/// each line, drop empty lines, collapse interior whitespace runs to a
/// single space, rejoin with `\n`.
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 64-hex SHA-256 digest of the normalized text.
pub fn hash(text: &str) -> String {
    let digest = Sha256::digest(normalize(text).as_bytes());
    format!("{:x}", digest)
}

/// 64-hex SHA-256 digest over the non-null parts, each normalized and
/// joined with a single `\n`.
pub fn hash_parts(parts: &[Option<&str>]) -> String {
    let joined = parts
        .iter()
        .flatten()
        .map(|p| normalize(p))
        .collect::<Vec<_>>()
        .join("\n");
    let digest = Sha256::digest(joined.as_bytes());
    format!("{:x}", digest)
}

/// 16-hex xxh3 digest of the normalized text. Used for per-symbol stability
/// checks where collision resistance is not required.
pub fn semantic_hash(text: &str) -> String {
    format!("{:016x}", xxh3_64(normalize(text).as_bytes()))
}
