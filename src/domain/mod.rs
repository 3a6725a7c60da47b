//! # Domain Layer
//!
//! Core models, content hashing, and the error taxonomy.
//! This layer is independent of external frameworks and infrastructure.

mod error;
pub mod hash;
pub mod models;

pub use error::*;
pub use models::*;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
