//! Embedding providers: ONNX Runtime inference and the deterministic mock.

mod mock;
mod ort;
mod profile;
mod unavailable;

pub use mock::MockEmbeddingProvider;
pub use ort::OrtEmbeddingProvider;
pub use profile::{EmbeddingProfile, HardwareSnapshot};
pub use unavailable::UnavailableEmbeddingProvider;
