use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::IndexError;

/// Embedding execution profile chosen from detected hardware. `Light` is
/// always available as a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProfile {
    Light,
    Standard,
    Performance,
}

impl EmbeddingProfile {
    pub fn model_id(&self) -> &'static str {
        match self {
            // Small CPU-friendly model for the fallback profile.
            EmbeddingProfile::Light => "sentence-transformers/all-MiniLM-L6-v2",
            EmbeddingProfile::Standard => "sentence-transformers/all-MiniLM-L6-v2",
            EmbeddingProfile::Performance => "BAAI/bge-small-en-v1.5",
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            EmbeddingProfile::Light => 8,
            EmbeddingProfile::Standard => 32,
            EmbeddingProfile::Performance => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingProfile::Light => "light",
            EmbeddingProfile::Standard => "standard",
            EmbeddingProfile::Performance => "performance",
        }
    }
}

/// Snapshot of the hardware the profile decision was made on; persisted to
/// `config.json` by `init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSnapshot {
    pub cpu_cores: usize,
    pub profile: EmbeddingProfile,
}

impl HardwareSnapshot {
    /// Probe the machine and pick a profile.
    pub fn detect() -> Self {
        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let profile = if cpu_cores >= 16 {
            EmbeddingProfile::Performance
        } else if cpu_cores >= 4 {
            EmbeddingProfile::Standard
        } else {
            EmbeddingProfile::Light
        };

        info!("Detected {} cores, profile {}", cpu_cores, profile.as_str());
        Self { cpu_cores, profile }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| IndexError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a previously persisted snapshot; an unreadable or invalid file
    /// falls back to fresh detection with a warning.
    pub fn read_or_detect(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Invalid embedding config, re-detecting: {}", e);
                    Self::detect()
                }
            },
            Err(_) => Self::detect(),
        }
    }
}
