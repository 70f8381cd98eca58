//! Undo system settings.
//!
//! Settings normally live in the `[undo]` table of the editor's settings
//! file:
//!
//! ```toml
//! [undo]
//! max_undo = 250
//! coalesce_visual_only = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default maximum number of undo steps.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// Errors raised while loading [`UndoConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse undo settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for [`UndoSystem`](crate::UndoSystem).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Maximum number of batches on the undo stack. The oldest batch is
    /// dropped when a push exceeds it.
    pub max_undo: usize,
    /// Fold visual-only captures of an entity into the batch just
    /// committed for it, instead of opening a new undo step.
    pub coalesce_visual_only: bool,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_undo: DEFAULT_MAX_UNDO,
            coalesce_visual_only: true,
        }
    }
}

#[derive(Deserialize)]
struct SettingsFile {
    #[serde(default)]
    undo: UndoConfig,
}

impl UndoConfig {
    /// Parses the `[undo]` table of a settings document. A missing table
    /// yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: SettingsFile = toml::from_str(content)?;
        Ok(file.undo)
    }

    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads settings, falling back to the defaults if the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!(
                    "Loaded undo settings from {} (max_undo = {})",
                    path.display(),
                    config.max_undo
                );
                config
            }
            Err(e) => {
                log::warn!("No undo settings ({e}), using defaults");
                Self::default()
            }
        }
    }
}
