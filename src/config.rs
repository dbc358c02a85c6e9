use error_set::error_set;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file looked up in the repository root
pub const SETTINGS_FILE: &str = ".git-partial.toml";

error_set! {
    /// Errors from loading settings
    ConfigError := {
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
        #[display("Invalid settings in {path}: {message}")]
        Invalid { path: String, message: String },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Pointer travel in pixels before a press becomes a drag
    pub drag_threshold: f64,
    /// Allow patches that cover only part of a file
    pub partial_patches: bool,
    /// Context lines around each hunk in fetched diffs
    pub context_lines: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            drag_threshold: 4.0,
            partial_patches: true,
            context_lines: 3,
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Invalid {
            path: path.display().to_string(),
            message: e.message().to_string(),
        })
    }

    /// Load settings from `explicit`, else from [`SETTINGS_FILE`] in `repo`.
    ///
    /// An explicit file must exist. Without one, a missing repository file
    /// means defaults.
    pub fn load(explicit: Option<&Path>, repo: &Path) -> Result<Self, ConfigError> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = repo.join(SETTINGS_FILE);
                if !path.exists() {
                    log::debug!("no {SETTINGS_FILE} in {}, using defaults", repo.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let settings = Self::from_toml(&text, &path)?;
        log::debug!("loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }
}
