use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use facecam_core::shared::constants::{
    DEFAULT_DEVICE_INDEX, HAAR_MODEL_PATH, LBP_MODEL_PATH, NEURAL_MODEL_PATH,
};

/// Persisted defaults for `facecam`; command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device: u32,
    pub capture_backend: String,
    pub detector: String,
    pub neural_backend: String,
    pub haar_model: PathBuf,
    pub lbp_model: PathBuf,
    pub neural_model: PathBuf,
    pub font: Option<PathBuf>,
    pub grayscale: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE_INDEX,
            capture_backend: "any".to_string(),
            detector: "none".to_string(),
            neural_backend: "onnx".to_string(),
            haar_model: PathBuf::from(HAAR_MODEL_PATH),
            lbp_model: PathBuf::from(LBP_MODEL_PATH),
            neural_model: PathBuf::from(NEURAL_MODEL_PATH),
            font: None,
            grayscale: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facecam").join("settings.json"))
    }

    /// Reads the user's settings file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed settings {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save(&self) -> io::Result<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
