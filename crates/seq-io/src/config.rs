//! INI-backed configuration with literal `CATO_<SECTION>_<KEY>` environment
//! overrides, matching the `ConfigManager` pattern of the system this engine
//! automates: chosen over a generic layered config crate because its
//! automatic env-key splitting cannot express an override key containing an
//! underscore (`api_key`) without ambiguity.

use ini::Ini;
use std::path::{Path, PathBuf};

pub struct AppConfig {
    ini: Ini,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        Ok(Self { ini })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        if let Some(value) = env_override(section, key) {
            return Some(value);
        }
        self.ini.get_from(Some(section), key).map(str::to_string)
    }

    pub fn get_or(&self, section: &str, key: &str, fallback: &str) -> String {
        self.get(section, key).unwrap_or_else(|| fallback.to_string())
    }

    pub fn get_bool(&self, section: &str, key: &str, fallback: bool) -> bool {
        match self.get(section, key) {
            Some(value) => matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
            None => fallback,
        }
    }

    pub fn get_f64(&self, section: &str, key: &str, fallback: f64) -> f64 {
        match self.get(section, key) {
            Some(value) => value.parse().unwrap_or(fallback),
            None => fallback,
        }
    }
}

fn env_override(section: &str, key: &str) -> Option<String> {
    let env_key = format!("CATO_{}_{}", section.to_uppercase(), key.to_uppercase());
    std::env::var(env_key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("configuration file malformed: {0}")]
    Malformed(String),
}
