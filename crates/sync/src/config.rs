use anyhow::Result;
use log::warn;
use project::ResultSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Process-wide remote configuration: base address plus the bearer
/// credential. Explicitly loaded and injected into the synchronizer
/// and the generation client; nothing reads it from ambient globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// True when the base address points at the bundled mock backend;
    /// results generated against it are tagged accordingly.
    pub mock: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            mock: false,
        }
    }
}

impl ApiConfig {
    pub fn default_path() -> PathBuf {
        project::app_data_dir().join("config.json")
    }

    /// Missing or unreadable config falls back to defaults; the
    /// workspace must come up either way.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("config at {} is corrupt, using defaults: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn has_credential(&self) -> bool {
        self.token.is_some()
    }

    pub fn result_source(&self) -> ResultSource {
        if self.mock {
            ResultSource::Mock
        } else {
            ResultSource::Api
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("odin-config-{}.json", std::process::id()))
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = ApiConfig::load(Path::new("/definitely/not/here.json"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(!config.has_credential());
    }

    #[test]
    fn token_lifecycle_roundtrips_through_disk() {
        let path = temp_path();
        let mut config = ApiConfig::default();
        config.set_token("tok-123");
        config.save(&path).unwrap();

        let loaded = ApiConfig::load(&path);
        assert_eq!(loaded.token.as_deref(), Some("tok-123"));

        let mut loaded = loaded;
        loaded.clear_token();
        loaded.save(&path).unwrap();
        assert!(!ApiConfig::load(&path).has_credential());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn mock_flag_drives_result_provenance() {
        let mut config = ApiConfig::default();
        assert_eq!(config.result_source(), ResultSource::Api);
        config.mock = true;
        assert_eq!(config.result_source(), ResultSource::Mock);
    }
}
