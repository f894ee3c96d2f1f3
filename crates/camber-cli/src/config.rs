//! On-disk configuration plus the file-backed credential store

use std::path::{Path, PathBuf};

use camber_agent::ports::{API_KEY_ENV, API_KEY_NAME, CredentialStore};
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "CAMBER_CONFIG_PATH";
const CONFIG_FILE: &str = "config.toml";

/// Contents of config.toml. Every field is optional; unknown fields in
/// the file are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini API key (the field name is historical)
    pub openai_api_key: Option<String>,
    /// Model id or name fragment, resolved against the known catalog
    pub model: Option<String>,
    /// Start sessions in robot-module mode
    pub robot: Option<bool>,
    /// OpenSCAD binary to invoke
    pub openscad_bin: Option<String>,
    /// Kill compiles that run longer than this
    pub compile_timeout_secs: Option<u64>,
}

const EXAMPLE_CONFIG: &str = r#"# camber configuration

# Gemini API key. The GEMINI_API_KEY environment variable takes
# precedence when both are set.
# openai_api_key = ""

# Model id or name fragment, e.g. "gemini-3-pro-preview" or "flash".
# model = "gemini-3-pro-preview"

# Start sessions in robot-module mode.
# robot = false

# OpenSCAD binary to invoke.
# openscad_bin = "openscad"

# Kill compiles that run longer than this many seconds.
# compile_timeout_secs = 60
"#;

impl Config {
    /// Platform config location, e.g. ~/.config/camber/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camber").join(CONFIG_FILE))
    }

    /// An explicit flag wins, then $CAMBER_CONFIG_PATH, then the default
    pub fn resolve_path(flag: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = flag {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        Self::default_path()
    }

    /// A missing file is the default config; a malformed one is logged
    /// and also treated as default rather than aborting startup.
    pub fn load_from(path: &Path) -> Config {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Config::default();
        };
        match toml::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring malformed config {}: {e}", path.display());
                Config::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Write a commented example config, refusing to overwrite
    pub fn init(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, EXAMPLE_CONFIG)?;
        Ok(())
    }
}

/// Credential store over the config file. Reads prefer the environment
/// so a shell-exported key always wins; writes only touch the file.
pub struct FileCredentials {
    path: Option<PathBuf>,
}

impl FileCredentials {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileCredentials {
    fn get(&self, name: &str) -> Option<String> {
        if name != API_KEY_NAME {
            return None;
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        let path = self.path.as_ref()?;
        Config::load_from(path)
            .openai_api_key
            .filter(|key| !key.is_empty())
    }

    fn set(&self, name: &str, value: &str) -> camber_agent::Result<()> {
        if name != API_KEY_NAME {
            return Err(camber_agent::Error::other(format!(
                "unknown credential {name}"
            )));
        }
        let Some(path) = self.path.as_ref() else {
            return Err(camber_agent::Error::other(
                "no config path available to store the key",
            ));
        };
        let mut config = Config::load_from(path);
        config.openai_api_key = Some(value.to_string());
        config
            .save_to(path)
            .map_err(|e| camber_agent::Error::other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            openai_api_key: Some("abc123".into()),
            model: Some("flash".into()),
            robot: Some(true),
            openscad_bin: Some("/usr/bin/openscad".into()),
            compile_timeout_secs: Some(120),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.openai_api_key.as_deref(), Some("abc123"));
        assert_eq!(loaded.model.as_deref(), Some("flash"));
        assert_eq!(loaded.robot, Some(true));
        assert_eq!(loaded.compile_timeout_secs, Some(120));
    }

    #[test]
    fn missing_file_loads_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml"));
        assert!(config.openai_api_key.is_none());
        assert!(config.model.is_none());
    }

    #[test]
    fn malformed_file_loads_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "robot = \"not a bool").unwrap();
        let config = Config::load_from(&path);
        assert!(config.robot.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"flash\"\nfuture_option = 3\n").unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.model.as_deref(), Some("flash"));
    }

    #[test]
    fn the_example_config_parses() {
        let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::init(&path).unwrap();
        assert!(Config::init(&path).is_err());
    }

    #[test]
    fn resolve_path_prefers_the_flag() {
        let flag = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(Config::resolve_path(Some(&flag)), Some(flag));
    }

    #[test]
    fn set_stores_the_key_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"flash\"\n").unwrap();

        let store = FileCredentials::new(Some(path.clone()));
        store.set(API_KEY_NAME, "new-key").unwrap();

        // the key lands next to the existing settings
        let config = Config::load_from(&path);
        assert_eq!(config.openai_api_key.as_deref(), Some("new-key"));
        assert_eq!(config.model.as_deref(), Some("flash"));
    }

    #[test]
    fn set_rejects_unknown_credentials() {
        let store = FileCredentials::new(None);
        assert!(store.set("something_else", "value").is_err());
    }

    #[test]
    fn get_only_answers_for_the_api_key() {
        let store = FileCredentials::new(None);
        assert_eq!(store.get("something_else"), None);
    }
}
