//! `tavern.toml` loading.
//!
//! Every section is optional; a missing file yields the built-in defaults so
//! a fresh checkout can `tavern serve` without any setup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tavern_agent::{BackendConfig, MemoryConfig};
use tavern_core::{TavernError, TavernResult};

#[derive(Debug, Deserialize)]
pub struct TavernConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Root against which character image paths are resolved for cleanup.
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TavernConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            memory: MemoryConfig::default(),
            assets_dir: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl TavernConfig {
    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> TavernResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(TavernError::Config(format!(
                    "Failed to read config '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        toml::from_str(&content).map_err(|e| {
            TavernError::Config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Apply `TAVERN_DATA_DIR` / `TAVERN_BACKEND_URL` style overrides.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TAVERN_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("TAVERN_BACKEND_URL") {
            self.backend.base_url = url;
        }
    }

    pub fn characters_path(&self) -> PathBuf {
        self.data_dir.join("characters.json")
    }

    pub fn personas_path(&self) -> PathBuf {
        self.data_dir.join("personas.json")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}
