//! Small persisted key/value store for UI choices (theme, last mode, variant).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;
use serde_json::{Map, Value};

pub const KEY_DARK_THEME: &str = "dark_theme";
pub const KEY_MODE: &str = "mode";
pub const KEY_VARIANT: &str = "variant";

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl SettingsStore {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aether")
            .join("settings.json")
    }

    pub fn load() -> Result<Self> {
        Self::open(Self::default_path())
    }

    /// A missing file is an empty store. A corrupt one is logged and replaced on
    /// the next write.
    pub fn open(path: PathBuf) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!("Ignoring unreadable settings file {}", path.display());
                    Map::new()
                }
            }
        } else {
            Map::new()
        };
        Ok(Self { path, values })
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.values.insert(key.to_string(), Value::Bool(value));
        self.save()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .insert(key.to_string(), Value::String(value.to_string()));
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(&self.values).context("failed to serialize settings")?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write settings {}", self.path.display()))
    }
}
