use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub helper: HelperConfig,
    #[serde(default)]
    pub conflicts: ConflictsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HelperConfig {
    /// Executable name used for kill-by-name and liveness polling.
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// Directory holding the startup scripts. Relative paths resolve against
    /// the directory of the running executable.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    #[serde(default = "default_primary_script")]
    pub primary_script: String,
    /// Alternate variants; empty means "discover from `scripts_dir`".
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConflictsConfig {
    #[serde(default = "default_conflict_names")]
    pub process_names: Vec<String>,
    #[serde(default = "default_conflict_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_launch_settle_ms")]
    pub launch_settle_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationsConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
}

// Defaults for HelperConfig
#[cfg(target_os = "windows")]
fn default_process_name() -> String {
    "winws.exe".to_string()
}

#[cfg(not(target_os = "windows"))]
fn default_process_name() -> String {
    "winws".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("general")
}

#[cfg(target_os = "windows")]
fn default_primary_script() -> String {
    "general.bat".to_string()
}

#[cfg(not(target_os = "windows"))]
fn default_primary_script() -> String {
    "general.sh".to_string()
}

// Defaults for ConflictsConfig
#[cfg(target_os = "windows")]
fn default_conflict_names() -> Vec<String> {
    ["discord.exe", "Discord.exe", "DiscordPTB.exe", "DiscordCanary.exe"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(not(target_os = "windows"))]
fn default_conflict_names() -> Vec<String> {
    ["Discord", "DiscordPTB", "DiscordCanary"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_conflict_settle_ms() -> u64 {
    2000
}

// Defaults for TimingConfig
fn default_cooldown_ms() -> u64 {
    500
}

fn default_launch_settle_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

// Defaults for NotificationsConfig
fn default_notifications_enabled() -> bool {
    true
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            process_name: default_process_name(),
            scripts_dir: default_scripts_dir(),
            primary_script: default_primary_script(),
            variants: Vec::new(),
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            process_names: default_conflict_names(),
            settle_ms: default_conflict_settle_ms(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            launch_settle_ms: default_launch_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
        }
    }
}

impl TimingConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl HelperConfig {
    /// Absolute scripts directory.
    pub fn resolved_scripts_dir(&self) -> PathBuf {
        if self.scripts_dir.is_absolute() {
            return self.scripts_dir.clone();
        }
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(&self.scripts_dir)
    }
}

pub fn get_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".aether.json")
}

pub fn load_or_create_config() -> Result<Config> {
    let path = get_config_path();

    if path.exists() {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        let config = parse_config(&content)?;
        validate_config(&config)?;
        Ok(config)
    } else {
        let config = Config::default();
        save_config(&config)?;
        Ok(config)
    }
}

/// Re-read the config file for a hot reload. Unlike startup, a missing file
/// is an error here rather than a reason to write defaults.
pub fn load_and_validate_config() -> Result<Config> {
    let path = get_config_path();
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = parse_config(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    serde_json::from_str::<Config>(content).context("failed to parse config file")
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.helper.process_name.trim().is_empty() {
        return Err(anyhow!("helper.process_name must not be empty"));
    }
    if config.helper.primary_script.trim().is_empty() {
        return Err(anyhow!("helper.primary_script must not be empty"));
    }
    if config.timing.poll_interval_ms == 0 {
        return Err(anyhow!("timing.poll_interval_ms must be greater than zero"));
    }
    if config.timing.cooldown_ms == 0 {
        return Err(anyhow!("timing.cooldown_ms must be greater than zero"));
    }
    if config
        .conflicts
        .process_names
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(anyhow!("conflicts.process_names contains an empty entry"));
    }
    Ok(())
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = get_config_path();
    let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(&path, content).context("failed to write config file")?;
    Ok(())
}
