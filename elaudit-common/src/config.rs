//! Configuration loading and root folder resolution

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Periodic task intervals for the sync scheduler
///
/// Three independent network timers plus the local persistence safety net.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncIntervals {
    /// Incremental update pulls from the Hub
    pub pull_secs: u64,
    /// Liveness beacons
    pub heartbeat_secs: u64,
    /// Active-technician list refresh
    pub presence_secs: u64,
    /// Durable snapshot write, as a safety net against missed persists
    pub persist_secs: u64,
}

impl Default for SyncIntervals {
    fn default() -> Self {
        Self {
            pull_secs: 3,
            heartbeat_secs: 10,
            presence_secs: 15,
            persist_secs: 30,
        }
    }
}

impl SyncIntervals {
    pub fn pull(&self) -> Duration {
        Duration::from_secs(self.pull_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn presence(&self) -> Duration {
        Duration::from_secs(self.presence_secs)
    }

    pub fn persist(&self) -> Duration {
        Duration::from_secs(self.persist_secs)
    }
}

/// Field client configuration from the TOML config file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    /// Base URL of the remote Hub API
    pub hub_url: String,
    /// Local address the tablet UI API binds to
    pub bind_addr: String,
    pub intervals: SyncIntervals,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            hub_url: "https://diagnostic-hub.example.net".to_string(),
            bind_addr: "127.0.0.1:5731".to_string(),
            intervals: SyncIntervals::default(),
        }
    }
}

impl FieldConfig {
    /// Load configuration from a TOML file, or defaults if absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_file() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(config_path) = default_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Default configuration file path for the platform
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("elaudit").join("config.toml"))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("elaudit"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\elaudit"))
    } else {
        // ~/.local/share/elaudit on Linux, ~/Library/Application Support/elaudit on macOS
        dirs::data_local_dir()
            .map(|d| d.join("elaudit"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/elaudit"))
    }
}

/// Ensure the root folder exists, creating it if missing
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        tracing::info!("Created root folder: {}", root.display());
    }
    Ok(())
}

/// Path of the local database inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("elaudit.db")
}
