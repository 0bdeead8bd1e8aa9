//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cooldown::GateConfig;
use crate::tracker::TrackerPolicy;

/// Main progtrack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote progress service
    pub remote: RemoteConfig,

    /// Outbound call cooldowns
    pub cooldowns: CooldownsConfig,

    /// Response cache tuning
    pub cache: CacheConfig,

    /// Event tracking policy
    pub tracking: TrackingConfig,

    /// Duty catalog source
    pub catalog: CatalogConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.remote.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "API key not found. Set the {} environment variable.",
                self.remote.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .progtrack.yml
        let local_config = PathBuf::from(".progtrack.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/progtrack/progtrack.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("progtrack").join("progtrack.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Remote progress service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Service base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.progpoints.app".to_string(),
            api_key_env: "PROGTRACK_API_KEY".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Cooldown windows per operation class
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownsConfig {
    /// Startup grace period during which nothing is throttled
    #[serde(rename = "grace-secs")]
    pub grace_secs: u64,

    /// Minimum interval between read-class calls
    #[serde(rename = "read-secs")]
    pub read_secs: u64,

    /// Minimum interval between write-class calls
    #[serde(rename = "write-secs")]
    pub write_secs: u64,

    /// Minimum interval between quick-action calls
    #[serde(rename = "quick-secs")]
    pub quick_secs: u64,
}

impl Default for CooldownsConfig {
    fn default() -> Self {
        Self {
            grace_secs: 10,
            read_secs: 3,
            write_secs: 5,
            quick_secs: 2,
        }
    }
}

impl From<&CooldownsConfig> for GateConfig {
    fn from(config: &CooldownsConfig) -> Self {
        Self {
            grace: Duration::from_secs(config.grace_secs),
            read: Duration::from_secs(config.read_secs),
            write: Duration::from_secs(config.write_secs),
            quick: Duration::from_secs(config.quick_secs),
        }
    }
}

/// Response cache tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    /// Interval between expiry sweeps in seconds
    #[serde(rename = "sweep-secs")]
    pub sweep_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_secs)
    }
}

/// Event tracking policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Whether the tracker subscribes to the event feed at all
    pub enabled: bool,

    /// Drop actions cast by the local player
    #[serde(rename = "ignore-self")]
    pub ignore_self: bool,

    /// Drop actions cast by party members
    #[serde(rename = "ignore-party")]
    pub ignore_party: bool,

    /// Clear session de-duplication on instance leave
    #[serde(rename = "reset-on-leave")]
    pub reset_on_leave: bool,

    /// Allow the health-total boss heuristic when no allowed set is loaded
    #[serde(rename = "boss-heuristic")]
    pub boss_heuristic: bool,

    /// Minimum max-HP for the heuristic to call a source a boss
    #[serde(rename = "boss-hp-floor")]
    pub boss_hp_floor: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_self: true,
            ignore_party: false,
            reset_on_leave: true,
            boss_heuristic: false,
            boss_hp_floor: 5_000_000,
        }
    }
}

impl TrackingConfig {
    pub fn policy(&self) -> TrackerPolicy {
        TrackerPolicy {
            ignore_local_player: self.ignore_self,
            ignore_party: self.ignore_party,
            reset_on_leave: self.reset_on_leave,
            boss_heuristic: self.boss_heuristic,
            boss_hp_floor: self.boss_hp_floor,
        }
    }
}

/// Duty catalog source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// YAML file listing known duties and their locations
    #[serde(rename = "duties-file")]
    pub duties_file: Option<PathBuf>,
}
