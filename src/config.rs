use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::facility::{Endpoint, Facility};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config directory")]
    NoConfigDir,

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which D-Bus daemon VDR is registered on.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// dbus2vdr's default
    #[default]
    System,
    Session,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,

    /// VDR instance index; non-zero instances own `de.tvdr.vdr<N>`
    #[serde(default)]
    pub instance: u32,

    /// Facilities to load, or `["all"]`
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Deadline for ordinary calls
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Deadline for ConfirmShutdown, which runs VDR's shutdown hooks first
    #[serde(default = "default_confirm_shutdown_timeout")]
    pub confirm_shutdown_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::default(),
            instance: 0,
            modules: default_modules(),
            call_timeout_secs: default_call_timeout(),
            confirm_shutdown_timeout_secs: default_confirm_shutdown_timeout(),
        }
    }
}

impl BusConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            instance: self.instance,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            confirm_timeout: Duration::from_secs(self.confirm_shutdown_timeout_secs),
        }
    }

    pub fn facilities(&self) -> Result<Vec<Facility>, ConfigError> {
        Facility::parse_list(&self.modules).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Levels accepted in `[logging].level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn default_log_level() -> String {
    "info".to_string()
}

fn default_modules() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_call_timeout() -> u64 {
    25
}

fn default_confirm_shutdown_timeout() -> u64 {
    120
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("de", "tvdr", "vdr-dbus")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or create default if not exists
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from `path`, writing the defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "call_timeout_secs must be positive".into(),
            ));
        }

        if self.bus.confirm_shutdown_timeout_secs < self.bus.call_timeout_secs {
            return Err(ConfigError::ValidationError(
                "confirm_shutdown_timeout_secs cannot be shorter than call_timeout_secs".into(),
            ));
        }

        if self.bus.modules.is_empty() {
            return Err(ConfigError::ValidationError(
                "modules must name at least one facility".into(),
            ));
        }
        self.bus.facilities()?;

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level {:?} (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        info!("Config saved to: {}", path.display());
        Ok(())
    }
}

/// Show current configuration
pub fn show(path: &Path) -> anyhow::Result<()> {
    let config = Config::load_from(path)?;

    println!("Config file: {}\n", path.display());
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bus.kind, BusKind::System);
        assert_eq!(config.bus.instance, 0);
        assert_eq!(config.bus.modules, vec!["all"]);
        assert_eq!(config.bus.call_timeout_secs, 25);
        assert_eq!(config.bus.confirm_shutdown_timeout_secs, 120);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_endpoint() {
        let endpoint = BusConfig::default().endpoint();
        assert_eq!(endpoint, Endpoint::new(0));
        assert_eq!(endpoint.service(), "de.tvdr.vdr");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.bus.call_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_confirm_shorter_than_call() {
        let mut config = Config::default();
        config.bus.call_timeout_secs = 60;
        config.bus.confirm_shutdown_timeout_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_module() {
        let mut config = Config::default();
        config.bus.modules = vec!["Timers".into(), "Teletext".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Teletext"));
    }

    #[test]
    fn test_validate_empty_modules() {
        let mut config = Config::default();
        config.bus.modules.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".into();
        assert!(config.validate().is_ok());

        config.logging.level = "loud".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bus.modules, vec!["all"]);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[bus]
kind = "session"
instance = 2
modules = ["Timers", "Remote"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bus.kind, BusKind::Session);
        assert_eq!(config.bus.instance, 2);
        assert_eq!(config.bus.call_timeout_secs, 25);
        assert_eq!(config.bus.endpoint().service(), "de.tvdr.vdr2");
        assert_eq!(
            config.bus.facilities().unwrap(),
            vec![Facility::Timers, Facility::Remote]
        );
    }

    #[test]
    fn test_parse_invalid_bus_kind() {
        let result: Result<Config, _> = toml::from_str("[bus]\nkind = \"starter\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_creates_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.bus.instance, 0);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.bus.modules, config.bus.modules);
    }

    #[test]
    fn test_load_from_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bus]\ncall_timeout_secs = 0\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
