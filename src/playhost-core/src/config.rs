use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub system: SystemConfig,
    /// Per-plugin configuration keyed by plugin name.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            logging: LoggingConfig::default(),
            host: HostConfig::default(),
            system: SystemConfig::default(),
            plugins: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Runtime knobs for the plugin host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// How long a dispatched command may wait for its terminal result.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Interval for host-initiated health checks. Disabled when unset.
    #[serde(default)]
    pub check_interval_secs: Option<u64>,
    /// Number of plugin log entries retained per plugin.
    #[serde(default = "default_log_history")]
    pub log_history: usize,
    #[serde(default)]
    pub diagnostics_sink: DiagnosticsSinkKind,
    /// Capabilities the host refuses to offer, e.g. `["display-control"]`.
    #[serde(default)]
    pub disabled_services: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            check_interval_secs: None,
            log_history: default_log_history(),
            diagnostics_sink: DiagnosticsSinkKind::default(),
            disabled_services: Vec::new(),
        }
    }
}

impl HostConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn check_interval(&self) -> Option<Duration> {
        self.check_interval_secs.map(Duration::from_secs)
    }
}

/// Where diagnostics reports submitted by plugins end up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticsSinkKind {
    /// Emit each report as a structured log line.
    #[default]
    Log,
    /// Keep reports in memory for later inspection.
    Memory,
    /// Drop reports.
    None,
}

/// Read-only system metadata exposed to plugins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemConfig {
    #[serde(default = "default_system_version")]
    pub version: String,
    #[serde(default = "default_system_type")]
    pub system_type: String,
    #[serde(default)]
    pub app_settings: BTreeMap<String, String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            version: default_system_version(),
            system_type: default_system_type(),
            app_settings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginConfig {
    #[serde(default = "default_plugin_enabled")]
    pub enabled: bool,
    /// Persisted settings; these override the plugin's declared defaults.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: default_plugin_enabled(),
            settings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("host.command_timeout_secs must be greater than zero")]
    ZeroCommandTimeout,
    #[error("host.check_interval_secs must be greater than zero when set")]
    ZeroCheckInterval,
    #[error("host.log_history must be greater than zero")]
    ZeroLogHistory,
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        if self.host.command_timeout_secs == 0 {
            return Err(ValidationError::ZeroCommandTimeout);
        }
        if self.host.check_interval_secs == Some(0) {
            return Err(ValidationError::ZeroCheckInterval);
        }
        if self.host.log_history == 0 {
            return Err(ValidationError::ZeroLogHistory);
        }
        Ok(())
    }

    /// Configured settings for a plugin, empty when the plugin has no section.
    pub fn plugin_settings(&self, name: &str) -> BTreeMap<String, String> {
        self.plugins
            .get(name)
            .map(|plugin| plugin.settings.clone())
            .unwrap_or_default()
    }

    /// Plugins without a section are enabled.
    pub fn plugin_enabled(&self, name: &str) -> bool {
        self.plugins
            .get(name)
            .map(|plugin| plugin.enabled)
            .unwrap_or(true)
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_log_history() -> usize {
    200
}

fn default_system_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_system_type() -> String {
    "player".to_string()
}

fn default_plugin_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.stdout);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.host.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.host.check_interval(), None);
        assert_eq!(config.host.diagnostics_sink, DiagnosticsSinkKind::Log);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn zero_intervals_rejected() {
        let mut config = Config::default();
        config.host.command_timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::ZeroCommandTimeout));

        let mut config = Config::default();
        config.host.check_interval_secs = Some(0);
        assert_eq!(config.validate(), Err(ValidationError::ZeroCheckInterval));
    }

    #[test]
    fn loads_plugin_sections_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
config_version = 1

[host]
command_timeout_secs = 5
check_interval_secs = 60
diagnostics_sink = "memory"
disabled_services = ["display-control"]

[system]
version = "9.1"
system_type = "kiosk"
app_settings = {{ fileCache = "/var/cache/player" }}

[plugins."Diagnostics example"]
settings = {{ intervalSeconds = "15" }}

[plugins.EmptyExample]
enabled = false
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).expect("config should parse");
        assert_eq!(config.host.command_timeout_secs, 5);
        assert_eq!(config.host.check_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.host.diagnostics_sink, DiagnosticsSinkKind::Memory);
        assert_eq!(config.host.disabled_services, vec!["display-control"]);
        assert_eq!(config.system.system_type, "kiosk");
        assert_eq!(
            config.system.app_settings.get("fileCache").map(String::as_str),
            Some("/var/cache/player")
        );
        assert_eq!(
            config
                .plugin_settings("Diagnostics example")
                .get("intervalSeconds")
                .map(String::as_str),
            Some("15")
        );
        assert!(config.plugin_enabled("Diagnostics example"));
        assert!(!config.plugin_enabled("EmptyExample"));
        assert!(config.plugin_enabled("unknown"));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "config_version = \"one\"").unwrap();
        let err = Config::load_from(file.path()).expect_err("should fail to parse");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
