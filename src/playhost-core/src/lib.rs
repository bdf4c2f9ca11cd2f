pub mod config;
pub mod logging;
pub mod paths;

pub use config::{
    Config, ConfigError, DiagnosticsSinkKind, HostConfig, LogLevel, LoggingConfig,
    PluginConfig, SystemConfig, ValidationError,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "playhost";
pub const APP_AUTHOR: &str = "Playhost";
pub const APP_QUALIFIER: &str = "io";
