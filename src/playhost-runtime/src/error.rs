use crate::registry::Capability;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the host and its services.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("a command handler is already registered by plugin '{owner}'")]
    AlreadyRegistered { owner: String },
    #[error("service '{0}' is not offered by this host")]
    ServiceUnavailable(Capability),
    #[error("plugin '{plugin}' failed to initialize: {reason}")]
    InitializationFailed { plugin: String, reason: String },
    #[error("command '{key}' produced no result within {after:?}")]
    TimedOut { key: String, after: Duration },
    #[error("no command handler is registered")]
    NoCommandHandler,
    #[error("command '{key}' was dropped before producing a result")]
    CommandAbandoned { key: String },
    #[error("plugin '{0}' is not loaded")]
    PluginNotFound(String),
    #[error("plugin '{0}' is already loaded")]
    AlreadyLoaded(String),
    #[error("plugin '{plugin}' is not running (status: {status})")]
    NotRunning { plugin: String, status: String },
    #[error("plugin context has been released")]
    ContextReleased,
    #[error("host has shut down")]
    ShutDown,
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

impl HostError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;
