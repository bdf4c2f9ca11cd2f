//! The contract a player plugin implements.

use crate::context::PluginContext;
use crate::error::HostResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plugin settings: declared defaults overridden by persisted configuration.
pub type Settings = BTreeMap<String, String>;

/// Severity of a log signal sent from a plugin to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginLogLevel {
    Debug,
    Information,
    Warning,
    Error,
}

/// Identity and documentation of a loaded plugin. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub documentation: String,
    pub default_settings: Settings,
}

/// A unit of client logic hosted by [`crate::PluginHost`].
///
/// The read-only accessors may be called at any time, including before
/// `initialize`. `check` can run while callbacks are being delivered, so
/// implementations are `Send + Sync`.
pub trait PlayerPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn vendor(&self) -> &str;

    fn version(&self) -> &str;

    fn documentation(&self) -> String;

    fn default_settings(&self) -> Settings {
        Settings::new()
    }

    /// Register with host services. Returning `Ok(false)` or an error marks
    /// the plugin failed; it then receives no callbacks.
    fn initialize(&self, ctx: &PluginContext, settings: &Settings) -> HostResult<bool>;

    /// User- or host-triggered self check; must not disturb ongoing work.
    fn check(&self) -> bool {
        true
    }

    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: self.name().to_string(),
            vendor: self.vendor().to_string(),
            version: self.version().to_string(),
            documentation: self.documentation(),
            default_settings: self.default_settings(),
        }
    }
}
