//! Plugin host runtime for playhost player plugins.
//!
//! This crate provides:
//! - The [`PlayerPlugin`] contract plugins implement
//! - A [`PluginHost`] that loads plugins and delivers their callbacks on a
//!   single dispatch thread
//! - The services plugins obtain through [`PluginContext::service`]: timers,
//!   commands, pushed data values, system information, display layouts and
//!   diagnostics reporting
//!
//! # Usage
//!
//! ```rust,ignore
//! use playhost_runtime::{PluginHost, ReceiveDataService};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let host = PluginHost::new()?;
//! host.load(Arc::new(MyPlugin::default()))?;
//!
//! let data = host.service::<ReceiveDataService>()?;
//! data.set_values(BTreeMap::from([("price".into(), "4.99".into())]));
//! host.flush();
//! ```

pub mod command;
mod context;
pub mod data;
pub mod diagnostics;
mod dispatch;
mod error;
pub mod event_bus;
mod host;
pub mod layout;
mod plugin;
pub mod registry;
pub mod system_info;
pub mod timer;

pub use command::{CommandProgress, CommandReport, CommandService, PluginCommand};
pub use context::{PluginContext, PluginLogEntry, ReportedState, ServiceHandle};
pub use data::{ReceiveDataService, ValuesChanged};
pub use diagnostics::{
    DiagnosticsRecord, DiagnosticsSink, DisplayControlService, DisplayDiagnosticsReport,
    DisplayState, InputType, Measure, MemorySink, NullSink, Orientation, PowerState, SinkError,
    State, SystemDiagnosticsService, SystemDiagnosticsState, TracingSink,
};
pub use dispatch::Dispatcher;
pub use error::{HostError, HostResult};
pub use event_bus::{EventBus, SubscriptionHandle, SubscriptionId};
pub use host::{PluginHost, PluginHostBuilder, PluginStatus, PluginSummary};
pub use layout::{DisplayLayout, DisplayLayoutChanged, DisplayLayoutService, DisplayLayoutView, LayoutKind};
pub use plugin::{PlayerPlugin, PluginDescriptor, PluginLogLevel, Settings};
pub use registry::{Capability, Service, ServiceRegistry, ServiceRegistryBuilder};
pub use system_info::{AppSettingsChanged, SystemInformationService};
pub use timer::{Clock, ManualClock, MonotonicClock, TimerHandle, TimerService};
