//! The plugin host: loads plugins, owns the services and drives callbacks.

use crate::command::{CommandReport, CommandService};
use crate::context::{PluginContext, PluginLogEntry, PluginSignals, ReportedState};
use crate::data::ReceiveDataService;
use crate::diagnostics::{
    sink_for, with_reporting_plugin, DiagnosticsSink, DisplayControlService,
    SystemDiagnosticsService,
};
use crate::dispatch::{panic_message, Dispatcher};
use crate::error::{HostError, HostResult};
use crate::layout::DisplayLayoutService;
use crate::plugin::{PlayerPlugin, PluginDescriptor, PluginLogLevel, Settings};
use crate::registry::{Capability, Service, ServiceRegistry};
use crate::system_info::SystemInformationService;
use crate::timer::TimerService;
use playhost_core::{Config, HostConfig, SystemConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const MONITOR_THREAD: &str = "playhost-health";

/// Lifecycle of a plugin inside the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Unloaded,
    Initializing,
    Running,
    Checking,
    Failed { reason: String },
}

impl PluginStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, PluginStatus::Running | PluginStatus::Checking)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Unloaded => f.write_str("unloaded"),
            PluginStatus::Initializing => f.write_str("initializing"),
            PluginStatus::Running => f.write_str("running"),
            PluginStatus::Checking => f.write_str("checking"),
            PluginStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Snapshot of one loaded plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSummary {
    pub descriptor: PluginDescriptor,
    pub status: PluginStatus,
    pub reported_state: Option<ReportedState>,
}

pub struct PluginHostBuilder {
    host: HostConfig,
    system: SystemConfig,
    plugin_settings: BTreeMap<String, Settings>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    manual_clock: bool,
}

impl Default for PluginHostBuilder {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            system: SystemConfig::default(),
            plugin_settings: BTreeMap::new(),
            sink: None,
            manual_clock: false,
        }
    }
}

impl PluginHostBuilder {
    /// Take host, system and per-plugin settings from a loaded config file.
    pub fn from_config(config: &Config) -> Self {
        let plugin_settings = config
            .plugins
            .iter()
            .map(|(name, plugin)| (name.clone(), plugin.settings.clone()))
            .collect();
        Self {
            host: config.host.clone(),
            system: config.system.clone(),
            plugin_settings,
            ..Self::default()
        }
    }

    pub fn host_config(mut self, host: HostConfig) -> Self {
        self.host = host;
        self
    }

    pub fn system_config(mut self, system: SystemConfig) -> Self {
        self.system = system;
        self
    }

    /// Persisted settings for `plugin`; these override its declared defaults.
    pub fn plugin_settings(mut self, plugin: impl Into<String>, settings: Settings) -> Self {
        self.plugin_settings.insert(plugin.into(), settings);
        self
    }

    /// Use `sink` instead of the one named by `host.diagnostics_sink`.
    pub fn diagnostics_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Drive timers from a manual clock advanced with [`PluginHost::advance_clock`].
    pub fn manual_clock(mut self) -> Self {
        self.manual_clock = true;
        self
    }

    pub fn build(self) -> HostResult<PluginHost> {
        let dispatcher = Dispatcher::spawn()?;
        let timers = if self.manual_clock {
            TimerService::manual()
        } else {
            TimerService::spawn()?
        };
        let sink = self
            .sink
            .unwrap_or_else(|| sink_for(self.host.diagnostics_sink));

        let mut registry = ServiceRegistry::builder()
            .timers(timers)
            .commands(CommandService::new(
                dispatcher.clone(),
                self.host.command_timeout(),
            ))
            .data(ReceiveDataService::new())
            .system(SystemInformationService::from_config(&self.system))
            .layout(DisplayLayoutService::new())
            .display_control(DisplayControlService::new(sink.clone()))
            .system_diagnostics(SystemDiagnosticsService::new(sink));
        for name in &self.host.disabled_services {
            match name.parse::<Capability>() {
                Ok(capability) => registry = registry.without(capability),
                Err(err) => tracing::warn!(service = %name, error = %err, "Ignoring unknown disabled service"),
            }
        }
        let registry = Arc::new(registry.build());
        tracing::info!(capabilities = ?registry.capabilities(), "Plugin host started");

        let inner = Arc::new(HostInner {
            log_history: self.host.log_history,
            registry,
            dispatcher,
            configured: self.plugin_settings,
            plugins: Mutex::new(BTreeMap::new()),
            monitor: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });
        if let Some(interval) = self.host.check_interval() {
            let monitor = Monitor::spawn(Arc::downgrade(&inner), interval)?;
            *inner.monitor.lock().unwrap() = Some(monitor);
        }
        Ok(PluginHost { inner })
    }
}

struct LoadedPlugin {
    plugin: Arc<dyn PlayerPlugin>,
    descriptor: PluginDescriptor,
    ctx: PluginContext,
    signals: Arc<PluginSignals>,
    status: Mutex<PluginStatus>,
    check_lock: Mutex<()>,
}

impl LoadedPlugin {
    fn status(&self) -> PluginStatus {
        self.status.lock().unwrap().clone()
    }

    fn fail(&self, reason: String) {
        tracing::error!(plugin = %self.descriptor.name, %reason, "Plugin failed");
        *self.status.lock().unwrap() = PluginStatus::Failed { reason };
        self.ctx.close();
    }
}

struct Monitor {
    stop: Sender<()>,
    join: JoinHandle<()>,
}

impl Monitor {
    fn spawn(host: Weak<HostInner>, interval: Duration) -> HostResult<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name(MONITOR_THREAD.to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(host) = host.upgrade() else { break };
                        for (name, result) in host.check_all() {
                            if let Err(err) = result {
                                tracing::debug!(plugin = %name, error = %err, "Skipped health check");
                            }
                        }
                    }
                    _ => break,
                }
            })
            .map_err(|source| HostError::Spawn {
                name: MONITOR_THREAD,
                source,
            })?;
        Ok(Self { stop, join })
    }

    fn stop(self) {
        drop(self.stop);
        if self.join.thread().id() != thread::current().id() {
            let _ = self.join.join();
        }
    }
}

struct HostInner {
    log_history: usize,
    registry: Arc<ServiceRegistry>,
    dispatcher: Dispatcher,
    configured: BTreeMap<String, Settings>,
    plugins: Mutex<BTreeMap<String, Arc<LoadedPlugin>>>,
    monitor: Mutex<Option<Monitor>>,
    shut_down: AtomicBool,
}

impl HostInner {
    fn plugin(&self, name: &str) -> HostResult<Arc<LoadedPlugin>> {
        self.plugins
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::PluginNotFound(name.to_string()))
    }

    fn check(&self, name: &str) -> HostResult<bool> {
        let loaded = self.plugin(name)?;
        let _exclusive = loaded.check_lock.lock().unwrap();
        {
            let mut status = loaded.status.lock().unwrap();
            if !status.is_running() {
                return Err(HostError::NotRunning {
                    plugin: name.to_string(),
                    status: status.to_string(),
                });
            }
            *status = PluginStatus::Checking;
        }

        let plugin = loaded.plugin.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            with_reporting_plugin(name, || plugin.check())
        }));
        match outcome {
            Ok(healthy) => {
                let mut status = loaded.status.lock().unwrap();
                if *status == PluginStatus::Checking {
                    *status = PluginStatus::Running;
                }
                drop(status);
                if !healthy {
                    loaded
                        .signals
                        .log(PluginLogLevel::Warning, "Health check failed".to_string());
                }
                Ok(healthy)
            }
            Err(payload) => {
                loaded.fail(format!("check panicked: {}", panic_message(payload.as_ref())));
                Ok(false)
            }
        }
    }

    fn check_all(&self) -> Vec<(String, HostResult<bool>)> {
        let names: Vec<String> = self.plugins.lock().unwrap().keys().cloned().collect();
        names
            .into_iter()
            .map(|name| {
                let result = self.check(&name);
                (name, result)
            })
            .collect()
    }
}

/// Hosts player plugins and the services they use.
///
/// All plugin code runs on a single dispatch thread, except
/// [`PluginHost::check`], which runs on the caller's thread. Dropping the
/// host shuts it down.
pub struct PluginHost {
    inner: Arc<HostInner>,
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugins", &self.inner.plugins.lock().unwrap().keys().collect::<Vec<_>>())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl PluginHost {
    pub fn builder() -> PluginHostBuilder {
        PluginHostBuilder::default()
    }

    /// A real-time host with default configuration.
    pub fn new() -> HostResult<Self> {
        Self::builder().build()
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.inner.registry
    }

    /// Host-side access to a service, e.g. to push data values.
    pub fn service<T: Service>(&self) -> HostResult<Arc<T>> {
        self.inner.registry.get::<T>()
    }

    pub fn load(&self, plugin: Arc<dyn PlayerPlugin>) -> HostResult<()> {
        self.load_with_settings(plugin, Settings::new())
    }

    /// Initialize `plugin` with its defaults, overridden by configured
    /// settings, then by `overrides`.
    pub fn load_with_settings(
        &self,
        plugin: Arc<dyn PlayerPlugin>,
        overrides: Settings,
    ) -> HostResult<()> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(HostError::ShutDown);
        }
        let descriptor = plugin.descriptor();
        let name = descriptor.name.clone();

        let mut settings = descriptor.default_settings.clone();
        if let Some(configured) = self.inner.configured.get(&name) {
            settings.extend(configured.clone());
        }
        settings.extend(overrides);

        let signals = Arc::new(PluginSignals::new(&name, self.inner.log_history));
        let ctx = PluginContext::new(
            &name,
            self.inner.registry.clone(),
            self.inner.dispatcher.clone(),
            signals.clone(),
        );
        let loaded = Arc::new(LoadedPlugin {
            plugin: plugin.clone(),
            descriptor,
            ctx: ctx.clone(),
            signals,
            status: Mutex::new(PluginStatus::Initializing),
            check_lock: Mutex::new(()),
        });
        {
            let mut plugins = self.inner.plugins.lock().unwrap();
            if plugins.contains_key(&name) {
                return Err(HostError::AlreadyLoaded(name));
            }
            plugins.insert(name.clone(), loaded.clone());
        }
        tracing::info!(plugin = %name, vendor = %loaded.descriptor.vendor, version = %loaded.descriptor.version, "Loading plugin");

        let job_name = name.clone();
        let outcome = self.inner.dispatcher.call(move || {
            panic::catch_unwind(AssertUnwindSafe(|| {
                with_reporting_plugin(&job_name, || plugin.initialize(&ctx, &settings))
            }))
        });

        let reason = match outcome {
            Ok(Ok(Ok(true))) => {
                let mut status = loaded.status.lock().unwrap();
                if *status == PluginStatus::Initializing {
                    *status = PluginStatus::Running;
                }
                tracing::info!(plugin = %name, "Plugin running");
                return Ok(());
            }
            Ok(Ok(Ok(false))) => "initialize returned false".to_string(),
            Ok(Ok(Err(err))) => err.to_string(),
            Ok(Err(payload)) => format!("initialize panicked: {}", panic_message(payload.as_ref())),
            Err(err) => {
                loaded.ctx.close();
                self.inner.plugins.lock().unwrap().remove(&name);
                return Err(err);
            }
        };
        loaded.fail(reason.clone());
        Err(HostError::InitializationFailed {
            plugin: name,
            reason,
        })
    }

    /// Stop deliveries, release every registration and forget the plugin.
    pub fn unload(&self, name: &str) -> HostResult<()> {
        let loaded = self
            .inner
            .plugins
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| HostError::PluginNotFound(name.to_string()))?;
        loaded.ctx.close();
        *loaded.status.lock().unwrap() = PluginStatus::Unloaded;
        tracing::info!(plugin = %name, "Plugin unloaded");
        Ok(())
    }

    /// Run the plugin's self check on this thread.
    ///
    /// `Ok(false)` means the plugin reported itself unhealthy; it keeps running.
    pub fn check(&self, name: &str) -> HostResult<bool> {
        self.inner.check(name)
    }

    pub fn check_all(&self) -> Vec<(String, HostResult<bool>)> {
        self.inner.check_all()
    }

    pub fn status(&self, name: &str) -> PluginStatus {
        self.inner
            .plugin(name)
            .map(|loaded| loaded.status())
            .unwrap_or(PluginStatus::Unloaded)
    }

    pub fn reported_state(&self, name: &str) -> HostResult<Option<ReportedState>> {
        Ok(self.inner.plugin(name)?.signals.state())
    }

    /// Most recent log entries, oldest first.
    pub fn recent_logs(&self, name: &str) -> HostResult<Vec<PluginLogEntry>> {
        Ok(self.inner.plugin(name)?.signals.logs())
    }

    pub fn plugins(&self) -> Vec<PluginSummary> {
        let plugins: Vec<Arc<LoadedPlugin>> =
            self.inner.plugins.lock().unwrap().values().cloned().collect();
        plugins
            .into_iter()
            .map(|loaded| PluginSummary {
                descriptor: loaded.descriptor.clone(),
                status: loaded.status(),
                reported_state: loaded.signals.state(),
            })
            .collect()
    }

    /// Send a command to the registered handler and wait for its result,
    /// up to `host.command_timeout_secs`.
    pub fn dispatch_command(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> HostResult<CommandReport> {
        self.inner.registry.get::<CommandService>()?.dispatch(key, value)
    }

    pub fn dispatch_command_with_timeout(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        timeout: Duration,
    ) -> HostResult<CommandReport> {
        self.inner
            .registry
            .get::<CommandService>()?
            .dispatch_with_timeout(key, value, timeout)
    }

    /// Wait until every callback queued so far has been delivered.
    pub fn flush(&self) {
        self.inner.dispatcher.flush();
    }

    /// Advance a manual clock, fire due timers and wait for their callbacks.
    pub fn advance_clock(&self, by: Duration) -> HostResult<usize> {
        let fired = self.inner.registry.get::<TimerService>()?.advance(by)?;
        self.flush();
        Ok(fired)
    }

    /// Unload every plugin and stop the host's threads. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(monitor) = self.inner.monitor.lock().unwrap().take() {
            monitor.stop();
        }
        let names: Vec<String> = self.inner.plugins.lock().unwrap().keys().cloned().collect();
        for name in names {
            let _ = self.unload(&name);
        }
        self.inner.registry.shutdown();
        self.inner.dispatcher.shutdown();
        tracing::info!("Plugin host stopped");
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::State;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    struct FnPlugin {
        name: &'static str,
        init: fn(&PluginContext, &Settings) -> HostResult<bool>,
        healthy: AtomicBool,
        checks: AtomicUsize,
    }

    impl FnPlugin {
        fn new(name: &'static str, init: fn(&PluginContext, &Settings) -> HostResult<bool>) -> Arc<Self> {
            Arc::new(Self {
                name,
                init,
                healthy: AtomicBool::new(true),
                checks: AtomicUsize::new(0),
            })
        }
    }

    impl PlayerPlugin for FnPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn vendor(&self) -> &str {
            "Tests"
        }

        fn version(&self) -> &str {
            "0.1"
        }

        fn documentation(&self) -> String {
            "test plugin".into()
        }

        fn default_settings(&self) -> Settings {
            Settings::from([
                ("a".to_string(), "default".to_string()),
                ("b".to_string(), "default".to_string()),
            ])
        }

        fn initialize(&self, ctx: &PluginContext, settings: &Settings) -> HostResult<bool> {
            (self.init)(ctx, settings)
        }

        fn check(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.healthy.load(Ordering::SeqCst)
        }
    }

    /// Sleeps inside `check` and counts timer ticks meanwhile.
    #[derive(Default)]
    struct SlowCheck {
        in_check: AtomicUsize,
        overlapped: AtomicBool,
        ticks: Arc<AtomicUsize>,
        ticks_during_check: AtomicUsize,
    }

    impl PlayerPlugin for SlowCheck {
        fn name(&self) -> &str {
            "slow-check"
        }

        fn vendor(&self) -> &str {
            "Tests"
        }

        fn version(&self) -> &str {
            "0.1"
        }

        fn documentation(&self) -> String {
            String::new()
        }

        fn initialize(&self, ctx: &PluginContext, _settings: &Settings) -> HostResult<bool> {
            let ticks = self.ticks.clone();
            ctx.service::<TimerService>()?
                .request_repeating_callback(Duration::from_millis(5), move |_| {
                    ticks.fetch_add(1, Ordering::SeqCst);
                })?;
            Ok(true)
        }

        fn check(&self) -> bool {
            if self.in_check.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            let before = self.ticks.load(Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            let during = self.ticks.load(Ordering::SeqCst) - before;
            self.ticks_during_check.fetch_max(during, Ordering::SeqCst);
            self.in_check.fetch_sub(1, Ordering::SeqCst);
            true
        }
    }

    fn host() -> PluginHost {
        PluginHost::builder().manual_clock().build().unwrap()
    }

    #[test]
    fn load_runs_initialize_on_dispatcher() {
        let host = host();
        host.load(FnPlugin::new("ok", |ctx, _| {
            ctx.set_state(State::Ok, "Up and running");
            Ok(true)
        }))
        .unwrap();
        assert_eq!(host.status("ok"), PluginStatus::Running);
        assert_eq!(host.reported_state("ok").unwrap().unwrap().message, "Up and running");
    }

    #[test]
    fn settings_layer_defaults_config_then_overrides() {
        let host = PluginHost::builder()
            .manual_clock()
            .plugin_settings("layers", Settings::from([("a".into(), "config".into()), ("b".into(), "config".into())]))
            .build()
            .unwrap();
        host.load_with_settings(
            FnPlugin::new("layers", |ctx, settings| {
                ctx.log(
                    PluginLogLevel::Debug,
                    format!("{}/{}", settings["a"], settings["b"]),
                );
                Ok(true)
            }),
            Settings::from([("b".into(), "override".into())]),
        )
        .unwrap();
        let logs = host.recent_logs("layers").unwrap();
        assert_eq!(logs[0].message, "config/override");
    }

    #[test]
    fn failed_initialize_marks_plugin_failed() {
        let host = host();
        let err = host
            .load(FnPlugin::new("declines", |_, _| Ok(false)))
            .unwrap_err();
        assert!(matches!(err, HostError::InitializationFailed { ref plugin, .. } if plugin == "declines"));
        assert!(matches!(host.status("declines"), PluginStatus::Failed { .. }));

        let err = host
            .load(FnPlugin::new("panics", |_, _| panic!("bad settings")))
            .unwrap_err();
        assert!(err.to_string().contains("bad settings"));
        assert!(matches!(host.check("panics"), Err(HostError::NotRunning { .. })));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let host = host();
        host.load(FnPlugin::new("twice", |_, _| Ok(true))).unwrap();
        assert!(matches!(
            host.load(FnPlugin::new("twice", |_, _| Ok(true))),
            Err(HostError::AlreadyLoaded(_))
        ));
    }

    #[test]
    fn unhealthy_check_keeps_plugin_running() {
        let host = host();
        let plugin = FnPlugin::new("sick", |_, _| Ok(true));
        host.load(plugin.clone()).unwrap();
        plugin.healthy.store(false, Ordering::SeqCst);

        assert!(!host.check("sick").unwrap());
        assert_eq!(host.status("sick"), PluginStatus::Running);
        let logs = host.recent_logs("sick").unwrap();
        assert_eq!(logs.last().map(|e| e.level), Some(PluginLogLevel::Warning));
        assert_eq!(plugin.checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_checks_are_serialized_while_timers_keep_firing() {
        let host = PluginHost::new().unwrap();
        let plugin = Arc::new(SlowCheck::default());
        host.load(plugin.clone()).unwrap();

        let start = Barrier::new(2);
        let results: Vec<HostResult<bool>> = thread::scope(|scope| {
            let callers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        start.wait();
                        host.check("slow-check")
                    })
                })
                .collect();
            callers
                .into_iter()
                .map(|caller| caller.join().unwrap())
                .collect()
        });

        assert!(results.iter().all(|result| matches!(result, Ok(true))));
        assert!(!plugin.overlapped.load(Ordering::SeqCst));
        assert!(plugin.ticks_during_check.load(Ordering::SeqCst) > 0);
        assert_eq!(host.status("slow-check"), PluginStatus::Running);
        host.shutdown();
    }

    #[test]
    fn unload_stops_timer_callbacks() {
        let host = host();
        host.load(FnPlugin::new("ticker", |ctx, _| {
            let timers = ctx.service::<TimerService>()?;
            timers.request_repeating_callback(Duration::from_secs(1), |ctx| {
                ctx.log(PluginLogLevel::Information, "tick");
            })?;
            Ok(true)
        }))
        .unwrap();

        host.advance_clock(Duration::from_secs(2)).unwrap();
        assert_eq!(host.recent_logs("ticker").unwrap().len(), 2);

        host.unload("ticker").unwrap();
        assert_eq!(host.status("ticker"), PluginStatus::Unloaded);
        assert_eq!(host.service::<TimerService>().unwrap().pending(), 0);
        assert!(matches!(host.recent_logs("ticker"), Err(HostError::PluginNotFound(_))));
    }

    #[test]
    fn disabled_services_are_not_offered() {
        let host = PluginHost::builder()
            .manual_clock()
            .host_config(HostConfig {
                disabled_services: vec!["display-control".into(), "bogus".into()],
                ..HostConfig::default()
            })
            .build()
            .unwrap();
        assert!(!host.services().supports(Capability::DisplayControl));
        assert!(host.services().supports(Capability::Timer));
    }

    #[test]
    fn shutdown_rejects_further_loads() {
        let host = host();
        host.load(FnPlugin::new("a", |_, _| Ok(true))).unwrap();
        host.shutdown();
        assert!(host.plugins().is_empty());
        assert!(matches!(
            host.load(FnPlugin::new("b", |_, _| Ok(true))),
            Err(HostError::ShutDown)
        ));
    }
}
