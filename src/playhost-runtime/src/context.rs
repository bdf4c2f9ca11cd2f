//! The per-plugin context handed to `initialize` and to every callback.

use crate::diagnostics::{with_reporting_plugin, State};
use crate::dispatch::Dispatcher;
use crate::error::{HostError, HostResult};
use crate::event_bus::{EventBus, SubscriptionHandle};
use crate::plugin::PluginLogLevel;
use crate::registry::{Service, ServiceRegistry};
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::SystemTime;

type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// A log line a plugin sent to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginLogEntry {
    pub level: PluginLogLevel,
    pub message: String,
    pub logged_at: SystemTime,
}

/// The health a plugin last reported about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedState {
    pub state: State,
    pub message: String,
}

/// Host-side record of the signals a plugin emits.
#[derive(Debug)]
pub(crate) struct PluginSignals {
    name: String,
    capacity: usize,
    state: Mutex<Option<ReportedState>>,
    logs: Mutex<VecDeque<PluginLogEntry>>,
}

impl PluginSignals {
    pub(crate) fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            state: Mutex::new(None),
            logs: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn log(&self, level: PluginLogLevel, message: String) {
        let plugin = self.name.as_str();
        match level {
            PluginLogLevel::Debug => tracing::debug!(plugin, "{message}"),
            PluginLogLevel::Information => tracing::info!(plugin, "{message}"),
            PluginLogLevel::Warning => tracing::warn!(plugin, "{message}"),
            PluginLogLevel::Error => tracing::error!(plugin, "{message}"),
        }

        let mut logs = self.logs.lock().unwrap();
        if logs.len() == self.capacity {
            logs.pop_front();
        }
        logs.push_back(PluginLogEntry {
            level,
            message,
            logged_at: SystemTime::now(),
        });
    }

    pub(crate) fn set_state(&self, state: State, message: String) {
        tracing::info!(plugin = %self.name, ?state, %message, "Plugin state reported");
        *self.state.lock().unwrap() = Some(ReportedState { state, message });
    }

    pub(crate) fn state(&self) -> Option<ReportedState> {
        self.state.lock().unwrap().clone()
    }

    pub(crate) fn logs(&self) -> Vec<PluginLogEntry> {
        self.logs.lock().unwrap().iter().cloned().collect()
    }
}

/// Gives a plugin access to host services and the log/state back-channel.
///
/// Cheap to clone. Callbacks registered through [`ServiceHandle`]s receive
/// the context as their first argument.
#[derive(Clone)]
pub struct PluginContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    name: String,
    registry: Arc<ServiceRegistry>,
    dispatcher: Dispatcher,
    signals: Arc<PluginSignals>,
    open: AtomicBool,
    teardown: Mutex<Vec<Teardown>>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin", &self.inner.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PluginContext {
    pub(crate) fn new(
        name: impl Into<String>,
        registry: Arc<ServiceRegistry>,
        dispatcher: Dispatcher,
        signals: Arc<PluginSignals>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                registry,
                dispatcher,
                signals,
                open: AtomicBool::new(true),
                teardown: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Look up a host service by its capability.
    pub fn service<T: Service>(&self) -> HostResult<ServiceHandle<T>> {
        let service = self.inner.registry.get::<T>()?;
        Ok(ServiceHandle {
            service,
            ctx: self.downgrade(),
        })
    }

    /// Fire-and-forget log signal to the host.
    pub fn log(&self, level: PluginLogLevel, message: impl Into<String>) {
        self.inner.signals.log(level, message.into());
    }

    /// Fire-and-forget health signal to the host.
    pub fn set_state(&self, state: State, message: impl Into<String>) {
        self.inner.signals.set_state(state, message.into());
    }

    /// `false` once the plugin failed or was unloaded; no callbacks run after that.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Arc::downgrade(&self.inner))
    }

    /// Run `f` when the plugin is torn down. Runs immediately if it already was.
    pub(crate) fn on_teardown<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_open() {
            f();
            return;
        }
        self.inner.teardown.lock().unwrap().push(Box::new(f));
    }

    /// Close the delivery gate and release every registration.
    pub(crate) fn close(&self) {
        if !self.inner.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let teardown: Vec<Teardown> = std::mem::take(&mut *self.inner.teardown.lock().unwrap());
        tracing::debug!(
            plugin = %self.inner.name,
            registrations = teardown.len(),
            "Releasing plugin registrations"
        );
        for release in teardown {
            release();
        }
    }
}

/// Non-owning reference held by registered callbacks.
#[derive(Clone)]
pub(crate) struct WeakContext(Weak<ContextInner>);

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Option<PluginContext> {
        self.0.upgrade().map(|inner| PluginContext { inner })
    }

    /// Queue `f` on the dispatcher; it runs only if the plugin is still open then.
    pub(crate) fn deliver<F>(&self, f: F) -> bool
    where
        F: FnOnce(&PluginContext) + Send + 'static,
    {
        let Some(ctx) = self.upgrade() else {
            return false;
        };
        if !ctx.is_open() {
            return false;
        }
        let weak = self.clone();
        ctx.inner.dispatcher.post(move || {
            if let Some(ctx) = weak.upgrade().filter(PluginContext::is_open) {
                with_reporting_plugin(ctx.name(), || f(&ctx));
            }
        })
    }
}

/// A service as seen by one plugin.
///
/// Dereferences to the service for read-only accessors; registration
/// methods route callbacks through the plugin's dispatch gate. The host's
/// raw scheduling and command primitives are not reachable from here:
///
/// ```compile_fail
/// # use playhost_runtime::{PluginContext, TimerService};
/// # use std::time::Duration;
/// fn bypass(ctx: &PluginContext) {
///     let timers = ctx.service::<TimerService>().unwrap();
///     let _ = timers.schedule(Duration::from_secs(1), None, |_| {});
/// }
/// ```
///
/// ```compile_fail
/// # use playhost_runtime::{CommandService, PluginContext};
/// fn bypass(ctx: &PluginContext) {
///     let commands = ctx.service::<CommandService>().unwrap();
///     let _ = commands.register("me", |_| {});
/// }
/// ```
pub struct ServiceHandle<T> {
    service: Arc<T>,
    ctx: WeakContext,
}

impl<T> Clone for ServiceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<T> Deref for ServiceHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.service
    }
}

impl<T> ServiceHandle<T> {
    pub(crate) fn service(&self) -> &Arc<T> {
        &self.service
    }

    pub(crate) fn context(&self) -> HostResult<PluginContext> {
        self.ctx.upgrade().ok_or(HostError::ContextReleased)
    }

    /// Subscribe a plugin handler to `topic`; deliveries go through the dispatcher.
    pub(crate) fn subscribe<E, F>(
        &self,
        bus: &EventBus<E>,
        topic: &str,
        handler: F,
    ) -> HostResult<SubscriptionHandle>
    where
        E: Clone + Send + 'static,
        F: Fn(&PluginContext, &E) + Send + Sync + 'static,
    {
        let ctx = self.context()?;
        let weak = ctx.downgrade();
        let handler = Arc::new(handler);
        let subscription = bus.subscribe(topic, move |event: &E| {
            let event = event.clone();
            let handler = handler.clone();
            weak.deliver(move |ctx| handler(ctx, &event));
        });

        let release = subscription.clone();
        ctx.on_teardown(move || {
            release.cancel();
        });
        tracing::debug!(plugin = %ctx.name(), topic, "Plugin subscribed");
        Ok(subscription)
    }
}
