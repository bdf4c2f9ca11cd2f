//! Command interception with progress and result reporting.

use crate::context::{PluginContext, ServiceHandle};
use crate::dispatch::Dispatcher;
use crate::error::{HostError, HostResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Handler = Arc<dyn Fn(PluginCommand) + Send + Sync + 'static>;

/// One progress report observed while a command ran.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandProgress {
    pub fraction: f32,
    pub message: String,
}

/// Outcome of a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    pub key: String,
    pub value: String,
    pub progress: Vec<CommandProgress>,
    pub result: String,
}

#[derive(Debug)]
enum CommandEvent {
    Progress(CommandProgress),
    Result(String),
}

/// An inbound command handed to the registered handler.
///
/// Clones share state: once any clone returns a result, every further
/// `report_progress` or `return_result` is ignored and returns `false`.
#[derive(Clone)]
pub struct PluginCommand {
    key: String,
    value: String,
    reply: Arc<Mutex<Option<Sender<CommandEvent>>>>,
}

impl std::fmt::Debug for PluginCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCommand")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl PluginCommand {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `fraction` is clamped into `[0, 1]`; NaN reports as 0.
    pub fn report_progress(&self, fraction: f32, message: impl Into<String>) -> bool {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let guard = self.reply.lock().unwrap();
        let Some(reply) = guard.as_ref() else {
            tracing::warn!(key = %self.key, "Progress reported after command completed");
            return false;
        };
        let _ = reply.send(CommandEvent::Progress(CommandProgress {
            fraction,
            message: message.into(),
        }));
        true
    }

    /// Terminal result; only the first call counts.
    pub fn return_result(&self, result: impl Into<String>) -> bool {
        let Some(reply) = self.reply.lock().unwrap().take() else {
            tracing::warn!(key = %self.key, "Result returned twice for command");
            return false;
        };
        let _ = reply.send(CommandEvent::Result(result.into()));
        true
    }

    pub fn is_completed(&self) -> bool {
        self.reply.lock().unwrap().is_none()
    }
}

struct Registration {
    id: u64,
    owner: String,
    handler: Handler,
}

/// Routes inbound commands to the single registered handler.
pub struct CommandService {
    registration: Mutex<Option<Registration>>,
    next_id: AtomicU64,
    timeout: Duration,
    dispatcher: Dispatcher,
}

impl CommandService {
    pub fn new(dispatcher: Dispatcher, timeout: Duration) -> Self {
        Self {
            registration: Mutex::new(None),
            next_id: AtomicU64::new(1),
            timeout,
            dispatcher,
        }
    }

    /// Register the handler. Fails with `AlreadyRegistered` if one is active.
    pub(crate) fn register<F>(&self, owner: impl Into<String>, handler: F) -> HostResult<u64>
    where
        F: Fn(PluginCommand) + Send + Sync + 'static,
    {
        let owner = owner.into();
        let mut registration = self.registration.lock().unwrap();
        if let Some(existing) = registration.as_ref() {
            return Err(HostError::AlreadyRegistered {
                owner: existing.owner.clone(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::info!(%owner, "Command handler registered");
        *registration = Some(Registration {
            id,
            owner,
            handler: Arc::new(handler),
        });
        Ok(id)
    }

    /// Release a registration; ignored if it was already replaced.
    pub(crate) fn unregister(&self, id: u64) -> bool {
        let mut registration = self.registration.lock().unwrap();
        if registration.as_ref().is_some_and(|existing| existing.id == id) {
            *registration = None;
            return true;
        }
        false
    }

    pub fn handler_owner(&self) -> Option<String> {
        self.registration
            .lock()
            .unwrap()
            .as_ref()
            .map(|existing| existing.owner.clone())
    }

    pub(crate) fn dispatch(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> HostResult<CommandReport> {
        self.dispatch_with_timeout(key, value, self.timeout)
    }

    /// Hand a command to the handler and block until its terminal result or `timeout`.
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub(crate) fn dispatch_with_timeout(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        timeout: Duration,
    ) -> HostResult<CommandReport> {
        let key = key.into();
        let value = value.into();
        if self.dispatcher.is_current() {
            return Err(HostError::invalid(
                "commands cannot be dispatched from a plugin callback",
            ));
        }
        let handler = self
            .registration
            .lock()
            .unwrap()
            .as_ref()
            .map(|existing| existing.handler.clone())
            .ok_or(HostError::NoCommandHandler)?;

        let (tx, rx) = mpsc::channel();
        let command = PluginCommand {
            key: key.clone(),
            value: value.clone(),
            reply: Arc::new(Mutex::new(Some(tx))),
        };
        tracing::debug!(%key, %value, "Dispatching command");
        handler(command);

        let deadline = Instant::now().checked_add(timeout);
        let mut progress = Vec::new();
        loop {
            let event = match deadline {
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match event {
                Ok(CommandEvent::Progress(report)) => {
                    tracing::debug!(%key, fraction = report.fraction, message = %report.message, "Command progress");
                    progress.push(report);
                }
                Ok(CommandEvent::Result(result)) => {
                    tracing::info!(%key, %result, "Command completed");
                    return Ok(CommandReport {
                        key,
                        value,
                        progress,
                        result,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(%key, ?timeout, "Command timed out");
                    return Err(HostError::TimedOut {
                        key,
                        after: timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(HostError::CommandAbandoned { key });
                }
            }
        }
    }
}

impl ServiceHandle<CommandService> {
    /// Intercept host commands. At most one handler may be active per host.
    pub fn register_callback<F>(&self, handler: F) -> HostResult<()>
    where
        F: Fn(&PluginContext, PluginCommand) + Send + Sync + 'static,
    {
        let ctx = self.context()?;
        let weak = ctx.downgrade();
        let handler = Arc::new(handler);
        let id = self.service().register(ctx.name(), move |command| {
            let handler = handler.clone();
            weak.deliver(move |ctx| handler(ctx, command));
        })?;

        let service = self.service().clone();
        ctx.on_teardown(move || {
            service.unregister(id);
        });
        Ok(())
    }
}
