//! The callback-dispatch sequence shared by every plugin on a host.
//!
//! All plugin code (initialization and every callback) runs on one named
//! worker thread, one job at a time, in the order jobs were posted.

use crate::error::{HostError, HostResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce() + Send + 'static>;

const THREAD_NAME: &str = "playhost-dispatch";

/// Cloneable handle to the dispatch thread.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    tx: Mutex<Option<Sender<Job>>>,
    join: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread_id", &self.inner.thread_id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Dispatcher {
    pub fn spawn() -> HostResult<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let join = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                for job in rx {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        tracing::error!(
                            panic = %panic_message(payload.as_ref()),
                            "Plugin callback panicked"
                        );
                    }
                }
                tracing::debug!("Dispatcher drained and stopped");
            })
            .map_err(|source| HostError::Spawn {
                name: THREAD_NAME,
                source,
            })?;

        let thread_id = join.thread().id();
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                tx: Mutex::new(Some(tx)),
                join: Mutex::new(Some(join)),
                thread_id,
            }),
        })
    }

    /// Queue a job. Returns `false` when the dispatcher has shut down.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.inner.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => {
                tracing::debug!("Dispatcher is shut down, dropping job");
                false
            }
        }
    }

    /// Run `job` on the dispatch thread and wait for its result.
    ///
    /// Runs inline when already on the dispatch thread.
    pub fn call<F, T>(&self, job: F) -> HostResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (tx, rx) = mpsc::sync_channel(1);
        if !self.post(move || {
            let _ = tx.send(job());
        }) {
            return Err(HostError::ShutDown);
        }
        rx.recv().map_err(|_| HostError::ShutDown)
    }

    /// Wait until every job posted before this call has run.
    pub fn flush(&self) {
        let _ = self.call(|| ());
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    pub fn is_running(&self) -> bool {
        self.inner.tx.lock().unwrap().is_some()
    }

    /// Stop accepting jobs, let queued jobs finish, and join the thread.
    pub fn shutdown(&self) {
        drop(self.inner.tx.lock().unwrap().take());
        if self.is_current() {
            return;
        }
        if let Some(join) = self.inner.join.lock().unwrap().take() {
            let _ = join.join();
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
