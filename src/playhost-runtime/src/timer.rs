//! One-shot and repeating callbacks on a monotonic or manual clock.

use crate::context::{ServiceHandle, WeakContext};
use crate::error::{HostError, HostResult};
use crate::PluginContext;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const THREAD_NAME: &str = "playhost-timers";

/// Host-side timer callback; receives the scheduled due time of the firing.
type TimerCallback = Arc<dyn Fn(Duration) + Send + Sync + 'static>;

/// Source of "now" for the timer queue, as an offset from the clock's origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Virtual clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, now: Duration) {
        let mut guard = self.now.lock().unwrap();
        if now > *guard {
            *guard = now;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

struct Scheduled {
    due: Duration,
    seq: u64,
    interval: Option<Duration>,
    callback: TimerCallback,
    cancelled: Arc<AtomicBool>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Default)]
struct TimerQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
    stopped: bool,
}

impl TimerQueue {
    fn push(
        &mut self,
        due: Duration,
        interval: Option<Duration>,
        callback: TimerCallback,
        cancelled: Arc<AtomicBool>,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            due,
            seq,
            interval,
            callback,
            cancelled,
        }));
    }

    fn next_due(&mut self) -> Option<Duration> {
        while let Some(Reverse(head)) = self.heap.peek() {
            if head.cancelled.load(Ordering::SeqCst) {
                self.heap.pop();
                continue;
            }
            return Some(head.due);
        }
        None
    }

    /// Pop everything due at `now`, re-arming repeating entries at `due + interval`.
    fn take_due(&mut self, now: Duration) -> Vec<(Duration, TimerCallback)> {
        let mut fired = Vec::new();
        while let Some(due) = self.next_due() {
            if due > now {
                break;
            }
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            fired.push((entry.due, entry.callback.clone()));
            let Some(interval) = entry.interval else {
                continue;
            };
            match entry.due.checked_add(interval) {
                Some(next) => self.push(next, Some(interval), entry.callback, entry.cancelled),
                None => tracing::warn!(due = ?entry.due, ?interval, "Repeating timer ran out of clock range"),
            }
        }
        fired
    }

    fn live(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(entry)| !entry.cancelled.load(Ordering::SeqCst))
            .count()
    }
}

struct TimerShared {
    queue: Mutex<TimerQueue>,
    wake: Condvar,
    clock: Arc<dyn Clock>,
}

/// Timer service offered to plugins.
pub struct TimerService {
    shared: Arc<TimerShared>,
    manual: Option<Arc<ManualClock>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl TimerService {
    /// Real-time timers driven by a dedicated scheduler thread.
    pub fn spawn() -> HostResult<Self> {
        let shared = Arc::new(TimerShared {
            queue: Mutex::new(TimerQueue::default()),
            wake: Condvar::new(),
            clock: Arc::new(MonotonicClock::new()),
        });
        let worker = shared.clone();
        let join = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_scheduler(&worker))
            .map_err(|source| HostError::Spawn {
                name: THREAD_NAME,
                source,
            })?;

        Ok(Self {
            shared,
            manual: None,
            scheduler: Mutex::new(Some(join)),
        })
    }

    /// Timers that only fire when the host advances the clock.
    pub fn manual() -> Self {
        let clock = Arc::new(ManualClock::new());
        Self {
            shared: Arc::new(TimerShared {
                queue: Mutex::new(TimerQueue::default()),
                wake: Condvar::new(),
                clock: clock.clone(),
            }),
            manual: Some(clock),
            scheduler: Mutex::new(None),
        }
    }

    pub fn now(&self) -> Duration {
        self.shared.clock.now()
    }

    /// Schedule `callback` after `delay`, then every `interval` if given.
    ///
    /// Host-side only: the callback runs on the scheduling thread, outside
    /// any plugin's dispatch gate. Setting `cancelled` stops further firings.
    pub(crate) fn schedule(
        &self,
        delay: Duration,
        interval: Option<Duration>,
        callback: TimerCallback,
        cancelled: Arc<AtomicBool>,
    ) -> HostResult<TimerHandle> {
        if delay.is_zero() {
            return Err(HostError::invalid("timer delay must be positive"));
        }
        if interval.is_some_and(|interval| interval.is_zero()) {
            return Err(HostError::invalid("timer interval must be positive"));
        }

        let due = self
            .now()
            .checked_add(delay)
            .ok_or_else(|| HostError::invalid("timer delay is out of range"))?;
        if let Some(interval) = interval {
            if due.checked_add(interval).is_none() {
                return Err(HostError::invalid("timer interval is out of range"));
            }
        }
        {
            let mut queue = self.shared.queue.lock().unwrap();
            if queue.stopped {
                return Err(HostError::ShutDown);
            }
            queue.push(due, interval, callback, cancelled.clone());
        }
        self.shared.wake.notify_all();
        tracing::trace!(?due, ?interval, "Timer scheduled");

        Ok(TimerHandle {
            cancelled,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Move a manual clock forward, firing everything that falls due.
    ///
    /// Returns how many firings happened.
    pub(crate) fn advance(&self, by: Duration) -> HostResult<usize> {
        let clock = self
            .manual
            .as_ref()
            .ok_or_else(|| HostError::invalid("timer service is not on a manual clock"))?;
        let target = clock
            .now()
            .checked_add(by)
            .ok_or_else(|| HostError::invalid("clock advance is out of range"))?;
        clock.set(target);
        let fired = self.shared.queue.lock().unwrap().take_due(target);
        let count = fired.len();
        for (due, callback) in fired {
            callback(due);
        }
        Ok(count)
    }

    /// Number of scheduled entries that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().unwrap().live()
    }

    pub(crate) fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.stopped = true;
            queue.heap.clear();
        }
        self.shared.wake.notify_all();
        if let Some(join) = self.scheduler.lock().unwrap().take() {
            // The last reference can be released from inside a firing.
            if join.thread().id() != thread::current().id() {
                let _ = join.join();
            }
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_scheduler(shared: &TimerShared) {
    let mut queue = shared.queue.lock().unwrap();
    loop {
        if queue.stopped {
            break;
        }
        let now = shared.clock.now();
        let fired = queue.take_due(now);
        if !fired.is_empty() {
            drop(queue);
            for (due, callback) in fired {
                callback(due);
            }
            queue = shared.queue.lock().unwrap();
            continue;
        }
        queue = match queue.next_due() {
            Some(due) => {
                let wait = due.saturating_sub(now);
                shared.wake.wait_timeout(queue, wait).unwrap().0
            }
            None => shared.wake.wait(queue).unwrap(),
        };
    }
    tracing::debug!("Timer scheduler stopped");
}

/// Cancels a scheduled callback.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    shared: std::sync::Weak<TimerShared>,
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl TimerHandle {
    /// Prevent further firings. A firing already running completes.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            if let Some(shared) = self.shared.upgrade() {
                shared.wake.notify_all();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ServiceHandle<TimerService> {
    pub fn request_one_shot_callback<F>(&self, delay: Duration, callback: F) -> HostResult<TimerHandle>
    where
        F: Fn(&PluginContext) + Send + Sync + 'static,
    {
        self.request(delay, None, callback)
    }

    pub fn request_repeating_callback<F>(
        &self,
        interval: Duration,
        callback: F,
    ) -> HostResult<TimerHandle>
    where
        F: Fn(&PluginContext) + Send + Sync + 'static,
    {
        self.request(interval, Some(interval), callback)
    }

    fn request<F>(
        &self,
        delay: Duration,
        interval: Option<Duration>,
        callback: F,
    ) -> HostResult<TimerHandle>
    where
        F: Fn(&PluginContext) + Send + Sync + 'static,
    {
        let ctx = self.context()?;
        let weak: WeakContext = ctx.downgrade();
        let callback = Arc::new(callback);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let deliver: TimerCallback = Arc::new(move |_due| {
            let callback = callback.clone();
            let flag = flag.clone();
            weak.deliver(move |ctx| {
                if !flag.load(Ordering::SeqCst) {
                    callback(ctx);
                }
            });
        });
        let handle = self.service().schedule(delay, interval, deliver, cancelled)?;

        let teardown = handle.clone();
        ctx.on_teardown(move || teardown.cancel());
        tracing::debug!(plugin = %ctx.name(), ?delay, ?interval, "Plugin timer registered");
        Ok(handle)
    }
}
