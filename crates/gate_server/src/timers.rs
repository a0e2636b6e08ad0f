//! Per-connection timers.
//!
//! Each timer is a small tokio task that delivers a [`TimerFired`] event on
//! the registry's channel. The owning session reads that channel in its
//! select loop, so timer callbacks run on the session's own task and never
//! race its packet handling.
//!
//! Two kinds exist: periodic timers (first fire one period after start,
//! then every period until stopped) and delay timers (fire once, may be
//! stopped before firing or reset to restart the countdown). Stopping is
//! idempotent, and an event already queued from a timer that has since been
//! stopped is filtered out by [`TimerRegistry::accept`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

pub type TimerId = u64;

/// Delivered when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired<T> {
    pub id: TimerId,
    pub payload: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Periodic,
    Delay,
}

#[derive(Debug, Default)]
struct TimerShared {
    stopped: AtomicBool,
    reset: Notify,
}

/// Handle to one running timer.
#[derive(Debug)]
pub struct TimerHandle {
    kind: TimerKind,
    shared: Arc<TimerShared>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Stops the timer; a stopped timer never fires again.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.task.abort();
    }

    /// Restarts the countdown from now.
    pub fn reset(&self) {
        if !self.is_stopped() {
            self.shared.reset.notify_one();
        }
    }
}

/// All timers owned by one connection.
#[derive(Debug)]
pub struct TimerRegistry<T> {
    sender: UnboundedSender<TimerFired<T>>,
    timers: HashMap<TimerId, TimerHandle>,
    next_id: TimerId,
}

impl<T> TimerRegistry<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an empty registry and the receiver its timers fire into.
    pub fn new() -> (Self, UnboundedReceiver<TimerFired<T>>) {
        let (sender, receiver) = unbounded_channel();
        let registry = Self {
            sender,
            timers: HashMap::new(),
            next_id: 1,
        };
        (registry, receiver)
    }

    fn allocate_id(&mut self) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Starts a timer that fires every `period`, the first time one period from now.
    pub fn add_periodic(&mut self, period: Duration, payload: T) -> TimerId {
        let id = self.allocate_id();
        let shared = Arc::new(TimerShared::default());
        let sender = self.sender.clone();
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if task_shared.stopped.load(Ordering::Acquire) {
                            break;
                        }
                        let fired = TimerFired { id, payload: payload.clone() };
                        if sender.send(fired).is_err() {
                            break;
                        }
                    }
                    _ = task_shared.reset.notified() => ticker.reset(),
                }
            }
        });

        trace!("Timer {} started (periodic, {:?})", id, period);
        self.timers.insert(
            id,
            TimerHandle {
                kind: TimerKind::Periodic,
                shared,
                task,
            },
        );
        id
    }

    /// Starts a timer that fires once after `delay`.
    pub fn add_delay(&mut self, delay: Duration, payload: T) -> TimerId {
        let id = self.allocate_id();
        let shared = Arc::new(TimerShared::default());
        let sender = self.sender.clone();
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        if !task_shared.stopped.load(Ordering::Acquire) {
                            let _ = sender.send(TimerFired { id, payload: payload.clone() });
                        }
                        break;
                    }
                    _ = task_shared.reset.notified() => continue,
                }
            }
        });

        trace!("Timer {} started (delay, {:?})", id, delay);
        self.timers.insert(
            id,
            TimerHandle {
                kind: TimerKind::Delay,
                shared,
                task,
            },
        );
        id
    }

    /// Stops and forgets a timer. Unknown or already stopped ids are a no-op.
    pub fn stop(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Restarts a timer's countdown. Returns false if it is no longer running.
    pub fn reset(&mut self, id: TimerId) -> bool {
        match self.timers.get(&id) {
            Some(handle) if !handle.is_stopped() => {
                handle.reset();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers
            .get(&id)
            .is_some_and(|handle| !handle.is_stopped())
    }

    /// Checks a received event against the registry.
    ///
    /// Returns false for events from timers stopped after the event was
    /// queued. A fired delay timer is forgotten here.
    pub fn accept(&mut self, fired: &TimerFired<T>) -> bool {
        let Some(handle) = self.timers.get(&fired.id) else {
            return false;
        };
        if handle.is_stopped() {
            return false;
        }
        if handle.kind == TimerKind::Delay {
            self.timers.remove(&fired.id);
        }
        true
    }

    /// Stops every tracked timer and empties the registry.
    pub fn stop_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, handle) in self.timers.drain() {
            handle.stop();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl<T> Drop for TimerRegistry<T> {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.stop();
        }
    }
}
