//! Scheduling port.
//!
//! The library never spawns work on its own; it asks a [`Scheduler`] to run
//! it now, after a delay, or periodically. Hosts provide an adapter for
//! their own threading model. [`ThreadScheduler`] runs every task on its own
//! OS thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Result;

/// A one-shot task.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A task run once per period.
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Runs deferred work.
pub trait Scheduler: Send + Sync {
    fn run_now(&self, task: Task) -> Result<TaskHandle>;

    fn run_later(&self, delay: Duration, task: Task) -> Result<TaskHandle>;

    /// Run `task` every `period`, first after one period.
    fn run_repeating(&self, period: Duration, task: RepeatingTask) -> Result<TaskHandle>;
}

// ── Handles ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Signal {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl Signal {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.wake.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Sleep for `timeout` unless cancelled first; returns whether cancelled.
    fn sleep(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            if self.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

/// Cancels or awaits a scheduled task.
pub struct TaskHandle {
    signal: Arc<Signal>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TaskHandle {
    /// Stop the task before its next run. A run in progress finishes.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Wait for the task to finish. Repeating tasks finish once cancelled.
    pub fn join(&self) {
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                log::error!("Scheduled task panicked");
            }
        }
    }
}

// ── ThreadScheduler ──────────────────────────────────────────────────────────

/// Runs each task on a dedicated OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }

    fn spawn(&self, body: impl FnOnce(&Signal) + Send + 'static) -> Result<TaskHandle> {
        let signal = Arc::new(Signal::default());
        let thread_signal = Arc::clone(&signal);
        let thread = std::thread::Builder::new()
            .name("claimward-task".into())
            .spawn(move || body(&thread_signal))?;
        Ok(TaskHandle {
            signal,
            thread: Mutex::new(Some(thread)),
        })
    }
}

impl Scheduler for ThreadScheduler {
    fn run_now(&self, task: Task) -> Result<TaskHandle> {
        self.spawn(move |signal| {
            if !signal.is_cancelled() {
                task();
            }
        })
    }

    fn run_later(&self, delay: Duration, task: Task) -> Result<TaskHandle> {
        self.spawn(move |signal| {
            if !signal.sleep(delay) {
                task();
            }
        })
    }

    fn run_repeating(&self, period: Duration, mut task: RepeatingTask) -> Result<TaskHandle> {
        self.spawn(move |signal| {
            while !signal.sleep(period) {
                task();
            }
        })
    }
}
