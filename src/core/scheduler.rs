//! Cooperative single-thread scheduler: deferred work as data.
//!
//! Nothing in the pipeline blocks; every wait is "run this task N ticks or
//! N seconds from now". Tasks are plain enum values executed by the pump,
//! which keeps the whole pipeline deterministic and testable — no closures
//! captured into timers, no threads.
//!
//! Entries can be cancelled through their token. The registry's deferred
//! stop deliberately never cancels (stop is idempotent and the reactivation
//! path re-issues load/play after it lands).

use std::time::{Duration, Instant};

use log::trace;

/// Work item the pump knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Stop the given source handle (deferred one tick on hot-swap).
    StopSource(usize),
    /// Run one capture validity check.
    CaptureCheck,
}

/// Cancellation token for a scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken(u64);

#[derive(Debug, Clone, Copy)]
enum Due {
    Tick(u64),
    At(Instant),
}

#[derive(Debug)]
struct Entry {
    token: TaskToken,
    due: Due,
    task: Task,
}

/// Tick-and-deadline queue drained once per pump cycle.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
    next_token: u64,
    tick: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick count (number of completed `advance` calls).
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Schedule `task` to run `ticks` pump cycles from now.
    pub fn in_ticks(&mut self, ticks: u64, task: Task) -> TaskToken {
        let due = Due::Tick(self.tick + ticks);
        self.push(due, task)
    }

    /// Schedule `task` to run once `delay` has elapsed past `now`.
    pub fn after(&mut self, delay: Duration, now: Instant, task: Task) -> TaskToken {
        self.push(Due::At(now + delay), task)
    }

    fn push(&mut self, due: Due, task: Task) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token += 1;
        trace!("scheduled {:?} as {:?} ({:?})", task, token, due);
        self.entries.push(Entry { token, due, task });
        token
    }

    /// Remove a scheduled entry. Returns false if it already ran or was
    /// cancelled before.
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.token != token);
        before != self.entries.len()
    }

    /// Advance one tick and drain every entry due by (tick, now), in
    /// schedule order.
    pub fn advance(&mut self, now: Instant) -> Vec<Task> {
        self.tick += 1;
        let tick = self.tick;
        let mut due = Vec::new();
        self.entries.retain(|e| {
            let ready = match e.due {
                Due::Tick(t) => t <= tick,
                Due::At(at) => at <= now,
            };
            if ready {
                due.push(e.task);
            }
            !ready
        });
        if !due.is_empty() {
            trace!("tick {}: {} task(s) due", tick, due.len());
        }
        due
    }
}
