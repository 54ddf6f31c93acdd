//! Deferred callbacks on a single-threaded event loop.
//!
//! [`Scheduler::schedule`] is the only concurrency primitive the core uses.
//! There are no threads: "asynchronous" means "runs on a later tick of the
//! same loop".

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use crate::common::collections::HashMap;

pub type Task = Box<dyn FnOnce()>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

pub trait Scheduler {
    /// Runs `task` once, no earlier than `delay` from now.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Drops a pending task. Cancelling a task that already ran is a no-op.
    fn cancel(&self, id: TimerId);
}

/// Pending tasks ordered by deadline, then by scheduling order.
///
/// Deadlines are offsets from an arbitrary epoch owned by the caller.
#[derive(Default)]
pub(crate) struct TimerQueue {
    next_id: u64,
    entries: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<u64, Duration>,
}

impl TimerQueue {
    pub(crate) fn push(&mut self, deadline: Duration, task: Task) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    pub(crate) fn cancel(&mut self, TimerId(id): TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.entries.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Removes the earliest task if it is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(Duration, Task)> {
        let (&(deadline, id), _) = self.entries.iter().next()?;
        if deadline > now {
            return None;
        }
        self.deadlines.remove(&id);
        self.entries.remove(&(deadline, id)).map(|task| (deadline, task))
    }

    pub(crate) fn len(&self) -> usize { self.entries.len() }
}

/// A scheduler driven by a fake clock.
///
/// Nothing runs until the owner calls [`ManualScheduler::advance`] or
/// [`ManualScheduler::run_next`], which makes chunk boundaries and
/// stop-while-pending behaviour observable without real time passing.
#[derive(Clone, Default)]
pub struct ManualScheduler(Rc<RefCell<ManualState>>);

#[derive(Default)]
struct ManualState {
    now: Duration,
    queue: TimerQueue,
    scheduled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self { Self::default() }

    pub fn now(&self) -> Duration { self.0.borrow().now }

    /// Total number of `schedule` calls so far.
    pub fn scheduled_count(&self) -> usize { self.0.borrow().scheduled }

    /// Number of tasks still waiting to run.
    pub fn pending(&self) -> usize { self.0.borrow().queue.len() }

    /// Moves the clock forward by `by`, running every task that becomes due,
    /// including ones scheduled by tasks run along the way. Returns how many
    /// tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = 0;
        loop {
            // The borrow must end before the task runs: tasks reschedule.
            let next = {
                let mut state = self.0.borrow_mut();
                let next = state.queue.pop_due(target);
                if let Some((deadline, _)) = &next {
                    state.now = state.now.max(*deadline);
                }
                next
            };
            let Some((_, task)) = next else { break };
            task();
            ran += 1;
        }
        self.0.borrow_mut().now = target;
        ran
    }

    /// Jumps the clock to the earliest pending task and runs only that task.
    pub fn run_next(&self) -> bool {
        let next = {
            let mut state = self.0.borrow_mut();
            let Some(deadline) = state.queue.next_deadline() else {
                return false;
            };
            let now = state.now.max(deadline);
            state.now = now;
            state.queue.pop_due(now)
        };
        match next {
            Some((_, task)) => {
                task();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = self.0.borrow_mut();
        state.scheduled += 1;
        let deadline = state.now + delay;
        let id = state.queue.push(deadline, task);
        trace!(?id, ?deadline, "scheduled task");
        id
    }

    fn cancel(&self, id: TimerId) {
        if self.0.borrow_mut().queue.cancel(id) {
            trace!(?id, "cancelled task");
        }
    }
}
