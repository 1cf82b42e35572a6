//! Timer abstraction used for throttling.
//!
//! [`VirtualClock`] is a deterministic implementation: time only moves when
//! [`VirtualClock::advance`] is called, and due tasks run in deadline order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Schedule-once timers plus a monotonic clock.
pub trait Scheduler {
    /// Time elapsed since the scheduler's origin.
    fn now(&self) -> Duration;

    /// Runs `task` once, `delay` from now.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId;

    /// Cancels a task. Cancelling a fired or unknown timer does nothing.
    fn cancel(&self, id: TimerId);
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    tasks: BTreeMap<(Duration, TimerId), Box<dyn FnOnce()>>,
}

/// Manually advanced clock for tests and scripted replays.
#[derive(Default)]
pub struct VirtualClock {
    state: RefCell<ClockState>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `by`, running every task that falls due on the way.
    ///
    /// Each task sees [`Scheduler::now`] equal to its own deadline. Tasks
    /// scheduled by a running task are picked up if they are due before
    /// the end of the advance.
    pub fn advance(&self, by: Duration) {
        let target = self.state.borrow().now + by;

        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                let next = state.tasks.keys().next().map(|&(deadline, _)| deadline);
                match next {
                    Some(deadline) if deadline <= target => {
                        state.now = deadline;
                        state.tasks.pop_first()
                    }
                    _ => None,
                }
            };

            match due {
                Some((_, task)) => task(),
                None => break,
            }
        }

        self.state.borrow_mut().now = target;
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }
}

impl Scheduler for VirtualClock {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let deadline = state.now + delay;
        state.tasks.insert((deadline, id), task);
        id
    }

    fn cancel(&self, id: TimerId) {
        self.state
            .borrow_mut()
            .tasks
            .retain(|&(_, task_id), _| task_id != id);
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("VirtualClock")
            .field("now", &state.now)
            .field("pending", &state.tasks.len())
            .finish()
    }
}
