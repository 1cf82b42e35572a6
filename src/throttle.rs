//! Leading + trailing edge throttle on top of a [`Scheduler`].
//!
//! At most one run per interval. With `leading`, a call after a quiet
//! interval runs right away; calls inside the interval collapse into a
//! single trailing run at the end of it. The action takes no arguments and
//! is expected to read whatever state is current when it runs, so the
//! latest call always wins.

use crate::scheduler::{Scheduler, TimerId};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ThrottleState {
    last_run: Option<Duration>,
    pending: Option<TimerId>,
}

pub struct Throttle {
    scheduler: Rc<dyn Scheduler>,
    interval: Duration,
    leading: bool,
    action: Rc<dyn Fn()>,
    state: RefCell<ThrottleState>,
}

impl Throttle {
    pub fn new(
        scheduler: Rc<dyn Scheduler>,
        interval: Duration,
        leading: bool,
        action: Rc<dyn Fn()>,
    ) -> Rc<Self> {
        Rc::new(Self {
            scheduler,
            interval,
            leading,
            action,
            state: RefCell::new(ThrottleState::default()),
        })
    }

    /// Requests a run, either now or at the end of the current interval.
    pub fn call(self: &Rc<Self>) {
        let now = self.scheduler.now();

        let run_now = {
            let mut state = self.state.borrow_mut();
            if state.pending.is_some() {
                return;
            }

            let window_open = state
                .last_run
                .is_none_or(|last| now.saturating_sub(last) >= self.interval);

            if self.leading && window_open {
                state.last_run = Some(now);
                true
            } else {
                let delay = match state.last_run {
                    Some(last) if self.leading => (last + self.interval).saturating_sub(now),
                    _ => self.interval,
                };
                let weak = Rc::downgrade(self);
                let id = self.scheduler.schedule(
                    delay,
                    Box::new(move || {
                        if let Some(throttle) = weak.upgrade() {
                            throttle.run_trailing();
                        }
                    }),
                );
                state.pending = Some(id);
                false
            }
        };

        if run_now {
            (self.action)();
        }
    }

    /// Drops any scheduled trailing run and forgets the last run time.
    pub fn cancel(&self) {
        let pending = {
            let mut state = self.state.borrow_mut();
            state.last_run = None;
            state.pending.take()
        };
        if let Some(id) = pending {
            self.scheduler.cancel(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    fn run_trailing(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.pending = None;
            state.last_run = Some(self.scheduler.now());
        }
        (self.action)();
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("leading", &self.leading)
            .field("state", &self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::VirtualClock;
    use std::cell::Cell;

    const SECOND: Duration = Duration::from_secs(1);

    fn counting(clock: &Rc<VirtualClock>, leading: bool) -> (Rc<Throttle>, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let throttle = Throttle::new(
            clock.clone(),
            SECOND,
            leading,
            Rc::new(move || counter.set(counter.get() + 1)),
        );
        (throttle, runs)
    }

    #[test]
    fn leading_call_runs_immediately() {
        let clock = Rc::new(VirtualClock::new());
        let (throttle, runs) = counting(&clock, true);

        throttle.call();
        assert_eq!(runs.get(), 1);
        assert!(!throttle.is_pending());
    }

    #[test]
    fn burst_collapses_into_one_trailing_run() {
        let clock = Rc::new(VirtualClock::new());
        let (throttle, runs) = counting(&clock, true);

        throttle.call();
        for _ in 0..5 {
            clock.advance(Duration::from_millis(100));
            throttle.call();
        }
        assert_eq!(runs.get(), 1);
        assert!(throttle.is_pending());

        clock.advance(Duration::from_millis(499));
        assert_eq!(runs.get(), 1);
        clock.advance(Duration::from_millis(1));
        assert_eq!(runs.get(), 2);
        assert!(!throttle.is_pending());
    }

    #[test]
    fn continuous_calls_run_once_per_interval() {
        let clock = Rc::new(VirtualClock::new());
        let (throttle, runs) = counting(&clock, true);

        for _ in 0..50 {
            throttle.call();
            clock.advance(Duration::from_millis(100));
        }
        // Five seconds of movement: the leading run plus a trailing run per second.
        assert_eq!(runs.get(), 6);
        assert!(!throttle.is_pending());
    }

    #[test]
    fn without_leading_edge_first_run_waits_a_full_interval() {
        let clock = Rc::new(VirtualClock::new());
        let (throttle, runs) = counting(&clock, false);

        throttle.call();
        assert_eq!(runs.get(), 0);
        clock.advance(Duration::from_millis(999));
        assert_eq!(runs.get(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn cancel_drops_trailing_run() {
        let clock = Rc::new(VirtualClock::new());
        let (throttle, runs) = counting(&clock, true);

        throttle.call();
        throttle.call();
        throttle.cancel();
        clock.advance(SECOND * 2);

        assert_eq!(runs.get(), 1);
        assert_eq!(clock.pending(), 0);

        // Forgetting the last run reopens the window immediately.
        throttle.call();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dropped_throttle_trailing_run_is_a_no_op() {
        let clock = Rc::new(VirtualClock::new());
        let (throttle, runs) = counting(&clock, true);

        throttle.call();
        throttle.call();
        drop(throttle);
        clock.advance(SECOND);

        assert_eq!(runs.get(), 1);
    }
}
