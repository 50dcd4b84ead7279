//! Logical timer queue.
//!
//! The engine is single-threaded and event-driven; the only asynchrony is
//! deferred callbacks on this queue. Time is a logical tick counter advanced
//! explicitly by the host (or by tests), which makes every timing contract in
//! the crate deterministic.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to the scheduler.
pub type SharedScheduler = Rc<RefCell<Scheduler>>;

/// Handle to a pending timer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    deadline: u64,
    callback: Box<dyn FnOnce()>,
}

/// Deferred-callback queue over a logical clock.
///
/// Callbacks run during [`Scheduler::advance`], in (deadline, scheduling
/// order). The scheduler borrow is released around each callback, so
/// callbacks may schedule and cancel timers re-entrantly.
#[derive(Default)]
pub struct Scheduler {
    now: u64,
    next_id: u64,
    timers: Vec<Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedScheduler {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Current logical time in ticks.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Run `callback` once `delay` ticks have elapsed.
    pub fn schedule(&mut self, delay: u64, callback: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            deadline: self.now.saturating_add(delay),
            callback: Box::new(callback),
        });
        id
    }

    /// Cancel a pending timer. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Advance the clock by `ticks`, running every callback that comes due.
    ///
    /// The clock moves to each timer's deadline before its callback runs, so
    /// a callback scheduling a relative timer sees the fire time as "now".
    /// `advance(0)` runs everything already due.
    pub fn advance(scheduler: &SharedScheduler, ticks: u64) {
        let target = scheduler.borrow().now.saturating_add(ticks);
        loop {
            let callback = {
                let mut sched = scheduler.borrow_mut();
                let due = sched
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.id.0))
                    .map(|(index, _)| index);
                match due {
                    Some(index) => {
                        let timer = sched.timers.swap_remove(index);
                        sched.now = sched.now.max(timer.deadline);
                        Some(timer.callback)
                    }
                    None => {
                        sched.now = target;
                        None
                    }
                }
            };
            match callback {
                Some(callback) => callback(),
                None => break,
            }
        }
    }
}

/// Trailing-edge debounce over the scheduler.
///
/// Each [`Debouncer::poke`] cancels any armed timer and re-arms it `delay`
/// ticks out; the callback runs only after a full quiet period with no
/// further pokes.
#[derive(Debug)]
pub struct Debouncer {
    delay: u64,
    timer: Option<TimerId>,
}

impl Debouncer {
    pub fn new(delay: u64) -> Self {
        Self { delay, timer: None }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Reset the quiet period and (re)arm the callback.
    ///
    /// The callback of a later poke replaces the earlier one. Callbacks
    /// should call [`Debouncer::disarm`] on the owning instance when they
    /// run, since the debouncer cannot observe its own timer firing.
    pub fn poke(&mut self, scheduler: &SharedScheduler, callback: impl FnOnce() + 'static) {
        let mut sched = scheduler.borrow_mut();
        if let Some(timer) = self.timer.take() {
            sched.cancel(timer);
        }
        self.timer = Some(sched.schedule(self.delay, callback));
    }

    /// Forget the armed timer without cancelling it. Called from inside the
    /// fired callback.
    pub fn disarm(&mut self) {
        self.timer = None;
    }

    /// Cancel the armed timer, if any.
    pub fn cancel(&mut self, scheduler: &SharedScheduler) {
        if let Some(timer) = self.timer.take() {
            scheduler.borrow_mut().cancel(timer);
        }
    }
}
