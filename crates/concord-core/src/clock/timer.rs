//! The timer injection boundary.
//!
//! The core never performs I/O; timed callbacks go through the [`Timer`]
//! trait so the host decides how wall time is driven — an event loop, an
//! async runtime, or the deterministic [`ManualTimer`] used by tests,
//! benches, and simulations.

use std::cell::RefCell;
use std::rc::Rc;

/// Callback invoked when a scheduled timer fires.
pub type TimerCallback = Box<dyn FnOnce()>;

/// Scheduling primitive injected into [`WarpClock`](super::warp::WarpClock).
///
/// Delays are wall-time milliseconds. An implementation may fire late but
/// never early, must not fire a cancelled handle, and must treat cancelling
/// an already-fired handle as a no-op.
pub trait Timer {
    /// Opaque handle used to cancel a scheduled callback.
    type Handle: 'static;

    /// Schedule `callback` to run after `delay` wall-time milliseconds.
    /// A non-finite delay never fires until rescheduled.
    fn schedule(&mut self, delay: f64, callback: TimerCallback) -> Self::Handle;

    /// Cancel a previously scheduled callback.
    fn cancel(&mut self, handle: Self::Handle);
}

// ===========================================================================
// ManualTimer
// ===========================================================================

/// A deterministic, manually-driven timer.
///
/// Holds its own wall-clock reading, advanced explicitly with
/// [`advance`](Self::advance). Clones share the same underlying queue, so a
/// clone can be handed to a clock while the test keeps driving time.
#[derive(Clone, Default)]
pub struct ManualTimer {
    inner: Rc<RefCell<ManualTimerInner>>,
}

#[derive(Default)]
struct ManualTimerInner {
    now: f64,
    next_id: u64,
    pending: Vec<Scheduled>,
}

struct Scheduled {
    id: u64,
    deadline: f64,
    callback: TimerCallback,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wall-clock reading of this timer.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.inner.borrow().now
    }

    /// A wall-time source reading this timer's clock, suitable for
    /// constructing a [`WarpClock`](super::warp::WarpClock) against it.
    #[must_use]
    pub fn wall_source(&self) -> impl Fn() -> f64 + 'static {
        let inner = Rc::clone(&self.inner);
        move || inner.borrow().now
    }

    /// Number of callbacks still scheduled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Advance wall time by `by` milliseconds, firing every due callback in
    /// deadline order. Callbacks scheduled *while* firing are themselves
    /// fired if they fall due within the same advance.
    pub fn advance(&self, by: f64) {
        let target = self.inner.borrow().now + by;
        loop {
            // Pop the earliest due entry with the queue borrow released
            // before invoking it, so callbacks may reschedule.
            let due = {
                let mut inner = self.inner.borrow_mut();
                let next = inner
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.deadline <= target)
                    .min_by(|(_, a), (_, b)| {
                        a.deadline.total_cmp(&b.deadline).then(a.id.cmp(&b.id))
                    })
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let entry = inner.pending.remove(index);
                        inner.now = inner.now.max(entry.deadline);
                        Some(entry.callback)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
    }
}

impl Timer for ManualTimer {
    type Handle = u64;

    fn schedule(&mut self, delay: f64, callback: TimerCallback) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let deadline = inner.now + delay.max(0.0);
        inner.pending.push(Scheduled {
            id,
            deadline,
            callback,
        });
        id
    }

    fn cancel(&mut self, handle: u64) {
        self.inner
            .borrow_mut()
            .pending
            .retain(|entry| entry.id != handle);
    }
}
