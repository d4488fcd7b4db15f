//! A warpable virtual clock.
//!
//! [`WarpClock`] decouples "current time" from wall time: it can run at an
//! arbitrary velocity, be nudged smoothly toward a target offset
//! ([`change`](WarpClock::change)), or shifted instantaneously forward
//! ([`jump`](WarpClock::jump)). Pending waits are re-timed whenever any of
//! these parameters move.
//!
//! # Algorithm
//!
//! Virtual time is computed lazily:
//!
//! ```text
//! current = base + passed_real * velocity
//!                + min(passed_real, ramp_remaining_real) * ramp_rate
//! ```
//!
//! Every mutating call first *settles* the ramp up to the current wall time,
//! folding the consumed portion into the base and shrinking the remaining
//! ramp window. Settling before applying new parameters keeps `current_time`
//! continuous (no discontinuity except an explicit `jump`) and prevents
//! errors from compounding across repeated mutations.

use std::cell::RefCell;
use std::rc::Rc;

use super::timer::{Timer, TimerCallback};

/// Default ramp rate for [`WarpClock::change`], in virtual-time units per
/// wall-time unit, layered on top of the base velocity.
pub const DEFAULT_RAMP_RATE: f64 = 0.1;

/// Configuration errors raised by clock mutators. Never silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ClockError {
    /// `set_velocity` was handed a negative velocity.
    #[error("velocity can't be negative (got {0})")]
    NegativeVelocity(f64),

    /// `jump` was handed a negative offset.
    #[error("can't jump backwards in virtual time (got {0})")]
    NegativeJump(f64),

    /// A negative offset with a ramp rate above 1 would require a negative
    /// effective velocity, i.e. virtual time moving backwards.
    #[error("ramp rate {rate} is above 1 with negative offset {offset}; virtual time can't move backwards")]
    BackwardRamp { offset: f64, rate: f64 },

    /// A zero ramp rate cannot spread any offset over wall time.
    #[error("ramp rate must be non-zero")]
    ZeroRampRate,
}

/// Identifier of a pending wait, usable with
/// [`cancel_wait`](WarpClock::cancel_wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitId(u64);

struct WaitEntry<H> {
    id: WaitId,
    /// Absolute virtual-time target.
    target: f64,
    /// Taken exactly once, when the underlying timer fires.
    callback: Option<TimerCallback>,
    handle: Option<H>,
}

struct WaitSet<H> {
    entries: Vec<WaitEntry<H>>,
    next_id: u64,
}

impl<H> Default for WaitSet<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<H> WaitSet<H> {
    fn alloc(&mut self, target: f64, callback: TimerCallback) -> WaitId {
        let id = WaitId(self.next_id);
        self.next_id += 1;
        self.entries.push(WaitEntry {
            id,
            target,
            callback: Some(callback),
            handle: None,
        });
        id
    }

    fn entry_mut(&mut self, id: WaitId) -> Option<&mut WaitEntry<H>> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    /// Remove the entry and hand back its callback; the timer has fired.
    fn complete(&mut self, id: WaitId) -> Option<TimerCallback> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let mut entry = self.entries.swap_remove(index);
        entry.callback.take()
    }

    fn remove(&mut self, id: WaitId) -> Option<WaitEntry<H>> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.swap_remove(index))
    }
}

/// A virtual clock over an injected wall-time source and timer.
///
/// Single-owner, single-threaded: the only shared structure is the wait set,
/// which scheduled timer closures reach through an `Rc`.
pub struct WarpClock<T: Timer> {
    /// Virtual time at the last calibration point.
    state_time: f64,
    /// Wall time at the last calibration point.
    real_at_state_time: f64,
    /// Virtual-time units per wall-time unit.
    velocity: f64,
    /// Extra velocity while a ramp is active. Sign follows the ramp offset.
    ramp_rate: f64,
    /// Wall time left in the active ramp window.
    ramp_remaining_real: f64,
    wall: Box<dyn Fn() -> f64>,
    timer: T,
    waits: Rc<RefCell<WaitSet<T::Handle>>>,
}

impl<T: Timer> WarpClock<T> {
    /// A clock starting at `initial_time` virtual units, running at velocity 1.
    pub fn new(initial_time: f64, wall: impl Fn() -> f64 + 'static, timer: T) -> Self {
        Self::with_velocity(initial_time, wall, timer, 1.0)
    }

    /// A clock with an explicit initial velocity. `velocity` must be ≥ 0;
    /// use [`set_velocity`](Self::set_velocity) for checked changes.
    pub fn with_velocity(
        initial_time: f64,
        wall: impl Fn() -> f64 + 'static,
        timer: T,
        velocity: f64,
    ) -> Self {
        debug_assert!(velocity >= 0.0, "initial velocity must be non-negative");
        let wall: Box<dyn Fn() -> f64> = Box::new(wall);
        let real_at_state_time = wall();
        Self {
            state_time: initial_time,
            real_at_state_time,
            velocity,
            ramp_rate: 0.0,
            ramp_remaining_real: 0.0,
            wall,
            timer,
            waits: Rc::new(RefCell::new(WaitSet::default())),
        }
    }

    /// Current virtual time, computed lazily from the wall source.
    #[must_use]
    pub fn current_time(&self) -> f64 {
        let passed = (self.wall)() - self.real_at_state_time;
        let ramp_consumed = passed.min(self.ramp_remaining_real);
        self.state_time + passed * self.velocity + ramp_consumed * self.ramp_rate
    }

    /// Base velocity, excluding any active ramp.
    #[must_use]
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Remaining unconsumed offset of the in-flight ramp, in virtual units.
    #[must_use]
    pub fn rest_change(&self) -> f64 {
        let passed = (self.wall)() - self.real_at_state_time;
        let ramp_consumed = passed.min(self.ramp_remaining_real);
        (self.ramp_remaining_real - ramp_consumed) * self.ramp_rate
    }

    /// Number of waits still pending.
    #[must_use]
    pub fn pending_waits(&self) -> usize {
        self.waits.borrow().entries.len()
    }

    /// Begin a ramp adding `offset` virtual units at the default rate of
    /// [`DEFAULT_RAMP_RATE`] virtual units per wall unit.
    pub fn change(&mut self, offset: f64) -> Result<(), ClockError> {
        self.change_with_rate(offset, DEFAULT_RAMP_RATE)
    }

    /// Begin a ramp adding `offset` virtual units, spread over wall time at
    /// `rate` virtual units per wall unit. Replaces any ramp in flight
    /// (the already-consumed portion is kept; the rest is discarded).
    pub fn change_with_rate(&mut self, offset: f64, rate: f64) -> Result<(), ClockError> {
        if rate == 0.0 {
            return Err(ClockError::ZeroRampRate);
        }
        if rate > 1.0 && offset < 0.0 {
            return Err(ClockError::BackwardRamp { offset, rate });
        }
        self.settle();
        self.ramp_rate = if offset < 0.0 { -rate.abs() } else { rate.abs() };
        self.ramp_remaining_real = offset / self.ramp_rate;
        self.retime_waits();
        Ok(())
    }

    /// Instantaneous forward shift of virtual time by `by ≥ 0`.
    pub fn jump(&mut self, by: f64) -> Result<(), ClockError> {
        if by < 0.0 {
            return Err(ClockError::NegativeJump(by));
        }
        self.settle();
        self.state_time += by;
        self.retime_waits();
        Ok(())
    }

    /// Set the base velocity. An active ramp continues on top of it.
    pub fn set_velocity(&mut self, velocity: f64) -> Result<(), ClockError> {
        if velocity < 0.0 {
            return Err(ClockError::NegativeVelocity(velocity));
        }
        self.settle();
        self.velocity = velocity;
        self.retime_waits();
        Ok(())
    }

    /// Register `on_elapsed` to fire once `current_time()` reaches `target`.
    ///
    /// The underlying timer is rescheduled every time `change`, `jump` or
    /// `set_velocity` moves the clock; a jump past `target` fires the wait
    /// on the timer's next tick.
    pub fn wait_until(&mut self, target: f64, on_elapsed: impl FnOnce() + 'static) -> WaitId {
        self.settle();
        let id = self
            .waits
            .borrow_mut()
            .alloc(target, Box::new(on_elapsed));
        let delay = self.real_time_left_to(target - self.state_time).max(0.0);
        let handle = self.timer.schedule(delay, Self::fire(&self.waits, id));
        if let Some(entry) = self.waits.borrow_mut().entry_mut(id) {
            entry.handle = Some(handle);
        }
        id
    }

    /// Cancel a single pending wait without invoking its callback.
    /// Returns false when the wait already fired or was cancelled.
    pub fn cancel_wait(&mut self, id: WaitId) -> bool {
        let entry = self.waits.borrow_mut().remove(id);
        match entry {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    self.timer.cancel(handle);
                }
                true
            }
            None => false,
        }
    }

    /// Cancel every pending wait. Outstanding callbacks are dropped
    /// unresolved, never invoked. Also runs on `Drop`.
    pub fn destroy(&mut self) {
        let entries = std::mem::take(&mut self.waits.borrow_mut().entries);
        for entry in entries {
            if let Some(handle) = entry.handle {
                self.timer.cancel(handle);
            }
        }
    }

    /// Fold the wall time elapsed since the last calibration into the base,
    /// consuming the overlapping portion of the ramp.
    fn settle(&mut self) {
        let real = (self.wall)();
        let passed = real - self.real_at_state_time;
        let ramp_consumed = passed.min(self.ramp_remaining_real);
        self.state_time += passed * self.velocity + ramp_consumed * self.ramp_rate;
        self.ramp_remaining_real -= ramp_consumed;
        self.real_at_state_time = real;
    }

    /// Wall time needed to cover `remaining` virtual units under the current
    /// velocity and ramp. Must be called with the clock settled.
    fn real_time_left_to(&self, remaining: f64) -> f64 {
        let ramped_velocity = self.velocity + self.ramp_rate;
        let ramp_span = ramped_velocity * self.ramp_remaining_real;
        let result = if remaining > ramp_span {
            self.ramp_remaining_real + (remaining - ramp_span) / self.velocity
        } else {
            remaining / ramped_velocity
        };
        tracing::trace!(remaining, result, "re-timed wait");
        result
    }

    /// Cancel and reschedule the timer behind every pending wait against the
    /// clock's (settled) parameters.
    fn retime_waits(&mut self) {
        let ids: Vec<WaitId> = self.waits.borrow().entries.iter().map(|e| e.id).collect();
        for id in ids {
            let stale = self
                .waits
                .borrow_mut()
                .entry_mut(id)
                .and_then(|entry| entry.handle.take());
            if let Some(handle) = stale {
                self.timer.cancel(handle);
            }
            let target = match self.waits.borrow_mut().entry_mut(id) {
                Some(entry) => entry.target,
                None => continue,
            };
            let delay = self.real_time_left_to(target - self.state_time).max(0.0);
            let handle = self.timer.schedule(delay, Self::fire(&self.waits, id));
            if let Some(entry) = self.waits.borrow_mut().entry_mut(id) {
                entry.handle = Some(handle);
            }
        }
    }

    /// The closure handed to the timer: completes the wait and runs the
    /// registered callback with the wait-set borrow already released.
    fn fire(waits: &Rc<RefCell<WaitSet<T::Handle>>>, id: WaitId) -> TimerCallback {
        let waits = Rc::clone(waits);
        Box::new(move || {
            let callback = waits.borrow_mut().complete(id);
            if let Some(callback) = callback {
                callback();
            }
        })
    }
}

impl<T: Timer> Drop for WarpClock<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}
