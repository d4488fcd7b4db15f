//! The time-ordered action-history engine.
//!
//! A [`Universe`] keeps an ordered sequence of `(time, action, state)`
//! entries and reconciles actions that arrive out of order: the action is
//! spliced at its virtual-time position and every later entry is re-derived
//! from its (possibly changed) predecessor. Two independent universes fed
//! the same actions in any order resolve to the same history.
//!
//! # Recomputation
//!
//! The forward pass after a splice always traverses the full tail, but each
//! step hands the [`State`] implementation the base and elapsed time the
//! entry was previously derived from. When those are unchanged the
//! implementation can keep its stored value, so the cost of an old insert is
//! data-dependent rather than always O(tail × update).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::clock::timer::Timer;
use crate::clock::warp::{ClockError, WarpClock};
use crate::state::State;

/// One resolved record of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry<S, A> {
    /// Virtual time at which the action logically occurred.
    pub time: f64,
    pub action: A,
    /// Fully-resolved state immediately after the action.
    pub state: S,
    /// Elapsed virtual time since the previous entry. Cached so the next
    /// recomputation can tell whether this entry's inputs moved.
    pub delta_time: f64,
}

/// Errors from [`Universe::insert`].
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum InsertError {
    /// The action predates the retained window; there is no base state left
    /// to reconcile it against.
    #[error("action at time {time} precedes the retained window starting at {horizon}")]
    TooOld { time: f64, horizon: f64 },

    /// Advancing the clock to a future action failed.
    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Error from state extrapolation into the past.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("can't extrapolate state at {at} into the past of the entry at {entry_time}")]
pub struct ExtrapolationError {
    pub at: f64,
    pub entry_time: f64,
}

enum Location {
    /// Splice after this index.
    After(usize),
    /// Identical `(time, action)` already present.
    Duplicate,
    /// Before the oldest retained entry.
    BeforeWindow,
}

/// Time-ordered action history over a [`WarpClock`].
///
/// The history is never empty and strictly ordered by `(time, action)`; the
/// `Ord` bound on `A` is the total order used for same-time placement and
/// duplicate detection (`Equal` at the same time means already present).
pub struct Universe<S, A, T>
where
    S: State<A> + Default,
    A: Ord,
    T: Timer,
{
    clock: WarpClock<T>,
    history: Vec<HistoryEntry<S, A>>,
    /// Retention window in virtual-time units.
    history_duration: f64,
    on_change: Option<Box<dyn FnMut()>>,
    // Scratch pair ping-ponged through recomputation passes so the old base
    // can be offered to `update` without allocating per entry.
    scratch_a: S,
    scratch_b: S,
}

impl<S, A, T> Universe<S, A, T>
where
    S: State<A> + Default,
    A: Ord,
    T: Timer,
{
    /// A universe seeded with one resolved entry. The seed keeps the history
    /// non-empty from the start; pruning never removes the sole entry.
    pub fn new(
        clock: WarpClock<T>,
        history_duration: f64,
        seed_time: f64,
        seed_action: A,
        seed_state: S,
    ) -> Self {
        Self {
            clock,
            history: vec![HistoryEntry {
                time: seed_time,
                action: seed_action,
                state: seed_state,
                delta_time: 0.0,
            }],
            history_duration,
            on_change: None,
            scratch_a: S::default(),
            scratch_b: S::default(),
        }
    }

    /// Register the hook fired exactly once at the end of every mutating
    /// call that changed the history.
    pub fn set_on_change(&mut self, hook: impl FnMut() + 'static) {
        self.on_change = Some(Box::new(hook));
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry<S, A>] {
        &self.history
    }

    #[must_use]
    pub fn latest(&self) -> &HistoryEntry<S, A> {
        self.history.last().expect("history is never empty")
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    #[must_use]
    pub const fn clock(&self) -> &WarpClock<T> {
        &self.clock
    }

    pub const fn clock_mut(&mut self) -> &mut WarpClock<T> {
        &mut self.clock
    }

    /// Insert `action` at virtual time `time`.
    ///
    /// Returns `Ok(false)` when the identical `(time, action)` is already
    /// present (duplicate delivery), `Ok(true)` when the history changed.
    /// A `time` ahead of the clock first advances the clock with a jump, so
    /// the event is in the past relative to the advanced time.
    pub fn insert(&mut self, time: f64, action: A) -> Result<bool, InsertError> {
        let now = self.advance_to(time)?;
        self.prune(now);
        match self.locate(time, &action) {
            Location::Duplicate => Ok(false),
            Location::BeforeWindow => Err(InsertError::TooOld {
                time,
                horizon: self.history[0].time,
            }),
            Location::After(index) => {
                let base = &self.history[index];
                let delta_time = time - base.time;
                let mut state = S::default();
                state.update(Some(&base.state), delta_time, Some(&action), None, None);
                self.splice(index, time, action, state, delta_time);
                Ok(true)
            }
        }
    }

    /// Insert an action together with its already-resolved state.
    ///
    /// Unlike [`insert`](Self::insert) this is allowed to land before the
    /// retained window: the entry becomes the new history front. This is how
    /// a late joiner bootstraps from a snapshot delivered by a peer.
    pub fn insert_with_state(
        &mut self,
        time: f64,
        action: A,
        state: S,
    ) -> Result<bool, InsertError> {
        let now = self.advance_to(time)?;
        self.prune(now);
        match self.locate(time, &action) {
            Location::Duplicate => Ok(false),
            Location::BeforeWindow => {
                self.history.insert(
                    0,
                    HistoryEntry {
                        time,
                        action,
                        state,
                        delta_time: 0.0,
                    },
                );
                self.recompute_after(0);
                self.notify();
                Ok(true)
            }
            Location::After(index) => {
                let delta_time = time - self.history[index].time;
                self.splice(index, time, action, state, delta_time);
                Ok(true)
            }
        }
    }

    /// Extrapolate the latest entry's state forward to `time`, writing into
    /// `dest`. The history itself is not touched.
    pub fn apply_state_at(&self, dest: &mut S, time: f64) -> Result<(), ExtrapolationError> {
        let latest = self.latest();
        if time < latest.time {
            return Err(ExtrapolationError {
                at: time,
                entry_time: latest.time,
            });
        }
        dest.update(Some(&latest.state), time - latest.time, None, None, None);
        Ok(())
    }

    /// Extrapolate the latest entry's state to the clock's current time.
    pub fn apply_current_state(&self, dest: &mut S) -> Result<(), ExtrapolationError> {
        self.apply_state_at(dest, self.clock.current_time())
    }

    /// Jump the clock forward when the event lies ahead of it; returns the
    /// resulting current time.
    fn advance_to(&mut self, time: f64) -> Result<f64, ClockError> {
        let now = self.clock.current_time();
        if time > now {
            self.clock.jump(time - now)?;
            return Ok(self.clock.current_time());
        }
        Ok(now)
    }

    /// Drop the oldest entries once their successor has aged out of the
    /// retention window. The sole remaining entry is never dropped.
    fn prune(&mut self, now: f64) {
        let mut cut = 0;
        while cut < self.history.len() - 1
            && now - self.history[cut + 1].time > self.history_duration
        {
            cut += 1;
        }
        if cut > 0 {
            tracing::debug!(dropped = cut, "pruned history front");
            self.history.drain(..cut);
        }
    }

    /// Walk backward for the last entry ordered `≤ (time, action)`.
    fn locate(&self, time: f64, action: &A) -> Location {
        for index in (0..self.history.len()).rev() {
            let entry = &self.history[index];
            if entry.time <= time {
                if entry.time == time {
                    match entry.action.cmp(action) {
                        Ordering::Greater => continue,
                        Ordering::Equal => return Location::Duplicate,
                        Ordering::Less => {}
                    }
                }
                return Location::After(index);
            }
        }
        Location::BeforeWindow
    }

    fn splice(&mut self, index: usize, time: f64, action: A, state: S, delta_time: f64) {
        tracing::debug!(time, tail = self.history.len() - index - 1, "spliced action");
        self.history.insert(
            index + 1,
            HistoryEntry {
                time,
                action,
                state,
                delta_time,
            },
        );
        self.recompute_after(index + 1);
        self.notify();
    }

    /// Re-derive every entry after `index` from its predecessor, offering
    /// each step the inputs it was previously derived from.
    fn recompute_after(&mut self, index: usize) {
        let mut use_a = true;
        for i in (index + 1)..self.history.len() {
            let (left, right) = self.history.split_at_mut(i);
            let prev = &left[i - 1];
            let current = &mut right[0];
            let delta_time = current.time - prev.time;

            let (scratch_next, scratch_prev) = if use_a {
                (&mut self.scratch_a, &self.scratch_b)
            } else {
                (&mut self.scratch_b, &self.scratch_a)
            };
            // Stash the pre-recompute value: it is the next entry's old base.
            scratch_next.copy_from(&current.state);

            let old_base: Option<&S> = if i == index + 1 {
                // The spliced entry's successor used to follow left[index-1].
                if index == 0 {
                    None
                } else {
                    Some(&left[index - 1].state)
                }
            } else {
                Some(scratch_prev)
            };

            current.state.update(
                Some(&prev.state),
                delta_time,
                Some(&current.action),
                Some(current.delta_time),
                old_base,
            );
            current.delta_time = delta_time;
            use_a = !use_a;
        }
    }

    fn notify(&mut self) {
        if let Some(hook) = self.on_change.as_mut() {
            hook();
        }
    }
}
