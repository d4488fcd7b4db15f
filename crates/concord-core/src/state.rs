//! The state capability contract consumed by the action-history engine.
//!
//! A [`State`] implementation knows how to derive itself from a base state,
//! either by applying an action after some elapsed virtual time or by pure
//! time-extrapolation when no action is present. The engine never inspects
//! state values; it only calls through this trait.
//!
//! # Memoization
//!
//! Forward recomputation after an out-of-order insert traverses the whole
//! tail of the history, but most entries are usually unaffected. The engine
//! therefore hands `update` the base state and elapsed time from the
//! *previous* recomputation (`prev_base`, `prev_delta_time`). An
//! implementation that finds them unchanged can return without recomputing.
//! Skipping the work is the implementation's choice; the traversal itself is
//! always full length.

/// Capability bound on the state type managed by
/// [`Universe`](crate::timeline::universe::Universe).
///
/// Implementations are plain value types; `Default` (required at the engine
/// boundary) supplies the blank value the engine fills via `update` or
/// `copy_from`.
pub trait State<A> {
    /// Derive `self` from `base`.
    ///
    /// - `base` — the predecessor state this value is computed from. `None`
    ///   only for root entries whose state was supplied externally.
    /// - `delta_time` — virtual time elapsed between `base` and `self`.
    /// - `action` — the action applied at the end of the interval, or `None`
    ///   for pure time-extrapolation of `base`.
    /// - `prev_delta_time` / `prev_base` — the inputs this entry was last
    ///   computed from, when known. If both match the current inputs the
    ///   stored value is already correct and `update` may return early.
    fn update(
        &mut self,
        base: Option<&Self>,
        delta_time: f64,
        action: Option<&A>,
        prev_delta_time: Option<f64>,
        prev_base: Option<&Self>,
    );

    /// Deep value copy of `other` into `self`.
    fn copy_from(&mut self, other: &Self);
}
