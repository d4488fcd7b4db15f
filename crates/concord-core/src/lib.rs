//! Client-side state reconciliation over unreliable, unordered delivery.
//!
//! Events arrive late, duplicated, and out of order; every participant must
//! still converge on the same state. This crate keeps a bounded window of
//! recent history and, when an out-of-order event lands, splices it into
//! its proper place and replays everything after it.
//!
//! Two orderings are provided:
//!
//! - [`Universe`] orders events by a shared virtual clock ([`WarpClock`]),
//!   which can run at any non-negative velocity and re-synchronize against
//!   a server by ramping smoothly instead of stepping.
//! - [`CausalTimeline`] orders events by [`VectorClock`]s, tie-breaking
//!   concurrent events deterministically so replicas agree without any
//!   shared clock at all.
//!
//! State is application-defined through the [`State`] trait, whose `update`
//! contract carries memoization hints so replays touch only what changed.

pub mod clock;
pub mod state;
pub mod timeline;

pub use clock::timer::{ManualTimer, Timer, TimerCallback};
pub use clock::vector::{Causality, ClientId, TotalRelation, VectorClock, total_relation};
pub use clock::warp::{ClockError, DEFAULT_RAMP_RATE, WaitId, WarpClock};
pub use state::State;
pub use timeline::causal::{AddError, CausalAction, CausalEntry, CausalTimeline};
pub use timeline::universe::{ExtrapolationError, HistoryEntry, InsertError, Universe};
