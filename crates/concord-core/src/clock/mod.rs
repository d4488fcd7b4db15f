//! Clocks: warped virtual time and vector clocks for causal order.

pub mod timer;
pub mod vector;
pub mod warp;
