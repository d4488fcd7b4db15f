//! Reorderable histories: time-ordered and causally-ordered.

pub mod arena;
pub mod causal;
pub mod universe;
