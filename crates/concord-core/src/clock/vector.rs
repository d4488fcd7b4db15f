//! Vector clocks: per-participant counters establishing causal order.
//!
//! Two clocks are `Before`/`After` when one dominates the other pointwise,
//! `Equal` when identical, and `Concurrent` otherwise. [`total_relation`]
//! extends the partial order into the total order every participant must
//! agree on: concurrent clocks are ordered by the smaller
//! `(origin timestamp, client id)` pair. Ordering by timestamp alone would
//! depend on sender clocks being distinct; the client-id fallback makes the
//! result unique regardless.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Participant identifier.
pub type ClientId = String;

/// Causal relation between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Causality {
    /// Every counter ≤ the other's, at least one strictly smaller.
    Before,
    /// Every counter ≥ the other's, at least one strictly greater.
    After,
    /// Incomparable: each side has a strictly greater counter somewhere.
    Concurrent,
    /// Identical counters.
    Equal,
}

/// Total order obtained by tie-breaking [`Causality::Concurrent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalRelation {
    Before,
    After,
    Equal,
}

/// A mapping from participant id to that participant's event counter.
///
/// Absent participants count as zero, so clocks over different participant
/// sets compare cleanly. `BTreeMap` keeps iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    counters: BTreeMap<ClientId, u64>,
}

impl VectorClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The counter recorded for `client`, zero when absent.
    #[must_use]
    pub fn get(&self, client: &str) -> u64 {
        self.counters.get(client).copied().unwrap_or(0)
    }

    /// Number of participants with a non-zero counter recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Advance `client`'s local counter by `by`.
    pub fn increment(&mut self, client: &str, by: u64) {
        *self.counters.entry(client.to_string()).or_insert(0) += by;
    }

    /// Pointwise maximum with `other`. Commutative and idempotent.
    pub fn merge(&mut self, other: &Self) {
        for (client, &count) in &other.counters {
            let entry = self.counters.entry(client.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    /// Causal comparison of `self` against `other`.
    #[must_use]
    pub fn relation(&self, other: &Self) -> Causality {
        let mut greater = false;
        let mut smaller = false;
        for client in self.counters.keys().chain(other.counters.keys()) {
            let mine = self.get(client);
            let theirs = other.get(client);
            if mine > theirs {
                greater = true;
            }
            if mine < theirs {
                smaller = true;
            }
        }
        match (greater, smaller) {
            (false, false) => Causality::Equal,
            (true, true) => Causality::Concurrent,
            (true, false) => Causality::After,
            (false, true) => Causality::Before,
        }
    }
}

/// Compare two stamped clocks under the globally consistent total order.
///
/// Falls back from the causal partial order to `(origin_ts, client_id)` for
/// concurrent clocks. Every participant applies the same rule, so all of
/// them converge on the same ordering regardless of arrival order.
#[must_use]
pub fn total_relation(
    a_client: &str,
    a: &VectorClock,
    a_ts: u64,
    b_client: &str,
    b: &VectorClock,
    b_ts: u64,
) -> TotalRelation {
    match a.relation(b) {
        Causality::Equal => TotalRelation::Equal,
        Causality::Before => TotalRelation::Before,
        Causality::After => TotalRelation::After,
        Causality::Concurrent => {
            if (a_ts, a_client) < (b_ts, b_client) {
                TotalRelation::Before
            } else {
                TotalRelation::After
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(entries: &[(&str, u64)]) -> VectorClock {
        let mut vc = VectorClock::new();
        for (client, count) in entries {
            vc.increment(client, *count);
        }
        vc
    }

    #[test]
    fn dominating_clock_is_after() {
        let a = clock(&[("alice", 2), ("bob", 1)]);
        let b = clock(&[("alice", 1), ("bob", 1)]);
        assert_eq!(a.relation(&b), Causality::After);
        assert_eq!(b.relation(&a), Causality::Before);
    }

    #[test]
    fn identical_clocks_are_equal() {
        let a = clock(&[("alice", 3)]);
        assert_eq!(a.relation(&a.clone()), Causality::Equal);
    }

    #[test]
    fn cross_dominating_clocks_are_concurrent() {
        let a = clock(&[("alice", 2), ("bob", 1)]);
        let b = clock(&[("alice", 1), ("bob", 2)]);
        assert_eq!(a.relation(&b), Causality::Concurrent);
        assert_eq!(b.relation(&a), Causality::Concurrent);
    }

    #[test]
    fn absent_participants_count_as_zero() {
        let a = clock(&[("alice", 1)]);
        let b = clock(&[("bob", 1)]);
        assert_eq!(a.relation(&b), Causality::Concurrent);
        assert_eq!(a.relation(&VectorClock::new()), Causality::After);
    }

    #[test]
    fn merge_is_pointwise_max() {
        let mut a = clock(&[("alice", 3), ("bob", 1)]);
        let b = clock(&[("bob", 4), ("carol", 2)]);
        a.merge(&b);
        assert_eq!(a.get("alice"), 3);
        assert_eq!(a.get("bob"), 4);
        assert_eq!(a.get("carol"), 2);
        // Idempotent.
        let before = a.clone();
        a.merge(&b);
        assert_eq!(a, before);
    }

    #[test]
    fn merge_is_commutative() {
        let a = clock(&[("alice", 3), ("bob", 1)]);
        let b = clock(&[("bob", 4), ("carol", 2)]);
        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn concurrent_ties_break_on_timestamp_then_client() {
        let a = clock(&[("alice", 1)]);
        let b = clock(&[("bob", 1)]);
        assert_eq!(
            total_relation("alice", &a, 100, "bob", &b, 200),
            TotalRelation::Before
        );
        assert_eq!(
            total_relation("alice", &a, 200, "bob", &b, 100),
            TotalRelation::After
        );
        // Same timestamp: client id decides, consistently from both sides.
        assert_eq!(
            total_relation("alice", &a, 100, "bob", &b, 100),
            TotalRelation::Before
        );
        assert_eq!(
            total_relation("bob", &b, 100, "alice", &a, 100),
            TotalRelation::After
        );
    }

    #[test]
    fn causal_relations_ignore_the_tiebreak() {
        let a = clock(&[("alice", 1)]);
        let mut b = a.clone();
        b.increment("alice", 1);
        // Later timestamp on the causally-earlier clock must not matter.
        assert_eq!(
            total_relation("alice", &a, 999, "alice", &b, 1),
            TotalRelation::Before
        );
    }

    #[test]
    fn serde_roundtrip() {
        let a = clock(&[("alice", 3), ("bob", 7)]);
        let json = serde_json::to_string(&a).expect("serialize");
        let back: VectorClock = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(a, back);
    }
}
