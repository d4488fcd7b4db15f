//! The causally-ordered history engine.
//!
//! Where [`Universe`](super::universe::Universe) trusts a shared virtual
//! clock, [`CausalTimeline`] orders events by vector clocks alone: the
//! sender's wall timestamp is only a tie-break for concurrent events, never
//! an ordering authority. Every participant applies the same total order
//! ([`total_relation`]), so all of them converge on the identical chain and
//! therefore the identical final state, regardless of arrival order.
//!
//! Entries live in an index-addressed [`Arena`] and form a doubly-linked
//! chain from `tail` (oldest retained) to `head` (causally latest). Splice
//! and prune are O(1) per entry; no node owns another.

use crate::clock::vector::{ClientId, TotalRelation, VectorClock, total_relation};

use super::arena::{Arena, SlotId};

/// A pure state transform carried by a causal event.
pub type CausalAction<T> = Box<dyn Fn(&T) -> T>;

type ChangeHook<T> = Box<dyn FnMut(&CausalEntry<T>)>;

/// Error from [`CausalTimeline::add`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddError {
    /// The event sits causally before everything retained; there is no base
    /// state left to reconcile it against. The local state is presumed
    /// already consistent with (or permanently divergent from) the sender.
    #[error("event from {client_id} stamped {origin_ts} precedes the retained chain")]
    StaleEvent { client_id: ClientId, origin_ts: u64 },
}

/// One entry of the causal chain.
pub struct CausalEntry<T> {
    /// Originating participant.
    pub client_id: ClientId,
    /// Sender wall clock at send time. Tie-break only.
    pub origin_ts: u64,
    /// Receiver wall clock at arrival. Retention pruning only.
    pub local_ts: u64,
    /// Full vector clock at send time.
    pub clock: VectorClock,
    /// Memoized state after applying this entry's action.
    pub state: T,
    /// `None` only for the seed entry, which is never recomputed.
    action: Option<CausalAction<T>>,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Vector-clock ordered history with bounded retention.
pub struct CausalTimeline<T> {
    arena: Arena<CausalEntry<T>>,
    /// Oldest retained entry.
    tail: SlotId,
    /// Causally latest entry observed so far.
    head: SlotId,
    /// Retention window over arrival timestamps, in milliseconds.
    history_duration: u64,
    on_change: Option<ChangeHook<T>>,
}

impl<T> CausalTimeline<T> {
    /// A timeline seeded with one resolved entry carrying the participant's
    /// initial clock. The seed anchors the chain; it has no action.
    pub fn new(
        state: T,
        clock: VectorClock,
        client_id: impl Into<ClientId>,
        origin_ts: u64,
        local_ts: u64,
        history_duration: u64,
    ) -> Self {
        let mut arena = Arena::new();
        let seed = arena.insert(CausalEntry {
            client_id: client_id.into(),
            origin_ts,
            local_ts,
            clock,
            state,
            action: None,
            prev: None,
            next: None,
        });
        Self {
            arena,
            tail: seed,
            head: seed,
            history_duration,
            on_change: None,
        }
    }

    /// Register the hook fired once per applied event, with the causally
    /// latest entry after recomputation.
    pub fn set_on_change(&mut self, hook: impl FnMut(&CausalEntry<T>) + 'static) {
        self.on_change = Some(Box::new(hook));
    }

    /// The causally latest entry.
    #[must_use]
    pub fn head(&self) -> &CausalEntry<T> {
        &self.arena[self.head]
    }

    /// The resolved state at the head of the chain.
    #[must_use]
    pub fn current_state(&self) -> &T {
        &self.arena[self.head].state
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Walk the chain from the oldest retained entry to the head.
    pub fn iter(&self) -> impl Iterator<Item = &CausalEntry<T>> {
        let mut cursor = Some(self.tail);
        std::iter::from_fn(move || {
            let id = cursor?;
            let entry = &self.arena[id];
            cursor = entry.next;
            Some(entry)
        })
    }

    /// Reconcile an incoming event into the chain.
    ///
    /// Returns `Ok(false)` when the event's clock equals one already present
    /// (duplicate delivery), `Ok(true)` when the chain changed, and
    /// [`AddError::StaleEvent`] when the event precedes the retained window.
    /// `local_ts` is the receiver's arrival wall clock.
    pub fn add(
        &mut self,
        clock: VectorClock,
        client_id: impl Into<ClientId>,
        origin_ts: u64,
        action: CausalAction<T>,
        local_ts: u64,
    ) -> Result<bool, AddError> {
        let client_id = client_id.into();
        self.prune(local_ts);

        // Walk back from the head past every entry that causally dominates
        // the incoming event.
        let mut cursor = self.head;
        loop {
            let entry = &self.arena[cursor];
            match total_relation(
                &entry.client_id,
                &entry.clock,
                entry.origin_ts,
                &client_id,
                &clock,
                origin_ts,
            ) {
                TotalRelation::After => match entry.prev {
                    Some(prev) => cursor = prev,
                    None => {
                        tracing::warn!(
                            client_id = %client_id,
                            origin_ts,
                            "event precedes the retained chain; dropping"
                        );
                        return Err(AddError::StaleEvent {
                            client_id,
                            origin_ts,
                        });
                    }
                },
                TotalRelation::Equal => return Ok(false),
                TotalRelation::Before => break,
            }
        }

        // Splice the new entry directly after the found position.
        let state = action(&self.arena[cursor].state);
        let next = self.arena[cursor].next;
        let id = self.arena.insert(CausalEntry {
            client_id,
            origin_ts,
            local_ts,
            clock,
            state,
            action: Some(action),
            prev: Some(cursor),
            next,
        });
        self.arena[cursor].next = Some(id);
        match next {
            Some(successor) => self.arena[successor].prev = Some(id),
            None => self.head = id,
        }

        // Reapply every causally-later action to its new predecessor state.
        let mut cursor = next;
        while let Some(current) = cursor {
            let recomputed = {
                let entry = &self.arena[current];
                let prev = entry.prev.expect("non-seed entries have a predecessor");
                let action = entry
                    .action
                    .as_ref()
                    .expect("only the seed entry lacks an action");
                action(&self.arena[prev].state)
            };
            self.arena[current].state = recomputed;
            cursor = self.arena[current].next;
        }

        if let Some(hook) = self.on_change.as_mut() {
            hook(&self.arena[self.head]);
        }
        Ok(true)
    }

    /// Drop entries whose arrival is older than the retention window,
    /// keeping the first over-age entry as the window boundary so events
    /// just inside the window still find a base. The boundary may be the
    /// head itself; the head is never dropped.
    fn prune(&mut self, now: u64) {
        let mut cursor = Some(self.head);
        while let Some(current) = cursor {
            let entry = &self.arena[current];
            if now.saturating_sub(entry.local_ts) > self.history_duration {
                let mut dropped = 0_usize;
                let mut doomed = self.arena[current].prev.take();
                self.tail = current;
                while let Some(id) = doomed {
                    doomed = self.arena[id].prev;
                    self.arena.remove(id);
                    dropped += 1;
                }
                if dropped > 0 {
                    tracing::debug!(dropped, "pruned causal chain tail");
                }
                return;
            }
            cursor = entry.prev;
        }
    }
}
