//! Cycle clock and deferred callback queue.
//!
//! The scheduler is the only thing that moves simulated time forward. It provides:
//! 1. **Clock:** A monotonically non-decreasing cycle counter.
//! 2. **Queue:** At most one pending `(cycle, owner)` entry per owner, ordered by
//!    cycle and then by scheduling order so same-cycle firing is reproducible.
//! 3. **Dispatch:** `advance_to` pops each due entry before handing it to the
//!    caller's handler, so a handler may reschedule its own owner.
//!
//! Owners are opaque keys (`K`); the scheduler never holds a reference to the
//! component behind a key. Removing a component therefore requires cancelling
//! its key first, otherwise its entry will be dispatched to a missing owner.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::common::{Cycle, Result, SimError};

/// Ordering key: target cycle, then insertion sequence.
type Slot = (Cycle, u64);

/// Cycle counter with a queue of deferred callbacks keyed by owner.
#[derive(Debug)]
pub struct Scheduler<K> {
    /// Current cycle.
    now: Cycle,
    /// Next insertion sequence number (tie breaker).
    next_seq: u64,
    /// Pending entries in firing order.
    queue: BTreeMap<Slot, K>,
    /// Reverse index enforcing one entry per owner.
    pending: HashMap<K, Slot>,
}

impl<K> Default for Scheduler<K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Scheduler<K>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Creates an empty scheduler at cycle 0.
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Returns the current cycle.
    #[inline]
    pub const fn now(&self) -> Cycle {
        self.now
    }

    /// Schedules `owner` to fire at cycle `at`, replacing any pending entry it has.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ScheduleInPast`] if `at` is not strictly after [`Self::now`].
    /// A rejected request leaves any existing entry for `owner` untouched.
    pub fn schedule(&mut self, owner: K, at: Cycle) -> Result<()> {
        if at <= self.now {
            return Err(SimError::ScheduleInPast { at, now: self.now });
        }
        let _ = self.cancel(owner);

        let slot = (at, self.next_seq);
        self.next_seq += 1;
        let _ = self.queue.insert(slot, owner);
        let _ = self.pending.insert(owner, slot);
        trace!(?owner, at, now = self.now, "scheduled");
        Ok(())
    }

    /// Schedules `owner` to fire `delta` cycles from now.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ScheduleInPast`] when `delta` is zero.
    pub fn schedule_in(&mut self, owner: K, delta: Cycle) -> Result<()> {
        self.schedule(owner, self.now.saturating_add(delta))
    }

    /// Removes the pending entry for `owner`. Returns whether one existed.
    pub fn cancel(&mut self, owner: K) -> bool {
        match self.pending.remove(&owner) {
            Some(slot) => {
                let _ = self.queue.remove(&slot);
                trace!(?owner, at = slot.0, "cancelled");
                true
            }
            None => false,
        }
    }

    /// Returns the cycle `owner` is scheduled for, if any.
    pub fn pending(&self, owner: K) -> Option<Cycle> {
        self.pending.get(&owner).map(|&(at, _)| at)
    }

    /// Returns the cycle of the earliest pending entry.
    pub fn next_due(&self) -> Option<Cycle> {
        self.queue.keys().next().map(|&(at, _)| at)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns the earliest entry due at or before `limit`.
    ///
    /// The clock moves to the entry's cycle before it is returned, so the caller
    /// observes the cycle the callback was scheduled for.
    pub fn pop_due(&mut self, limit: Cycle) -> Option<(Cycle, K)> {
        let (&(at, _), _) = self.queue.first_key_value()?;
        if at > limit {
            return None;
        }
        let ((at, _), owner) = self.queue.pop_first()?;
        let _ = self.pending.remove(&owner);
        self.now = self.now.max(at);
        Some((at, owner))
    }

    /// Advances the clock to `target`, firing every entry due on the way.
    ///
    /// Entries fire in ascending cycle order, ties in scheduling order. Each is
    /// removed before `handler` runs. A `target` earlier than the current cycle
    /// leaves the clock unchanged.
    ///
    /// # Returns
    ///
    /// The number of callbacks fired.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error produced by `handler`; the clock is
    /// left at the cycle of the failing callback.
    pub fn advance_to<F>(&mut self, target: Cycle, mut handler: F) -> Result<usize>
    where
        F: FnMut(&mut Self, K) -> Result<()>,
    {
        if target < self.now {
            debug!(target, now = self.now, "advance_to into the past ignored");
            return Ok(0);
        }
        let mut fired = 0;
        while let Some((at, owner)) = self.pop_due(target) {
            trace!(?owner, at, "firing");
            handler(self, owner)?;
            fired += 1;
        }
        self.now = target;
        Ok(fired)
    }

    /// Drops every pending entry and returns the clock to cycle 0.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pending.clear();
        self.now = 0;
        self.next_seq = 0;
    }
}
