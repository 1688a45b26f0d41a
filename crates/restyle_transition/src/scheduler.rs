//! Transition scheduler
//!
//! Cooperative, single-threaded step queue over a virtual clock. Strategies
//! ask to be re-evaluated "no earlier than N time units from now"; the host
//! advances the clock and each chain drains its own due requests. Nothing
//! here blocks, and timing is a best-effort lower bound only.
//!
//! Staleness is handled structurally: a destroyed chain purges its entries,
//! and a fire naming a removed link or finished transition simply finds
//! nothing to step.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use restyle_core::PropertyKey;

use crate::chain::LinkId;

/// Virtual time unit (milliseconds in practice)
pub type Ticks = u64;

/// Shared handle to the scheduler, injected into each chain at construction
pub type SchedulerHandle = Rc<RefCell<TransitionScheduler>>;

/// Identifier of one registered chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainId(u64);

/// What a fired step carries to the strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDelta {
    /// Normal cadence: actual virtual time elapsed since the request
    Elapsed(Ticks),
    /// Out-of-band re-evaluation not tied to the cadence (a dependency
    /// changed); does not advance accumulated progress
    Forced,
}

/// One due step request, addressed to a transition by link and key
#[derive(Clone, Debug)]
pub struct StepFire {
    pub link: LinkId,
    pub key: PropertyKey,
    pub delta: StepDelta,
}

#[derive(Clone, Copy)]
struct TimedEntry {
    due: Ticks,
    requested_at: Ticks,
    seq: u64,
}

/// The cooperative step queue shared by all chains of one logical thread
#[derive(Default)]
pub struct TransitionScheduler {
    now: Ticks,
    next_chain: u64,
    next_seq: u64,
    timed: FxHashMap<(ChainId, LinkId, PropertyKey), TimedEntry>,
    forced: Vec<(ChainId, LinkId, PropertyKey)>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Advance the virtual clock; returns the new time
    pub fn advance(&mut self, dt: Ticks) -> Ticks {
        self.now += dt;
        self.now
    }

    /// Hand out an identity for a new chain
    pub fn register_chain(&mut self) -> ChainId {
        let id = ChainId(self.next_chain);
        self.next_chain += 1;
        id
    }

    /// Drop every pending request of a chain (chain teardown)
    pub fn forget_chain(&mut self, chain: ChainId) {
        self.timed.retain(|(c, _, _), _| *c != chain);
        self.forced.retain(|(c, _, _)| *c != chain);
    }

    /// Schedule a step no earlier than `delay` from now.
    ///
    /// Pending requests for the same transition coalesce to the earliest
    /// due time; the elapsed delta reported at fire time is measured from
    /// the earliest request.
    pub fn request(&mut self, chain: ChainId, link: LinkId, key: PropertyKey, delay: Ticks) {
        let due = self.now + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timed
            .entry((chain, link, key))
            .and_modify(|entry| {
                if due < entry.due {
                    entry.due = due;
                    entry.seq = seq;
                }
            })
            .or_insert(TimedEntry {
                due,
                requested_at: self.now,
                seq,
            });
    }

    /// Schedule an out-of-band step, drained ahead of the timed queue
    pub fn request_forced(&mut self, chain: ChainId, link: LinkId, key: PropertyKey) {
        let entry = (chain, link, key);
        if !self.forced.contains(&entry) {
            self.forced.push(entry);
        }
    }

    /// Whether a chain still has anything queued
    pub fn has_pending(&self, chain: ChainId) -> bool {
        self.forced.iter().any(|(c, _, _)| *c == chain)
            || self.timed.keys().any(|(c, _, _)| *c == chain)
    }

    /// Drain the given chain's due requests in deterministic order:
    /// forced first, then timed by due time and request order.
    pub fn take_due(&mut self, chain: ChainId) -> Vec<StepFire> {
        let mut fires = Vec::new();

        self.forced.retain(|(c, link, key)| {
            if *c == chain {
                fires.push(StepFire {
                    link: *link,
                    key: key.clone(),
                    delta: StepDelta::Forced,
                });
                false
            } else {
                true
            }
        });

        let now = self.now;
        let mut ready: Vec<(LinkId, PropertyKey, TimedEntry)> = Vec::new();
        self.timed.retain(|(c, link, key), entry| {
            if *c == chain && entry.due <= now {
                ready.push((*link, key.clone(), *entry));
                false
            } else {
                true
            }
        });
        ready.sort_by_key(|(_, _, entry)| (entry.due, entry.seq));
        fires.extend(ready.into_iter().map(|(link, key, entry)| StepFire {
            link,
            key,
            delta: StepDelta::Elapsed(now - entry.requested_at),
        }));

        fires
    }
}
