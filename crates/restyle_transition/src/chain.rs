//! Rule chains
//!
//! The chain is the ordered sequence of overlays active for one styled
//! item. It owns every link in a generational arena; a removed link's id
//! goes permanently dead, which is also what lets late scheduler callbacks
//! detect staleness and no-op.
//!
//! Entry points: `transition` whenever the item's active rule changes,
//! `animate` to register strategies on the current tail, `pump` to run due
//! scheduler work, `destroy` when the item is discarded.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use restyle_core::{PropertyKey, PropertyType, PropertyValue, RuleHandle, StyleError};

use crate::overlay::{OverlayCell, OverlayRule};
use crate::scheduler::{ChainId, SchedulerHandle};
use crate::strategy::{StrategyRegistry, TransitionStrategy};
use crate::transition::Effect;

new_key_type! {
    /// Identifier of one chain link
    pub struct LinkId;

    /// Identifier of one registered change listener
    pub struct ChangeListenerId;
}

/// Callback invoked with each key whose observable value changed
pub type ChangeListener = Box<dyn FnMut(&PropertyKey)>;

struct Link {
    overlay: OverlayCell,
    prev: Option<LinkId>,
    next: Option<LinkId>,
}

/// The ordered, mutable sequence of overlays for one styled item.
///
/// Invariant: exactly one head and one tail at all times while alive, and
/// neighbor pointers stay mutually consistent.
pub struct RuleChain {
    id: ChainId,
    links: SlotMap<LinkId, Link>,
    head: LinkId,
    tail: LinkId,
    scheduler: SchedulerHandle,
    listeners: SlotMap<ChangeListenerId, ChangeListener>,
    destroyed: bool,
}

impl RuleChain {
    /// Create a chain for an item whose first rule is `root`.
    ///
    /// The scheduler is an explicit dependency; chains on the same logical
    /// thread share one handle.
    pub fn new(root: RuleHandle, scheduler: SchedulerHandle) -> Self {
        let id = scheduler.borrow_mut().register_chain();
        let mut links = SlotMap::with_key();
        let sched = scheduler.clone();
        let head = links.insert_with_key(|link| Link {
            overlay: Rc::new(RefCell::new(OverlayRule::new(root, None, sched, id, link))),
            prev: None,
            next: None,
        });
        Self {
            id,
            links,
            head,
            tail: head,
            scheduler,
            listeners: SlotMap::with_key(),
            destroyed: false,
        }
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    /// Number of links currently in the chain
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The tail link's id (the authoritative overlay's link)
    pub fn tail_link(&self) -> LinkId {
        self.tail
    }

    /// The authoritative read view: the tail overlay
    pub fn tail_overlay(&self) -> OverlayCell {
        self.links[self.tail].overlay.clone()
    }

    /// Read a property through the tail overlay
    pub fn get_property(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue> {
        self.links[self.tail].overlay.borrow().get_property(ty, key)
    }

    /// Whether `key` is animated anywhere in the chain
    pub fn is_animated(&self, key: &PropertyKey) -> bool {
        self.links[self.tail].overlay.borrow().is_animated(key)
    }

    /// Whether `key` is a declared input of any active transition
    pub fn is_input(&self, key: &PropertyKey) -> bool {
        self.links[self.tail].overlay.borrow().is_input(key)
    }

    /// Register a change listener. Notifications for one key arrive in the
    /// order the underlying value actually changed.
    pub fn on_change(&mut self, listener: impl FnMut(&PropertyKey) + 'static) -> ChangeListenerId {
        self.listeners.insert(Box::new(listener))
    }

    /// Remove a change listener; unknown ids are a no-op
    pub fn remove_change_listener(&mut self, id: ChangeListenerId) {
        self.listeners.remove(id);
    }

    /// Register `strategy` for `key` on the current tail overlay; returns
    /// the tail overlay so callers always read through the authoritative
    /// view. May be called any number of times before the next
    /// `transition`.
    pub fn animate(
        &mut self,
        key: PropertyKey,
        ty: PropertyType,
        strategy: Box<dyn TransitionStrategy>,
    ) -> OverlayCell {
        let overlay = self.tail_overlay();
        if self.destroyed {
            tracing::warn!("animate on a destroyed chain ignored");
            return overlay;
        }
        let mut effects = Vec::new();
        overlay.borrow_mut().animate(key, ty, strategy, &mut effects);
        self.apply_effects(self.tail, effects);
        overlay
    }

    /// Like [`RuleChain::animate`], with the strategy pulled from the
    /// per-type registry.
    pub fn animate_default(
        &mut self,
        key: PropertyKey,
        ty: PropertyType,
        registry: &StrategyRegistry,
    ) -> OverlayCell {
        self.animate(key, ty, registry.make(ty))
    }

    /// Switch the item's active rule to `next`.
    ///
    /// Appends a new tail overlay rooted at `next` and tells the old tail
    /// to begin transitioning. An old tail with no active transitions is
    /// removed on the spot, so untouched items never pay for animation.
    pub fn transition(&mut self, next: RuleHandle) {
        if self.destroyed {
            tracing::warn!("transition on a destroyed chain ignored");
            return;
        }
        let old_tail = self.tail;
        let old_overlay = self.links[old_tail].overlay.clone();
        let sched = self.scheduler.clone();
        let id = self.id;
        let next_root = next.clone();
        let new_tail = self.links.insert_with_key(|link| Link {
            overlay: Rc::new(RefCell::new(OverlayRule::new(
                next_root,
                Some(old_overlay.clone()),
                sched,
                id,
                link,
            ))),
            prev: Some(old_tail),
            next: None,
        });
        self.links[old_tail].next = Some(new_tail);
        self.tail = new_tail;
        tracing::debug!(chain = ?self.id, links = self.links.len(), "rule transition started");

        let mut effects = Vec::new();
        let collapse = old_overlay.borrow_mut().transition(next, &mut effects);
        self.apply_effects(old_tail, effects);
        if collapse {
            self.remove_link(old_tail);
        }
    }

    /// Run every step request that has come due for this chain
    pub fn pump(&mut self) {
        if self.destroyed {
            return;
        }
        let fires = self.scheduler.borrow_mut().take_due(self.id);
        for fire in fires {
            let Some(link) = self.links.get(fire.link) else {
                tracing::trace!(key = %fire.key, "step for a removed link dropped");
                continue;
            };
            let overlay = link.overlay.clone();
            let mut effects = Vec::new();
            let stepped = overlay.borrow_mut().step(&fire.key, fire.delta, &mut effects);
            if !stepped {
                tracing::trace!(key = %fire.key, "step for a finished transition dropped");
                continue;
            }
            self.apply_effects(fire.link, effects);
        }
    }

    /// Unlink one link.
    ///
    /// The successor overlay's `previous` reference is rewired to the
    /// removed link's predecessor; removal is one-shot and a removed link
    /// can never be reinserted. Unknown (already removed) ids are a no-op.
    ///
    /// # Panics
    ///
    /// Panics when called on the only remaining link — a chain is torn
    /// down to one link only through [`RuleChain::destroy`].
    pub fn remove_link(&mut self, link: LinkId) {
        if self.links.contains_key(link) {
            assert!(self.links.len() > 1, "{}", StyleError::SoleLink);
        }
        let Some(removed) = self.links.remove(link) else {
            return;
        };
        let Link {
            overlay,
            prev,
            next,
        } = removed;
        let prev_overlay = overlay.borrow().previous().cloned();
        match next {
            Some(next_id) => {
                self.links[next_id].prev = prev;
                self.links[next_id]
                    .overlay
                    .borrow_mut()
                    .set_previous(prev_overlay);
            }
            None => {
                self.tail = prev.expect("chain keeps at least one link");
            }
        }
        match prev {
            Some(prev_id) => self.links[prev_id].next = next,
            None => {
                self.head = next.expect("chain keeps at least one link");
            }
        }
        overlay.borrow_mut().detach();
        tracing::debug!(chain = ?self.id, links = self.links.len(), "link removed");
    }

    /// Force-remove everything, bypassing animation logic.
    ///
    /// Every transition's dependency listeners are unregistered, every link
    /// but the tail is dropped, and the tail is detached, so reads resolve
    /// only through the final rule. Scheduled callbacks still in flight are
    /// purged; any that already escaped find a dead chain and no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.scheduler.borrow_mut().forget_chain(self.id);
        for link in self.links.values() {
            link.overlay.borrow_mut().teardown_all();
        }
        let tail = self.tail;
        self.links.retain(|id, _| id == tail);
        self.head = tail;
        let entry = &mut self.links[tail];
        entry.prev = None;
        entry.next = None;
        entry.overlay.borrow_mut().detach();
        self.listeners.clear();
        tracing::debug!(chain = ?self.id, "chain destroyed");
    }

    fn apply_effects(&mut self, link: LinkId, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Changed(key) => self.notify(&key),
                Effect::Schedule { key, delay } => {
                    self.scheduler.borrow_mut().request(self.id, link, key, delay);
                }
                Effect::Finished { key } => self.finish_transition(link, &key),
            }
        }
    }

    fn finish_transition(&mut self, link: LinkId, key: &PropertyKey) {
        let Some(entry) = self.links.get(link) else {
            return;
        };
        let overlay = entry.overlay.clone();
        let Some((keys, collapse)) = overlay.borrow_mut().finish_transition(key) else {
            return;
        };
        tracing::debug!(key = %key, "transition finished");
        for changed in keys {
            self.notify(&changed);
        }
        if collapse {
            self.remove_link(link);
        }
    }

    fn notify(&mut self, key: &PropertyKey) {
        for (_id, listener) in self.listeners.iter_mut() {
            listener(key);
        }
    }
}

impl Drop for RuleChain {
    fn drop(&mut self) {
        self.scheduler.borrow_mut().forget_chain(self.id);
    }
}
