//! Overlay rules
//!
//! An overlay wraps the rule a chain is transitioning *to* (its `root`) and
//! the view it is transitioning *from* (its `previous` overlay, if any). It
//! intercepts the keys with active animated overrides and delegates every
//! other key: to `previous` while that view still animates the key, to its
//! own `root` otherwise — so an untouched property snaps to the new rule
//! immediately while animated ones blend.
//!
//! Overlays implement the same read interface as plain rules; downstream
//! readers never know whether animation is in progress.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use restyle_core::{
    PropertyKey, PropertyType, PropertyValue, RuleContent, RuleHandle, RuleListener,
    RuleListenerId, StyleError,
};

use crate::chain::LinkId;
use crate::scheduler::{ChainId, SchedulerHandle, StepDelta};
use crate::strategy::TransitionStrategy;
use crate::transition::{Effect, StepWaker, Transition};

/// Shared cell holding one overlay rule
pub type OverlayCell = Rc<RefCell<OverlayRule>>;

/// A rule wrapper holding the active transitions of one rule switch.
pub struct OverlayRule {
    root: RuleHandle,
    previous: Option<OverlayCell>,
    transitions: IndexMap<PropertyKey, Transition>,
    target: Option<RuleHandle>,
    scheduler: SchedulerHandle,
    chain: ChainId,
    link: LinkId,
}

impl OverlayRule {
    pub(crate) fn new(
        root: RuleHandle,
        previous: Option<OverlayCell>,
        scheduler: SchedulerHandle,
        chain: ChainId,
        link: LinkId,
    ) -> Self {
        Self {
            root,
            previous,
            transitions: IndexMap::new(),
            target: None,
            scheduler,
            chain,
            link,
        }
    }

    /// The rule this overlay resolves non-animated keys through
    pub fn root(&self) -> &RuleHandle {
        &self.root
    }

    /// Whether a retarget has been recorded
    pub fn is_transitioning(&self) -> bool {
        self.target.is_some()
    }

    /// Number of active transitions
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub(crate) fn previous(&self) -> Option<&OverlayCell> {
        self.previous.as_ref()
    }

    pub(crate) fn set_previous(&mut self, previous: Option<OverlayCell>) {
        self.previous = previous;
    }

    pub(crate) fn detach(&mut self) {
        self.previous = None;
    }

    /// Resolve a typed read.
    ///
    /// # Panics
    ///
    /// Panics when the key carries an animated override whose recorded type
    /// differs from `ty`; only the engine issues these reads, so a mismatch
    /// is a logic error in the caller.
    pub fn get_property(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue> {
        if let Some(transition) = self.transitions.get(key) {
            if let Some(value) = transition.cached() {
                let recorded = transition.recorded_type();
                if recorded != ty {
                    panic!(
                        "{}",
                        StyleError::TypeMismatch {
                            key: key.clone(),
                            recorded,
                            requested: ty,
                        }
                    );
                }
                return Some(value.clone());
            }
        }
        // Forwarded inputs, first registered transition first.
        for transition in self.transitions.values() {
            if let Some(value) = transition.forward(ty, key) {
                return Some(value);
            }
        }
        if let Some(previous) = &self.previous {
            if previous.borrow().is_animated(key) {
                return previous.borrow().get_property(ty, key);
            }
        }
        self.root.get_property(ty, key)
    }

    /// Whether `key` is overridden here or anywhere down the chain
    pub fn is_animated(&self, key: &PropertyKey) -> bool {
        if self.transitions.contains_key(key) {
            return true;
        }
        self.previous
            .as_ref()
            .is_some_and(|previous| previous.borrow().is_animated(key))
    }

    /// Whether `key` is declared as a required input by any active
    /// transition, here or down the chain. Callers use this to keep a
    /// property alive across a rule switch instead of dropping it.
    pub fn is_input(&self, key: &PropertyKey) -> bool {
        if self
            .transitions
            .values()
            .any(|transition| transition.declares_input(key))
        {
            return true;
        }
        self.previous
            .as_ref()
            .is_some_and(|previous| previous.borrow().is_input(key))
    }

    /// Keys readable through this overlay: the root's, plus overrides and
    /// forwarded inputs.
    pub fn property_keys(&self) -> Vec<PropertyKey> {
        let mut keys = self.root.property_keys();
        for (key, transition) in &self.transitions {
            keys.push(key.clone());
            keys.extend(transition.input_keys());
        }
        keys.sort();
        keys.dedup();
        keys
    }

    /// Create and initialize a transition for `key`.
    ///
    /// The source view is the `previous` overlay when one exists, else the
    /// root, so interpolation starts from whatever was authoritative
    /// immediately before this overlay existed. If this overlay is already
    /// mid-transition the new transition is fast-forwarded with an
    /// immediate retarget. A key that already carries a transition keeps
    /// its first one.
    pub(crate) fn animate(
        &mut self,
        key: PropertyKey,
        ty: PropertyType,
        strategy: Box<dyn TransitionStrategy>,
        effects: &mut Vec<Effect>,
    ) {
        if self.transitions.contains_key(&key) {
            tracing::warn!(key = %key, "property already animated on this overlay; keeping the first transition");
            return;
        }
        let source: RuleHandle = match &self.previous {
            Some(previous) => Rc::new(OverlayReadView(previous.clone())),
            None => self.root.clone(),
        };
        let waker = StepWaker::new(self.scheduler.clone(), self.chain, self.link, key.clone());
        let mut transition = Transition::new(key.clone(), ty, strategy, source, waker);
        transition.init(effects);
        if let Some(target) = &self.target {
            transition.retarget(target.clone(), effects);
        }
        tracing::debug!(key = %key, "transition started");
        self.transitions.insert(key, transition);
    }

    /// Record `next` as target and forward the retarget to every active
    /// transition. Returns `true` when this overlay has nothing to animate
    /// and its link should be removed right away.
    pub(crate) fn transition(&mut self, next: RuleHandle, effects: &mut Vec<Effect>) -> bool {
        self.target = Some(next.clone());
        if self.transitions.is_empty() {
            return true;
        }
        for transition in self.transitions.values_mut() {
            transition.retarget(next.clone(), effects);
        }
        false
    }

    /// Step one transition; `false` when `key` no longer has one (stale)
    pub(crate) fn step(
        &mut self,
        key: &PropertyKey,
        delta: StepDelta,
        effects: &mut Vec<Effect>,
    ) -> bool {
        match self.transitions.get_mut(key) {
            Some(transition) => {
                transition.step(delta, effects);
                true
            }
            None => false,
        }
    }

    /// Remove a finished transition. Returns the keys whose resolution
    /// changed and whether the overlay should now collapse (transitioning
    /// with no transitions left).
    pub(crate) fn finish_transition(
        &mut self,
        key: &PropertyKey,
    ) -> Option<(SmallVec<[PropertyKey; 4]>, bool)> {
        let mut transition = self.transitions.shift_remove(key)?;
        let keys = transition.teardown();
        let collapse = self.target.is_some() && self.transitions.is_empty();
        Some((keys, collapse))
    }

    /// Unconditional teardown: drop every transition and listener without
    /// running any animation logic.
    pub(crate) fn teardown_all(&mut self) {
        for transition in self.transitions.values_mut() {
            transition.teardown();
        }
        self.transitions.clear();
        self.target = None;
    }
}

/// Read-only adapter exposing an overlay cell as a `RuleHandle`.
///
/// The coherence rules forbid implementing the foreign `RuleContent` trait
/// directly on `RefCell<OverlayRule>`, so this in-crate newtype carries the
/// impl and delegates to the overlay behind the shared cell.
pub(crate) struct OverlayReadView(pub(crate) OverlayCell);

impl RuleContent for OverlayReadView {
    fn get_property(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue> {
        self.0.borrow().get_property(ty, key)
    }

    fn property_keys(&self) -> Vec<PropertyKey> {
        self.0.borrow().property_keys()
    }

    fn subscribe(&self, listener: RuleListener) -> Option<RuleListenerId> {
        // Overlays are not directly observable; change events flow through
        // the owning chain.
        let _ = listener;
        None
    }
}
