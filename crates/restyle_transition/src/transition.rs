//! Transitions
//!
//! A `Transition` binds one property key to one strategy instance for the
//! lifetime of one rule switch. It owns the cached typed override the
//! overlay serves, the source read view the interpolation starts from, and
//! the two dependency bridges.
//!
//! Strategies never touch the chain directly. Every strategy call receives
//! a [`StrategyCtx`]: reads go straight through it, while mutations of the
//! outside world (change notifications, step requests, completion) are
//! recorded as effects the chain applies once the call returns.

use smallvec::SmallVec;

use restyle_core::{PropertyKey, PropertyType, PropertyValue, RuleHandle, StyleError};

use crate::bridge::{BridgeSide, DependencyBridge};
use crate::scheduler::{ChainId, SchedulerHandle, StepDelta, Ticks};
use crate::chain::LinkId;
use crate::strategy::TransitionStrategy;

/// Deferred outcome of a strategy call, applied by the owning chain
pub(crate) enum Effect {
    /// The observable value for a key changed
    Changed(PropertyKey),
    /// The transition wants a future step
    Schedule { key: PropertyKey, delay: Ticks },
    /// The strategy declared itself done
    Finished { key: PropertyKey },
}

/// Wakes a transition with a forced out-of-band step.
///
/// Held by bridge listeners; safe to fire late — a wake for a removed link
/// or finished transition drains to nothing.
#[derive(Clone)]
pub struct StepWaker {
    scheduler: SchedulerHandle,
    chain: ChainId,
    link: LinkId,
    key: PropertyKey,
}

impl StepWaker {
    pub(crate) fn new(
        scheduler: SchedulerHandle,
        chain: ChainId,
        link: LinkId,
        key: PropertyKey,
    ) -> Self {
        Self {
            scheduler,
            chain,
            link,
            key,
        }
    }

    pub fn wake(&self) {
        self.scheduler
            .borrow_mut()
            .request_forced(self.chain, self.link, self.key.clone());
    }
}

/// The live binding of one property key to one interpolation strategy.
pub struct Transition {
    key: PropertyKey,
    ty: PropertyType,
    strategy: Box<dyn TransitionStrategy>,
    value: Option<PropertyValue>,
    source: RuleHandle,
    target: Option<RuleHandle>,
    source_bridge: DependencyBridge,
    target_bridge: DependencyBridge,
    waker: StepWaker,
}

impl Transition {
    pub(crate) fn new(
        key: PropertyKey,
        ty: PropertyType,
        strategy: Box<dyn TransitionStrategy>,
        source: RuleHandle,
        waker: StepWaker,
    ) -> Self {
        Self {
            key,
            ty,
            strategy,
            value: None,
            source,
            target: None,
            source_bridge: DependencyBridge::new(BridgeSide::Source),
            target_bridge: DependencyBridge::new(BridgeSide::Target),
            waker,
        }
    }

    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The type recorded for the cached override pair
    pub fn recorded_type(&self) -> PropertyType {
        self.ty
    }

    /// The cached override value, if the strategy has produced one
    pub fn cached(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    /// Whether this transition declares `key` as a required input
    pub(crate) fn declares_input(&self, key: &PropertyKey) -> bool {
        self.source_bridge.contains(key) || self.target_bridge.contains(key)
    }

    /// Forwarded read for a bridge-exposed key; source side wins
    pub(crate) fn forward(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue> {
        self.source_bridge
            .forward(ty, key)
            .or_else(|| self.target_bridge.forward(ty, key))
    }

    /// Keys this transition currently re-exposes through its bridges
    pub(crate) fn input_keys(&self) -> SmallVec<[PropertyKey; 4]> {
        self.source_bridge
            .keys()
            .chain(self.target_bridge.keys())
            .cloned()
            .collect()
    }

    pub(crate) fn init(&mut self, effects: &mut Vec<Effect>) {
        let Self {
            key,
            ty,
            strategy,
            value,
            source,
            target,
            source_bridge,
            target_bridge,
            waker,
        } = self;
        let mut ctx = StrategyCtx {
            key,
            ty: *ty,
            source,
            target: target.as_ref(),
            value,
            source_bridge,
            target_bridge,
            waker,
            effects,
        };
        strategy.init(&mut ctx);
    }

    pub(crate) fn retarget(&mut self, next: RuleHandle, effects: &mut Vec<Effect>) {
        tracing::debug!(key = %self.key, "transition retargeted");
        self.target = Some(next);
        let Self {
            key,
            ty,
            strategy,
            value,
            source,
            target,
            source_bridge,
            target_bridge,
            waker,
        } = self;
        let mut ctx = StrategyCtx {
            key,
            ty: *ty,
            source,
            target: target.as_ref(),
            value,
            source_bridge,
            target_bridge,
            waker,
            effects,
        };
        strategy.retarget(&mut ctx);
    }

    pub(crate) fn step(&mut self, delta: StepDelta, effects: &mut Vec<Effect>) {
        let Self {
            key,
            ty,
            strategy,
            value,
            source,
            target,
            source_bridge,
            target_bridge,
            waker,
        } = self;
        let mut ctx = StrategyCtx {
            key,
            ty: *ty,
            source,
            target: target.as_ref(),
            value,
            source_bridge,
            target_bridge,
            waker,
            effects,
        };
        strategy.step(delta, &mut ctx);
    }

    /// Unregister both bridges; returns every key that stops resolving
    /// through this transition (the override plus re-exposed inputs).
    pub(crate) fn teardown(&mut self) -> SmallVec<[PropertyKey; 4]> {
        let mut keys = self.input_keys();
        if self.value.is_some() {
            keys.push(self.key.clone());
        }
        self.source_bridge.clear();
        self.target_bridge.clear();
        keys
    }
}

/// The callback surface a strategy sees.
///
/// Borrowed from the owning transition for the duration of one strategy
/// call; reads are live, writes become effects applied afterwards.
pub struct StrategyCtx<'a> {
    key: &'a PropertyKey,
    ty: PropertyType,
    source: &'a RuleHandle,
    target: Option<&'a RuleHandle>,
    value: &'a mut Option<PropertyValue>,
    source_bridge: &'a mut DependencyBridge,
    target_bridge: &'a mut DependencyBridge,
    waker: &'a StepWaker,
    effects: &'a mut Vec<Effect>,
}

impl StrategyCtx<'_> {
    /// The property key this transition overrides
    pub fn key(&self) -> &PropertyKey {
        self.key
    }

    /// The recorded type of the override
    pub fn property_type(&self) -> PropertyType {
        self.ty
    }

    /// Read the property from the source view (whatever was authoritative
    /// immediately before the owning overlay existed)
    pub fn source_value(&self) -> Option<PropertyValue> {
        self.source.get_property(self.ty, self.key)
    }

    /// Read the property from the target rule, if transitioning
    pub fn target_value(&self) -> Option<PropertyValue> {
        self.target
            .and_then(|target| target.get_property(self.ty, self.key))
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// The current cached override
    pub fn current_value(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    /// Push a new interpolated value. Fires a change notification only when
    /// the value actually changed.
    pub fn set(&mut self, value: PropertyValue) {
        debug_assert_eq!(
            value.kind(),
            self.ty,
            "strategy produced a value of the wrong kind"
        );
        if self.value.as_ref() == Some(&value) {
            return;
        }
        tracing::trace!(key = %self.key, ?value, "override updated");
        *self.value = Some(value);
        self.effects.push(Effect::Changed(self.key.clone()));
    }

    /// Request a step at the next opportunity
    pub fn step(&mut self) {
        self.step_after(0);
    }

    /// Request a step no earlier than `delay` time units from now
    pub fn step_after(&mut self, delay: Ticks) {
        self.effects.push(Effect::Schedule {
            key: self.key.clone(),
            delay,
        });
    }

    /// Declare this transition done. The engine removes it, readers
    /// re-resolve through the rules underneath, and the overlay collapses
    /// once its last transition is gone.
    pub fn finish(&mut self) {
        self.effects.push(Effect::Finished {
            key: self.key.clone(),
        });
    }

    /// Re-expose `remote` of the source view under `sub`
    pub fn add_source_dependency(
        &mut self,
        sub: PropertyKey,
        remote: PropertyKey,
    ) -> Result<(), StyleError> {
        self.ensure_unused(&sub)?;
        self.source_bridge
            .add(sub.clone(), self.source.clone(), remote, self.waker)?;
        self.effects.push(Effect::Changed(sub));
        Ok(())
    }

    /// Re-expose `remote` of the target rule under `sub`
    pub fn add_target_dependency(
        &mut self,
        sub: PropertyKey,
        remote: PropertyKey,
    ) -> Result<(), StyleError> {
        let Some(target) = self.target else {
            return Err(StyleError::MissingTarget { key: sub });
        };
        self.ensure_unused(&sub)?;
        self.target_bridge
            .add(sub.clone(), target.clone(), remote, self.waker)?;
        self.effects.push(Effect::Changed(sub));
        Ok(())
    }

    /// Drop a source-side forward; unknown keys are a no-op
    pub fn remove_source_dependency(&mut self, sub: &PropertyKey) {
        if self.source_bridge.remove(sub) {
            self.effects.push(Effect::Changed(sub.clone()));
        }
    }

    /// Drop a target-side forward; unknown keys are a no-op
    pub fn remove_target_dependency(&mut self, sub: &PropertyKey) {
        if self.target_bridge.remove(sub) {
            self.effects.push(Effect::Changed(sub.clone()));
        }
    }

    fn ensure_unused(&self, sub: &PropertyKey) -> Result<(), StyleError> {
        if self.source_bridge.contains(sub) || self.target_bridge.contains(sub) {
            return Err(StyleError::DuplicateDependency { key: sub.clone() });
        }
        Ok(())
    }
}
