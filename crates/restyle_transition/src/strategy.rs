//! Interpolation strategies
//!
//! A strategy decides how one property blends from the source rule to the
//! target rule over a rule switch. Strategies are composed into a
//! transition as trait objects and selected per property type through a
//! [`StrategyRegistry`].
//!
//! The three reference behaviors:
//!
//! - [`Instant`] mirrors the source and hands over on the first step; the
//!   universal no-op wrapper for non-animated properties
//! - [`Threshold`] jumps from source to target at half time, for discrete
//!   properties that cannot interpolate
//! - [`Timed`] blends source into target over a duration with an easing
//!   curve

use rustc_hash::FxHashMap;

use restyle_core::PropertyType;

use crate::easing::Easing;
use crate::scheduler::{StepDelta, Ticks};
use crate::transition::StrategyCtx;

/// Default duration of the timed strategies, in scheduler time units
pub const DEFAULT_DURATION: Ticks = 500;

/// Per-property interpolation behavior.
///
/// All outside effects go through the context: values via `set`, future
/// evaluation via `step`/`step_after`, live inputs via the dependency
/// registration calls, and completion via `finish`.
pub trait TransitionStrategy {
    /// Called once when the transition is created
    fn init(&mut self, ctx: &mut StrategyCtx<'_>);

    /// Called when the owning overlay starts transitioning to a new rule
    fn retarget(&mut self, ctx: &mut StrategyCtx<'_>);

    /// Called on each scheduled evaluation
    fn step(&mut self, delta: StepDelta, ctx: &mut StrategyCtx<'_>);
}

/// Mirrors the source value; ignores target and progress.
///
/// Wrapping every property in an `Instant` keeps the engine uniform: a
/// non-animated property still flows through a transition, it just hands
/// authority to the new rule on the first step after a retarget.
#[derive(Debug, Default)]
pub struct Instant;

impl Instant {
    pub fn new() -> Self {
        Self
    }
}

impl TransitionStrategy for Instant {
    fn init(&mut self, ctx: &mut StrategyCtx<'_>) {
        if let Some(value) = ctx.source_value() {
            ctx.set(value);
        }
        // Track the live source so a rule mutation re-mirrors.
        let remote = ctx.key().clone();
        let sub = remote.append("from");
        if let Err(err) = ctx.add_source_dependency(sub, remote) {
            tracing::warn!(%err, "instant mirror input rejected");
        }
    }

    fn retarget(&mut self, ctx: &mut StrategyCtx<'_>) {
        ctx.step();
    }

    fn step(&mut self, delta: StepDelta, ctx: &mut StrategyCtx<'_>) {
        if let Some(value) = ctx.source_value() {
            ctx.set(value);
        }
        if delta != StepDelta::Forced && ctx.has_target() {
            ctx.finish();
        }
    }
}

/// Returns the source value below half progress, the target from the
/// boundary on. A "jump" for properties with no meaningful blend.
#[derive(Debug)]
pub struct Threshold {
    duration: Ticks,
    elapsed: Ticks,
    running: bool,
}

impl Threshold {
    pub fn new(duration: Ticks) -> Self {
        Self {
            duration,
            elapsed: 0,
            running: false,
        }
    }

    pub fn duration(&self) -> Ticks {
        self.duration
    }

    fn progress(&self) -> f32 {
        if self.duration == 0 {
            return 1.0;
        }
        (self.elapsed as f32 / self.duration as f32).clamp(0.0, 1.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl TransitionStrategy for Threshold {
    fn init(&mut self, ctx: &mut StrategyCtx<'_>) {
        if let Some(value) = ctx.source_value() {
            ctx.set(value);
        }
    }

    fn retarget(&mut self, ctx: &mut StrategyCtx<'_>) {
        self.elapsed = 0;
        self.running = true;
        ctx.step();
    }

    fn step(&mut self, delta: StepDelta, ctx: &mut StrategyCtx<'_>) {
        if !self.running {
            if let Some(value) = ctx.source_value() {
                ctx.set(value);
            }
            return;
        }
        if let StepDelta::Elapsed(d) = delta {
            self.elapsed = self.elapsed.saturating_add(d);
        }
        let progress = self.progress();
        let value = if progress < 0.5 {
            ctx.source_value()
        } else {
            ctx.target_value().or_else(|| ctx.source_value())
        };
        if let Some(value) = value {
            ctx.set(value);
        }
        if progress >= 1.0 {
            ctx.finish();
        } else {
            ctx.step();
        }
    }
}

/// Linear-by-default timed blend of the live source and target values.
///
/// Re-exposes the blend endpoints as `<key>.from` / `<key>.to` inputs so a
/// mutation of either rule re-blends mid-flight.
#[derive(Debug)]
pub struct Timed {
    duration: Ticks,
    elapsed: Ticks,
    easing: Easing,
    running: bool,
}

impl Timed {
    pub fn new(duration: Ticks) -> Self {
        Self {
            duration,
            elapsed: 0,
            easing: Easing::Linear,
            running: false,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn duration(&self) -> Ticks {
        self.duration
    }

    fn progress(&self) -> f32 {
        if self.duration == 0 {
            return 1.0;
        }
        (self.elapsed as f32 / self.duration as f32).clamp(0.0, 1.0)
    }
}

impl Default for Timed {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl TransitionStrategy for Timed {
    fn init(&mut self, ctx: &mut StrategyCtx<'_>) {
        if let Some(value) = ctx.source_value() {
            ctx.set(value);
        }
        let remote = ctx.key().clone();
        let sub = remote.append("from");
        if let Err(err) = ctx.add_source_dependency(sub, remote) {
            tracing::warn!(%err, "timed source input rejected");
        }
    }

    fn retarget(&mut self, ctx: &mut StrategyCtx<'_>) {
        self.elapsed = 0;
        self.running = true;
        let remote = ctx.key().clone();
        let sub = remote.append("to");
        // A second retarget replaces the previous endpoint.
        ctx.remove_target_dependency(&sub);
        if let Err(err) = ctx.add_target_dependency(sub, remote) {
            tracing::warn!(%err, "timed target input rejected");
        }
        ctx.step();
    }

    fn step(&mut self, delta: StepDelta, ctx: &mut StrategyCtx<'_>) {
        if !self.running {
            if let Some(value) = ctx.source_value() {
                ctx.set(value);
            }
            return;
        }
        if let StepDelta::Elapsed(d) = delta {
            self.elapsed = self.elapsed.saturating_add(d);
        }
        let progress = self.progress();
        let eased = self.easing.apply(progress);
        match (ctx.source_value(), ctx.target_value()) {
            (Some(from), Some(to)) => ctx.set(from.blend(&to, eased)),
            (None, Some(to)) => ctx.set(to),
            (Some(from), None) => ctx.set(from),
            (None, None) => {}
        }
        if progress >= 1.0 {
            tracing::trace!(key = %ctx.key(), "timed transition complete");
            ctx.finish();
        } else {
            ctx.step();
        }
    }
}

/// Builds a boxed strategy instance
pub type StrategyFactory = Box<dyn Fn() -> Box<dyn TransitionStrategy>>;

/// Per-type default strategies; unknown types fall back to [`Instant`].
#[derive(Default)]
pub struct StrategyRegistry {
    factories: FxHashMap<PropertyType, StrategyFactory>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Factories are boxed closures and cannot be formatted; report the
        // registered property types instead.
        f.debug_struct("StrategyRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the factory for a property type
    pub fn register(&mut self, ty: PropertyType, factory: StrategyFactory) {
        self.factories.insert(ty, factory);
    }

    /// Instantiate the strategy for `ty`
    pub fn make(&self, ty: PropertyType) -> Box<dyn TransitionStrategy> {
        match self.factories.get(&ty) {
            Some(factory) => factory(),
            None => Box::new(Instant::new()),
        }
    }
}
