//! Restyle Transition Engine
//!
//! Smoothly interpolates the typed properties of a styled item as its
//! active rule changes, instead of snapping:
//!
//! - **RuleChain**: the ordered overlays currently active for one item
//! - **OverlayRule**: intercepts animated keys, delegates everything else
//! - **Transition**: binds one key to one strategy for one rule switch
//! - **Strategies**: Instant, Threshold, and Timed blends behind one trait
//! - **DependencyBridge**: re-exposes rule sub-properties as live inputs
//! - **TransitionScheduler**: cooperative, single-threaded step queue
//!
//! Whoever decides which rule applies calls `chain.transition(next)`; the
//! host advances the scheduler clock and pumps the chain. Readers go
//! through the tail overlay and never learn whether animation is running.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use restyle_transition::{
//!     MapRule, PropertyKey, PropertyType, PropertyValue, RuleChain, RuleHandle, Timed,
//!     TransitionScheduler,
//! };
//!
//! let scheduler = Rc::new(RefCell::new(TransitionScheduler::new()));
//! let faded: RuleHandle = Rc::new(MapRule::new().with("opacity", 0.0f32));
//! let mut chain = RuleChain::new(faded, scheduler.clone());
//!
//! chain.animate(
//!     PropertyKey::new("opacity"),
//!     PropertyType::Float,
//!     Box::new(Timed::new(100)),
//! );
//! let solid: RuleHandle = Rc::new(MapRule::new().with("opacity", 1.0f32));
//! chain.transition(solid);
//!
//! scheduler.borrow_mut().advance(50);
//! chain.pump();
//! assert_eq!(
//!     chain.get_property(PropertyType::Float, &PropertyKey::new("opacity")),
//!     Some(PropertyValue::Float(0.5))
//! );
//! ```

pub mod bridge;
pub mod chain;
pub mod config;
pub mod easing;
pub mod overlay;
pub mod scheduler;
pub mod strategy;
pub mod transition;

pub use bridge::{BridgeSide, DependencyBridge};
pub use chain::{ChangeListener, ChangeListenerId, LinkId, RuleChain};
pub use config::{ConfigError, StrategyKind, TransitionConfig};
pub use easing::Easing;
pub use overlay::{OverlayCell, OverlayRule};
pub use scheduler::{ChainId, SchedulerHandle, StepDelta, StepFire, Ticks, TransitionScheduler};
pub use strategy::{
    Instant, StrategyFactory, StrategyRegistry, Threshold, Timed, TransitionStrategy,
    DEFAULT_DURATION,
};
pub use transition::{StepWaker, StrategyCtx, Transition};

// The core primitives, re-exported for engine users.
pub use restyle_core::{
    Color, MapRule, PropertyKey, PropertyType, PropertyValue, RuleContent, RuleHandle,
    RuleListener, RuleListenerId, StyleError,
};
