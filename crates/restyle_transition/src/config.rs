//! Strategy configuration
//!
//! Hosts describe their per-type transition defaults in TOML:
//!
//! ```toml
//! default = { kind = "timed", duration = 500 }
//!
//! [types]
//! color = { kind = "timed", duration = 300, easing = "ease-in-out" }
//! string = { kind = "threshold" }
//! bool = { kind = "instant" }
//! ```
//!
//! `default` seeds every property type; `[types]` entries override it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use restyle_core::PropertyType;

use crate::easing::Easing;
use crate::scheduler::Ticks;
use crate::strategy::{
    Instant, StrategyRegistry, Threshold, Timed, TransitionStrategy, DEFAULT_DURATION,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error("unknown property type `{0}`")]
    UnknownType(String),
}

/// A declarative strategy choice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StrategyKind {
    Instant,
    Threshold { duration: Option<Ticks> },
    Timed { duration: Option<Ticks>, easing: Option<Easing> },
}

impl StrategyKind {
    /// Instantiate the described strategy
    pub fn build(&self) -> Box<dyn TransitionStrategy> {
        match self {
            StrategyKind::Instant => Box::new(Instant::new()),
            StrategyKind::Threshold { duration } => {
                Box::new(Threshold::new(duration.unwrap_or(DEFAULT_DURATION)))
            }
            StrategyKind::Timed { duration, easing } => {
                let mut timed = Timed::new(duration.unwrap_or(DEFAULT_DURATION));
                if let Some(easing) = easing {
                    timed = timed.with_easing(*easing);
                }
                Box::new(timed)
            }
        }
    }
}

/// Per-type transition defaults, loadable from TOML
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Fallback for every property type; `None` leaves unlisted types on
    /// the built-in Instant
    pub default: Option<StrategyKind>,

    /// Overrides keyed by lowercase property type name
    #[serde(default)]
    pub types: FxHashMap<String, StrategyKind>,
}

impl TransitionConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Build the registry this configuration describes
    pub fn build_registry(&self) -> Result<StrategyRegistry, ConfigError> {
        let mut registry = StrategyRegistry::new();
        if let Some(default) = &self.default {
            for ty in [
                PropertyType::Color,
                PropertyType::Float,
                PropertyType::Int,
                PropertyType::Bool,
                PropertyType::Str,
            ] {
                let kind = default.clone();
                registry.register(ty, Box::new(move || kind.build()));
            }
        }
        for (name, kind) in &self.types {
            let ty = PropertyType::parse_name(name)
                .ok_or_else(|| ConfigError::UnknownType(name.clone()))?;
            let kind = kind.clone();
            registry.register(ty, Box::new(move || kind.build()));
        }
        Ok(registry)
    }
}
