//! Restyle Core Primitives
//!
//! This crate provides the foundational pieces of the restyle engine:
//!
//! - **Property Keys**: hierarchical dotted paths addressing typed values
//! - **Typed Values**: a closed value set with kind-aware blending
//! - **Rule Contents**: read-only property sources, optionally observable
//!
//! # Example
//!
//! ```rust
//! use restyle_core::{MapRule, PropertyKey, PropertyType, PropertyValue, RuleContent};
//!
//! let rule = MapRule::new().with("opacity", 0.5f32);
//! let key = PropertyKey::new("opacity");
//! assert_eq!(
//!     rule.get_property(PropertyType::Float, &key),
//!     Some(PropertyValue::Float(0.5))
//! );
//! ```

pub mod error;
pub mod key;
pub mod rule;
pub mod value;

pub use error::StyleError;
pub use key::PropertyKey;
pub use rule::{MapRule, RuleContent, RuleHandle, RuleListener, RuleListenerId};
pub use value::{Color, PropertyType, PropertyValue};
