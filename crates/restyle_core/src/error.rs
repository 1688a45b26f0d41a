//! Engine fault catalogue
//!
//! All faults here are local programmer-contract violations; the engine
//! performs no I/O, so there is no transient error class. The fatal
//! contract faults ([`StyleError::TypeMismatch`], [`StyleError::SoleLink`])
//! are raised by panicking with the formatted error; the registration
//! faults are returned as `Err` at the call site.

use thiserror::Error;

use crate::key::PropertyKey;
use crate::value::PropertyType;

#[derive(Debug, Error, PartialEq)]
pub enum StyleError {
    /// A read hit an animated override whose recorded type differs from the
    /// requested one. Only the engine issues these reads, so a mismatch is a
    /// logic error, not bad input.
    #[error("type mismatch for `{key}`: override recorded {recorded:?}, read requested {requested:?}")]
    TypeMismatch {
        key: PropertyKey,
        recorded: PropertyType,
        requested: PropertyType,
    },

    /// Direct removal of the only link of a chain. Tearing a chain down to
    /// one link is only legal through `destroy`.
    #[error("cannot remove the only link of a rule chain")]
    SoleLink,

    /// A dependency sub-key is already in use on the same transition.
    #[error("dependency key `{key}` is already registered on this transition")]
    DuplicateDependency { key: PropertyKey },

    /// A target-side dependency was requested before any target was set.
    #[error("dependency on `{key}` requires a transition target")]
    MissingTarget { key: PropertyKey },
}
