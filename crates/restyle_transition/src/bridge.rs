//! Dependency bridges
//!
//! A strategy may need sub-properties of the source or target rule as live
//! inputs (the blend endpoints, a geometry value the rule derives from the
//! window, ...). A bridge maps a local sub-key to a forwarded property of
//! one rule and re-exposes it through the owning overlay under that
//! sub-key. When the bridged rule is observable, the bridge owns one
//! listener per entry; the listener schedules a forced out-of-band step so
//! the strategy re-evaluates.

use std::rc::Rc;

use indexmap::IndexMap;

use restyle_core::{PropertyKey, PropertyType, PropertyValue, RuleHandle, RuleListenerId, StyleError};

use crate::transition::StepWaker;

/// Which end of a transition a bridge forwards for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeSide {
    Source,
    Target,
}

struct ForwardedProperty {
    rule: RuleHandle,
    remote: PropertyKey,
    listener: Option<RuleListenerId>,
}

/// Sub-key to forwarded-property map for one side of one transition.
///
/// Entries keep registration order; the first registration for a contested
/// key wins when overlays consult bridges (see `OverlayRule`).
pub struct DependencyBridge {
    side: BridgeSide,
    entries: IndexMap<PropertyKey, ForwardedProperty>,
}

impl DependencyBridge {
    pub(crate) fn new(side: BridgeSide) -> Self {
        Self {
            side,
            entries: IndexMap::new(),
        }
    }

    pub fn side(&self) -> BridgeSide {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `key` is re-exposed by this bridge
    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Re-exposed sub-keys, in registration order
    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.entries.keys()
    }

    /// Register `sub` as a forward of `remote` on `rule`.
    ///
    /// Installs a live listener when the rule is observable; the listener
    /// belongs to this entry alone and is removed exactly once, on entry
    /// removal or teardown.
    pub(crate) fn add(
        &mut self,
        sub: PropertyKey,
        rule: RuleHandle,
        remote: PropertyKey,
        waker: &StepWaker,
    ) -> Result<(), StyleError> {
        if self.entries.contains_key(&sub) {
            return Err(StyleError::DuplicateDependency { key: sub });
        }
        let watched = remote.clone();
        let waker = waker.clone();
        let listener = rule.subscribe(Rc::new(move |changed: &PropertyKey| {
            if *changed == watched {
                waker.wake();
            }
        }));
        tracing::trace!(side = ?self.side, key = %sub, remote = %remote, "dependency added");
        self.entries.insert(
            sub,
            ForwardedProperty {
                rule,
                remote,
                listener,
            },
        );
        Ok(())
    }

    /// Unregister `sub`; returns whether an entry was removed.
    pub(crate) fn remove(&mut self, sub: &PropertyKey) -> bool {
        match self.entries.shift_remove(sub) {
            Some(entry) => {
                if let Some(id) = entry.listener {
                    entry.rule.unsubscribe(id);
                }
                tracing::trace!(side = ?self.side, key = %sub, "dependency removed");
                true
            }
            None => false,
        }
    }

    /// Read the forwarded value for a re-exposed key
    pub fn forward(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue> {
        let entry = self.entries.get(key)?;
        entry.rule.get_property(ty, &entry.remote)
    }

    /// Drop every entry, unsubscribing each listener
    pub(crate) fn clear(&mut self) {
        for (_key, entry) in self.entries.drain(..) {
            if let Some(id) = entry.listener {
                entry.rule.unsubscribe(id);
            }
        }
    }
}
