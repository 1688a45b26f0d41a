//! Rule contents
//!
//! A rule is a read-only, typed set of property values addressed by key.
//! Rules may optionally be observable: a live rule (say, one derived from
//! the window geometry) notifies listeners when a value changes, and
//! downstream animation re-evaluates.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::key::PropertyKey;
use crate::value::{PropertyType, PropertyValue};

new_key_type! {
    /// Identifier of one registered rule listener
    pub struct RuleListenerId;
}

/// Callback invoked with the key whose value changed
pub type RuleListener = Rc<dyn Fn(&PropertyKey)>;

/// Shared handle to a rule content
pub type RuleHandle = Rc<dyn RuleContent>;

/// A read-only, typed property source.
///
/// Reads are lenient: a missing key or a key holding a differently-typed
/// value both read as `None`. Observability is opt-in; the default
/// implementation accepts no listeners.
pub trait RuleContent {
    /// Read the value for `key` if present with kind `ty`
    fn get_property(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue>;

    /// Keys this rule currently provides
    fn property_keys(&self) -> Vec<PropertyKey> {
        Vec::new()
    }

    /// Register a change listener; `None` if this rule is not observable
    fn subscribe(&self, listener: RuleListener) -> Option<RuleListenerId> {
        let _ = listener;
        None
    }

    /// Remove a previously registered listener; unknown ids are a no-op
    fn unsubscribe(&self, id: RuleListenerId) {
        let _ = id;
    }
}

/// A concrete mutable, observable rule backed by a hash map.
#[derive(Default)]
pub struct MapRule {
    values: RefCell<FxHashMap<PropertyKey, PropertyValue>>,
    listeners: RefCell<SlotMap<RuleListenerId, RuleListener>>,
}

impl MapRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style population
    pub fn with(self, key: impl Into<PropertyKey>, value: impl Into<PropertyValue>) -> Self {
        self.values.borrow_mut().insert(key.into(), value.into());
        self
    }

    /// Insert or replace a value and notify listeners
    pub fn set_property(&self, key: impl Into<PropertyKey>, value: impl Into<PropertyValue>) {
        let key = key.into();
        let value = value.into();
        tracing::trace!(key = %key, "rule value set");
        self.values.borrow_mut().insert(key.clone(), value);
        self.notify(&key);
    }

    /// Drop a value and notify listeners; absent keys are a no-op
    pub fn remove_property(&self, key: &PropertyKey) {
        if self.values.borrow_mut().remove(key).is_some() {
            self.notify(key);
        }
    }

    fn notify(&self, key: &PropertyKey) {
        // Clone the callbacks out so a listener may re-subscribe without
        // hitting the borrow.
        let listeners: SmallVec<[RuleListener; 4]> =
            self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(key);
        }
    }
}

impl RuleContent for MapRule {
    fn get_property(&self, ty: PropertyType, key: &PropertyKey) -> Option<PropertyValue> {
        self.values
            .borrow()
            .get(key)
            .filter(|v| v.kind() == ty)
            .cloned()
    }

    fn property_keys(&self) -> Vec<PropertyKey> {
        self.values.borrow().keys().cloned().collect()
    }

    fn subscribe(&self, listener: RuleListener) -> Option<RuleListenerId> {
        Some(self.listeners.borrow_mut().insert(listener))
    }

    fn unsubscribe(&self, id: RuleListenerId) {
        self.listeners.borrow_mut().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn reads_are_typed() {
        let rule = MapRule::new().with("width", 10.0f32);
        let key = PropertyKey::new("width");
        assert_eq!(
            rule.get_property(PropertyType::Float, &key),
            Some(PropertyValue::Float(10.0))
        );
        assert_eq!(rule.get_property(PropertyType::Int, &key), None);
        assert_eq!(rule.get_property(PropertyType::Float, &PropertyKey::new("height")), None);
    }

    #[test]
    fn listeners_fire_on_set_and_remove() {
        let rule = MapRule::new();
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        let id = rule
            .subscribe(Rc::new(move |_key| seen.set(seen.get() + 1)))
            .unwrap();

        rule.set_property("width", 1.0f32);
        rule.remove_property(&PropertyKey::new("width"));
        assert_eq!(hits.get(), 2);

        rule.unsubscribe(id);
        rule.set_property("width", 2.0f32);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn double_unsubscribe_is_a_no_op() {
        let rule = MapRule::new();
        let id = rule.subscribe(Rc::new(|_| {})).unwrap();
        rule.unsubscribe(id);
        rule.unsubscribe(id);
    }

    #[test]
    fn removing_an_absent_key_does_not_notify() {
        let rule = MapRule::new();
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        rule.subscribe(Rc::new(move |_| seen.set(seen.get() + 1)));
        rule.remove_property(&PropertyKey::new("ghost"));
        assert_eq!(hits.get(), 0);
    }
}
