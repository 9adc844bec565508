//! Named-event dispatch with priorities.
//!
//! # Responsibilities
//! - Register listeners per event name with a numeric priority
//! - Invoke listeners in priority order with mutable event data
//! - Collect results, or stop at the first non-null one
//!
//! # Design Decisions
//! - Priority 0 runs first; colliding priorities are bumped to the next free slot
//! - A listener returning `false` stops propagation
//! - Listeners run outside the registry lock so they may register others

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Default listener priority.
pub const DEFAULT_PRIORITY: u32 = 1000;

/// Event handler: receives the event name and the mutable payload.
pub type Listener = Arc<dyn Fn(&str, &mut dyn Any) -> Option<Value> + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    events: RwLock<HashMap<String, BTreeMap<u32, Listener>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.events())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event` at the default priority.
    pub fn on<F>(&self, event: &str, listener: F) -> u32
    where
        F: Fn(&str, &mut dyn Any) -> Option<Value> + Send + Sync + 'static,
    {
        self.add_listener(event, listener, DEFAULT_PRIORITY)
    }

    /// Register `listener` for `event`; returns the slot actually used.
    pub fn add_listener<F>(&self, event: &str, listener: F, priority: u32) -> u32
    where
        F: Fn(&str, &mut dyn Any) -> Option<Value> + Send + Sync + 'static,
    {
        let mut events = self.events.write().expect("event registry poisoned");
        let slots = events.entry(event.to_string()).or_default();

        let mut level = priority;
        while slots.contains_key(&level) {
            level += 1;
        }
        slots.insert(level, Arc::new(listener));
        level
    }

    /// Run every listener and collect all results (nulls included).
    ///
    /// Returns `None` when the event has no listeners.
    pub fn trigger(&self, event: &str, data: &mut dyn Any) -> Option<Vec<Option<Value>>> {
        let listeners = self.snapshot(event)?;
        let mut results = Vec::with_capacity(listeners.len());
        for (level, listener) in listeners {
            tracing::trace!(event, level, "Event");
            let result = listener(event, &mut *data);
            let halt = matches!(result, Some(Value::Bool(false)));
            results.push(result);
            if halt {
                break;
            }
        }
        Some(results)
    }

    /// Run listeners until one returns a non-null result.
    pub fn trigger_first(&self, event: &str, data: &mut dyn Any) -> Option<Value> {
        for (level, listener) in self.snapshot(event)? {
            tracing::trace!(event, level, "Event");
            if let Some(result) = listener(event, &mut *data) {
                return Some(result);
            }
        }
        None
    }

    /// Remove every listener of `event`.
    pub fn remove_listener(&self, event: &str) {
        self.events
            .write()
            .expect("event registry poisoned")
            .remove(event);
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events
            .read()
            .expect("event registry poisoned")
            .get(event)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Registered event names with their priority slots, sorted by name.
    pub fn events(&self) -> Vec<(String, Vec<u32>)> {
        let events = self.events.read().expect("event registry poisoned");
        let mut list: Vec<_> = events
            .iter()
            .map(|(name, slots)| (name.clone(), slots.keys().copied().collect()))
            .collect();
        list.sort();
        list
    }

    fn snapshot(&self, event: &str) -> Option<Vec<(u32, Listener)>> {
        let events = self.events.read().expect("event registry poisoned");
        let slots = events.get(event)?;
        Some(slots.iter().map(|(k, v)| (*k, v.clone())).collect())
    }
}
