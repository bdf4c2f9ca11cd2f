//! Pushed data values with change detection.

use crate::context::{PluginContext, ServiceHandle};
use crate::error::HostResult;
use crate::event_bus::{EventBus, SubscriptionHandle};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const VALUES_CHANGED: &str = "values-changed";

/// Keys whose value actually changed, with their new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuesChanged {
    pub changed: BTreeMap<String, String>,
}

/// Merge `updates` into `store`, returning only entries that differ from what was stored.
pub(crate) fn merge_changes(
    store: &mut BTreeMap<String, String>,
    updates: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut changed = BTreeMap::new();
    for (key, value) in updates {
        if store.get(&key) == Some(&value) {
            continue;
        }
        store.insert(key.clone(), value.clone());
        changed.insert(key, value);
    }
    changed
}

/// Latest value per key; no history.
pub struct ReceiveDataService {
    values: Mutex<BTreeMap<String, String>>,
    bus: EventBus<ValuesChanged>,
}

impl Default for ReceiveDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveDataService {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(BTreeMap::new()),
            bus: EventBus::new(),
        }
    }

    /// Merge values and notify subscribers of the delta, if any. Returns the delta.
    pub fn set_values(&self, updates: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut values = self.values.lock().unwrap();
        let changed = merge_changes(&mut values, updates);
        if !changed.is_empty() {
            tracing::debug!(keys = changed.len(), "Data values changed");
            self.bus.publish(
                VALUES_CHANGED,
                &ValuesChanged {
                    changed: changed.clone(),
                },
            );
        }
        changed
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        self.values.lock().unwrap().clone()
    }
}

impl ServiceHandle<ReceiveDataService> {
    pub fn on_values_changed<F>(&self, handler: F) -> HostResult<SubscriptionHandle>
    where
        F: Fn(&PluginContext, &ValuesChanged) + Send + Sync + 'static,
    {
        self.subscribe(&self.service().bus, VALUES_CHANGED, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn observe(service: &ReceiveDataService) -> Arc<Mutex<Vec<BTreeMap<String, String>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        service.bus.subscribe(VALUES_CHANGED, move |event: &ValuesChanged| {
            sink.lock().unwrap().push(event.changed.clone())
        });
        seen
    }

    #[test]
    fn delta_contains_only_changed_keys() {
        let service = ReceiveDataService::new();
        let seen = observe(&service);

        service.set_values(map(&[("a", "1"), ("b", "2")]));
        let delta = service.set_values(map(&[("a", "1"), ("b", "3"), ("c", "4")]));

        assert_eq!(delta, map(&[("b", "3"), ("c", "4")]));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![map(&[("a", "1"), ("b", "2")]), map(&[("b", "3"), ("c", "4")])]
        );
        assert_eq!(service.values(), map(&[("a", "1"), ("b", "3"), ("c", "4")]));
    }

    #[test]
    fn unchanged_values_publish_nothing() {
        let service = ReceiveDataService::new();
        service.set_values(map(&[("a", "1")]));
        let seen = observe(&service);

        assert!(service.set_values(map(&[("a", "1")])).is_empty());
        assert!(service.set_values(BTreeMap::new()).is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn delta_matches_sequence_of_updates() {
        let service = ReceiveDataService::new();
        let updates = [
            map(&[("k", "x")]),
            map(&[("k", "x"), ("j", "1")]),
            map(&[("k", "y")]),
            map(&[("k", "x")]),
            map(&[("j", "1")]),
        ];
        let mut shadow: BTreeMap<String, String> = BTreeMap::new();
        for update in updates {
            let expected: BTreeMap<String, String> = update
                .iter()
                .filter(|(k, v)| shadow.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            shadow.extend(update.clone());
            assert_eq!(service.set_values(update), expected);
        }
        assert_eq!(service.value("k").as_deref(), Some("x"));
        assert_eq!(service.value("missing"), None);
    }
}
