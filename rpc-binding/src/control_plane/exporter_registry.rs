/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Concurrent registry of exported service bindings.

use crate::descriptor::EndpointDescriptor;
use crate::invoker::CallExecutor;
use crate::routing::service_key::ServiceKey;
use dashmap::DashMap;
use std::sync::Arc;

/// Maps one [`ServiceKey`] to the executor serving it.
pub(crate) struct ServiceBinding {
    key: ServiceKey,
    descriptor: EndpointDescriptor,
    executor: Arc<dyn CallExecutor>,
}

impl ServiceBinding {
    pub(crate) fn new(
        key: ServiceKey,
        descriptor: EndpointDescriptor,
        executor: Arc<dyn CallExecutor>,
    ) -> Self {
        Self {
            key,
            descriptor,
            executor,
        }
    }

    pub(crate) fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub(crate) fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub(crate) fn executor(&self) -> &Arc<dyn CallExecutor> {
        &self.executor
    }
}

/// Keyed bindings; every mutation is atomic at single-entry granularity.
pub(crate) struct ExporterRegistry {
    bindings: DashMap<ServiceKey, Arc<ServiceBinding>>,
}

impl ExporterRegistry {
    pub(crate) fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Inserts `binding`, returning the binding it replaced.
    pub(crate) fn insert(&self, binding: Arc<ServiceBinding>) -> Option<Arc<ServiceBinding>> {
        self.bindings.insert(binding.key().clone(), binding)
    }

    pub(crate) fn get(&self, key: &ServiceKey) -> Option<Arc<ServiceBinding>> {
        self.bindings.get(key).map(|entry| entry.value().clone())
    }

    /// Removes the entry for `binding`'s key only while it still holds `binding`.
    pub(crate) fn remove_if_current(&self, binding: &Arc<ServiceBinding>) -> bool {
        self.bindings
            .remove_if(binding.key(), |_, current| Arc::ptr_eq(current, binding))
            .is_some()
    }

    /// Undoes an insert of `inserted`, reinstating `previous` when there was one.
    pub(crate) fn roll_back(
        &self,
        inserted: &Arc<ServiceBinding>,
        previous: Option<Arc<ServiceBinding>>,
    ) {
        match previous {
            Some(previous) => {
                if let Some(mut current) = self.bindings.get_mut(inserted.key()) {
                    if Arc::ptr_eq(current.value(), inserted) {
                        *current.value_mut() = previous;
                    }
                }
            }
            None => {
                self.remove_if_current(inserted);
            }
        }
    }

    /// Registered keys, sorted for stable diagnostics.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .bindings
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Removes every binding and returns how many were removed.
    pub(crate) fn clear(&self) -> usize {
        let keys: Vec<ServiceKey> = self.bindings.iter().map(|entry| entry.key().clone()).collect();
        keys.iter()
            .filter(|key| self.bindings.remove(*key).is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::{ExporterRegistry, ServiceBinding};
    use crate::descriptor::EndpointDescriptor;
    use crate::routing::service_key::compute_key;
    use crate::test_support::RecordingExecutor;
    use std::sync::Arc;

    fn binding(path: &str, version: &str) -> Arc<ServiceBinding> {
        Arc::new(ServiceBinding::new(
            compute_key(20880, path, version, ""),
            EndpointDescriptor::new("rpc", "10.0.0.1", 20880, path),
            Arc::new(RecordingExecutor::default()),
        ))
    }

    #[test]
    fn reinsert_replaces_and_stale_remove_is_ignored() {
        let registry = ExporterRegistry::new();
        let first = binding("com.x.Foo", "1.0.0");
        let second = binding("com.x.Foo", "1.0.0");

        assert!(registry.insert(first.clone()).is_none());
        assert!(registry.insert(second.clone()).is_some());
        assert_eq!(registry.len(), 1);

        assert!(!registry.remove_if_current(&first));
        assert!(registry.remove_if_current(&second));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn roll_back_restores_previous_binding() {
        let registry = ExporterRegistry::new();
        let previous = binding("com.x.Foo", "1.0.0");
        let failed = binding("com.x.Foo", "1.0.0");
        let fresh = binding("com.x.Bar", "");

        registry.insert(previous.clone());
        let replaced = registry.insert(failed.clone());
        registry.roll_back(&failed, replaced);

        registry.insert(fresh.clone());
        registry.roll_back(&fresh, None);

        let current = registry.get(previous.key()).expect("previous binding restored");
        assert!(Arc::ptr_eq(&current, &previous));
        assert_eq!(registry.keys(), vec!["com.x.Foo:1.0.0:20880"]);
    }

    #[test]
    fn clear_reports_removed_count() {
        let registry = ExporterRegistry::new();
        registry.insert(binding("com.x.Foo", "1.0.0"));
        registry.insert(binding("com.x.Bar", "1.0.0"));

        assert_eq!(registry.clear(), 2);
        assert!(registry.keys().is_empty());
    }
}
