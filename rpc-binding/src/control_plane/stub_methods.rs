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

//! Declared stub event methods per service.

use dashmap::DashMap;
use std::collections::BTreeSet;

/// Event method names a service declared for its stub path, keyed by the port-less
/// service key (`[group/]interface[:version]`).
pub(crate) struct StubMethodRegistry {
    methods: DashMap<String, BTreeSet<String>>,
}

impl StubMethodRegistry {
    pub(crate) fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    /// Records the comma-separated `declared` methods for `service_key`.
    ///
    /// Returns `false` when the list holds no method name, leaving the registry unchanged.
    pub(crate) fn record(&self, service_key: &str, declared: &str) -> bool {
        let methods = parse_method_list(declared);
        if methods.is_empty() {
            return false;
        }
        self.methods.insert(service_key.to_string(), methods);
        true
    }

    /// `None` when the service declared no event methods at all.
    pub(crate) fn allows(&self, service_key: &str, method: &str) -> Option<bool> {
        self.methods
            .get(service_key)
            .map(|methods| methods.contains(method))
    }

    pub(crate) fn clear(&self) {
        self.methods.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.methods.len()
    }
}

/// Splits a comma-separated method list, ignoring blanks and surrounding whitespace.
pub(crate) fn parse_method_list(declared: &str) -> BTreeSet<String> {
    declared
        .split(',')
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_method_list, StubMethodRegistry};

    #[test]
    fn declared_methods_gate_by_name() {
        let registry = StubMethodRegistry::new();

        assert!(registry.record("g/com.x.Foo:1.0.0", "onConnect, onDisconnect"));

        assert_eq!(registry.allows("g/com.x.Foo:1.0.0", "onConnect"), Some(true));
        assert_eq!(registry.allows("g/com.x.Foo:1.0.0", "onOther"), Some(false));
        assert_eq!(registry.allows("com.x.Bar", "onConnect"), None);
    }

    #[test]
    fn blank_declaration_is_not_recorded() {
        let registry = StubMethodRegistry::new();

        assert!(!registry.record("com.x.Foo", " , "));
        assert_eq!(registry.len(), 0);
        assert!(parse_method_list("").is_empty());
    }
}
