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

//! Composite service identity used to look up exported bindings.

use std::fmt::{Display, Formatter};

/// Composite key `[group/]path:version:port`.
///
/// The group segment and its `/` are omitted when the group is empty. The version
/// separator is always present so that keys stay positionally comparable, which makes an
/// unversioned service render as `path::port`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ServiceKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ServiceKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Computes the lookup key for a binding. Export and inbound resolution both derive keys
/// through this function.
pub fn compute_key(port: u16, path: &str, version: &str, group: &str) -> ServiceKey {
    let mut key = String::with_capacity(group.len() + path.len() + version.len() + 8);
    if !group.is_empty() {
        key.push_str(group);
        key.push('/');
    }
    key.push_str(path);
    key.push(':');
    key.push_str(version);
    key.push(':');
    key.push_str(&port.to_string());
    ServiceKey(key)
}
