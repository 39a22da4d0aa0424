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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Parameter and attachment keys understood by the binding layer.
pub mod keys {
    pub const PATH: &str = "path";
    pub const GROUP: &str = "group";
    pub const VERSION: &str = "version";
    pub const INTERFACE: &str = "interface";
    pub const METHODS: &str = "methods";

    /// Protocol version advertised by the peer, e.g. `"2.0.2"`.
    pub const PROTOCOL_VERSION: &str = "protocol.version";

    pub const STUB_EVENT: &str = "stub.event";
    pub const STUB_EVENT_METHODS: &str = "stub.event.methods";
    pub const IS_CALLBACK_SERVICE: &str = "is_callback_service";
    pub const CALLBACK_SERVICE: &str = "callback.service.instid";
    pub const IS_CALLBACK_SERVICE_INVOKE: &str = "_isCallBackServiceInvoke";

    pub const ON_CONNECT: &str = "onconnect";
    pub const ON_DISCONNECT: &str = "ondisconnect";

    pub const CONNECTIONS: &str = "connections";
    pub const LAZY_CONNECT: &str = "lazy";
    pub const SEND_RECONNECT: &str = "send.reconnect";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const CODEC: &str = "codec";
    pub const SERVER: &str = "server";
    pub const CLIENT: &str = "client";
    pub const IS_SERVER: &str = "isserver";
    pub const CHANNEL_READONLY_EVENT_SENT: &str = "channel.readonly.sent";
}

pub const DEFAULT_CODEC: &str = "rpc";
pub const COMPATIBLE_CODEC: &str = "rpc1compatible";
pub const LEGACY_PROTOCOL_VERSION_PREFIX: &str = "1.0.";

///
/// [`EndpointDescriptor`] is an immutable service address plus parameter bag.
///
/// Descriptors are never mutated in place: every `with_*` operation returns an enriched copy.
///
/// # Examples
///
/// ```
/// use rpc_binding::descriptor::keys;
/// use rpc_binding::EndpointDescriptor;
///
/// let descriptor = EndpointDescriptor::new("rpc", "10.0.0.1", 20880, "com.x.Foo")
///     .with_parameter(keys::VERSION, "1.0.0")
///     .with_parameter(keys::GROUP, "g");
///
/// let enriched = descriptor.with_parameter_if_absent(keys::HEARTBEAT, "60000");
///
/// assert_eq!(descriptor.parameter(keys::HEARTBEAT), None);
/// assert_eq!(enriched.parameter(keys::HEARTBEAT), Some("60000"));
/// assert_eq!(enriched.address(), "10.0.0.1:20880");
/// assert_eq!(enriched.service_key(), "g/com.x.Foo:1.0.0");
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    protocol: String,
    host: String,
    port: u16,
    path: String,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

impl EndpointDescriptor {
    pub fn new(protocol: &str, host: &str, port: u16, path: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Returns a copy with `key` set to `value`, replacing any previous value.
    pub fn with_parameter(&self, key: &str, value: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.parameters.insert(key.to_string(), value.into());
        copy
    }

    /// Returns a copy with `key` set to `value` only when `key` has no value yet.
    pub fn with_parameter_if_absent(&self, key: &str, value: impl Into<String>) -> Self {
        if self.parameter(key).is_some() {
            return self.clone();
        }
        self.with_parameter(key, value)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port`, the identity of listening endpoints and shared connections.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Returns the parameter value; empty values count as absent.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameter(key).unwrap_or(default)
    }

    pub fn parameter_bool(&self, key: &str, default: bool) -> bool {
        match self.parameter(key) {
            Some(value) if value.eq_ignore_ascii_case("true") => true,
            Some(value) if value.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    pub fn parameter_u32(&self, key: &str, default: u32) -> u32 {
        self.parameter(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn group(&self) -> Option<&str> {
        self.parameter(keys::GROUP)
    }

    pub fn version(&self) -> Option<&str> {
        self.parameter(keys::VERSION)
    }

    /// Service interface name, falling back to the path.
    pub fn interface(&self) -> &str {
        self.parameter(keys::INTERFACE).unwrap_or(&self.path)
    }

    /// Port-less service identity `[group/]interface[:version]`.
    pub fn service_key(&self) -> String {
        port_less_service_key(self.interface(), self.group(), self.version())
    }
}

pub(crate) fn port_less_service_key(
    interface: &str,
    group: Option<&str>,
    version: Option<&str>,
) -> String {
    let mut key = String::new();
    if let Some(group) = group.filter(|group| !group.is_empty()) {
        key.push_str(group);
        key.push('/');
    }
    key.push_str(interface);
    if let Some(version) = version.filter(|version| !version.is_empty()) {
        key.push(':');
        key.push_str(version);
    }
    key
}

impl Display for EndpointDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            self.protocol, self.host, self.port, self.path
        )?;
        let mut separator = '?';
        for (key, value) in &self.parameters {
            write!(f, "{separator}{key}={value}")?;
            separator = '&';
        }
        Ok(())
    }
}
