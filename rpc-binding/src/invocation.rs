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

//! Decoded call descriptor and the per-call context handed to executors.

use crate::descriptor::{keys, port_less_service_key};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;

/// One decoded RPC invocation: method name, arguments and attachments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    method_name: String,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    attachments: HashMap<String, String>,
}

impl Invocation {
    pub fn new(method_name: &str, arguments: Vec<Value>) -> Self {
        Self {
            method_name: method_name.to_string(),
            arguments,
            attachments: HashMap::new(),
        }
    }

    pub fn with_attachment(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attachment(key, value);
        self
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }

    /// Returns the attachment value; empty values count as absent.
    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn set_attachment(&mut self, key: &str, value: impl Into<String>) {
        self.attachments.insert(key.to_string(), value.into());
    }

    /// Returns `true` when the attachment carries the literal `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.attachment(key) == Some("true")
    }

    pub fn is_stub_event(&self) -> bool {
        self.flag(keys::STUB_EVENT)
    }

    pub fn is_callback_invoke(&self) -> bool {
        self.flag(keys::IS_CALLBACK_SERVICE_INVOKE)
    }

    /// Port-less service identity derived from the attachments, matching
    /// [`EndpointDescriptor::service_key`](crate::EndpointDescriptor::service_key).
    pub fn service_key(&self) -> String {
        let interface = self
            .attachment(keys::INTERFACE)
            .or_else(|| self.attachment(keys::PATH))
            .unwrap_or_default();
        port_less_service_key(
            interface,
            self.attachment(keys::GROUP),
            self.attachment(keys::VERSION),
        )
    }
}

/// Per-call context passed explicitly to the executor for the duration of one dispatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CallContext {
    remote_address: SocketAddr,
    local_address: SocketAddr,
}

impl CallContext {
    pub fn new(remote_address: SocketAddr, local_address: SocketAddr) -> Self {
        Self {
            remote_address,
            local_address,
        }
    }

    /// Address of the peer that issued the call.
    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }
}
