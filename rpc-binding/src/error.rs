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

//! Error taxonomy for export, refer, dispatch and shutdown.

use std::net::SocketAddr;
use thiserror::Error;

/// Failure reported by a transport implementation (bind, connect, send, close).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised by the binding layer.
///
/// Configuration/registration errors (`UnsupportedTransport`, `EndpointBindFailed`,
/// `ConnectFailed`) are returned to the administrative caller of `export`/`refer`.
/// Per-call routing and execution errors are returned as the call's result.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("unsupported {role} transport: {name}, supported transports: [{supported}]")]
    UnsupportedTransport {
        role: &'static str,
        name: String,
        supported: String,
    },

    #[error("failed to bind listening endpoint {descriptor}: {source}")]
    EndpointBindFailed {
        descriptor: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to connect to {descriptor}: {source}")]
    ConnectFailed {
        descriptor: String,
        #[source]
        source: TransportError,
    },

    #[error(
        "no exported service for key {key} in [{}], may be version or group mismatch, \
         channel: consumer {remote} --> provider {local}",
        .known_keys.join(", ")
    )]
    ServiceNotFound {
        key: String,
        known_keys: Vec<String>,
        remote: SocketAddr,
        local: SocketAddr,
    },

    #[error("method {method} is not declared by callback service {key}, call ignored")]
    CallbackMethodRejected { key: String, method: String },

    #[error("method {method} is not a declared stub event of {service}, call ignored")]
    StubMethodRejected { service: String, method: String },

    #[error("unsupported request from {remote} to {local}: {message}")]
    MalformedCallDescriptor {
        message: String,
        remote: SocketAddr,
        local: SocketAddr,
    },

    #[error("service failure: {0}")]
    ServiceFailure(String),

    #[error("request on closed connection to {address}")]
    ConnectionClosed {
        address: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("invoker for {service} at {address} is destroyed")]
    InvokerDestroyed { service: String, address: String },

    #[error("protocol is destroyed, {operation} rejected")]
    ProtocolDestroyed { operation: &'static str },
}

#[cfg(test)]
mod tests {
    use super::{RpcError, TransportError};
    use std::error::Error;

    #[test]
    fn service_not_found_lists_attempted_and_known_keys() {
        let error = RpcError::ServiceNotFound {
            key: "g/com.x.Foo:1.0.0:20880".to_string(),
            known_keys: vec![
                "com.x.Bar::20880".to_string(),
                "com.x.Foo:2.0.0:20880".to_string(),
            ],
            remote: "10.0.0.2:50123".parse().expect("valid remote"),
            local: "10.0.0.1:20880".parse().expect("valid local"),
        };

        let rendered = error.to_string();
        assert!(rendered.contains("g/com.x.Foo:1.0.0:20880"));
        assert!(rendered.contains("[com.x.Bar::20880, com.x.Foo:2.0.0:20880]"));
        assert!(rendered.contains("10.0.0.2:50123"));
    }

    #[test]
    fn bind_failure_exposes_transport_source() {
        let error = RpcError::EndpointBindFailed {
            descriptor: "rpc://10.0.0.1:20880/com.x.Foo".to_string(),
            source: TransportError::new("address in use"),
        };

        assert_eq!(
            error.source().map(|source| source.to_string()),
            Some("address in use".to_string())
        );
    }
}
