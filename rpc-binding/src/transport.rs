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

//! Collaborator interfaces consumed from the transport layer.
//!
//! Framing, codecs and sockets live behind these traits. The binding layer only binds
//! listening endpoints, opens connections, and receives decoded messages through an
//! [`ExchangeHandler`].

use crate::descriptor::EndpointDescriptor;
use crate::error::{RpcError, TransportError};
use crate::invocation::Invocation;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// A message decoded by the transport for one inbound request.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    Call(Invocation),
    /// Anything that is not a call descriptor; `kind` describes what arrived.
    Unrecognized { kind: String },
}

/// Result of dispatching one inbound call.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Value to encode into the reply.
    Reply(Value),
    /// The call was intentionally not executed; no error reply is sent.
    Dropped(RpcError),
}

impl DispatchOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, DispatchOutcome::Dropped(_))
    }
}

/// One accepted or opened transport connection, as seen by inbound dispatch.
pub trait Channel: Send + Sync {
    /// Descriptor the channel was bound or connected with.
    fn descriptor(&self) -> &EndpointDescriptor;
    fn local_address(&self) -> SocketAddr;
    fn remote_address(&self) -> SocketAddr;
}

/// Inbound entry point the transport calls for requests and connection lifecycle events.
#[async_trait]
pub trait ExchangeHandler: Send + Sync {
    /// Handles a two-way request and returns the reply outcome.
    async fn reply(
        &self,
        channel: &dyn Channel,
        message: InboundMessage,
    ) -> Result<DispatchOutcome, RpcError>;

    /// Handles a one-way message.
    async fn received(&self, channel: &dyn Channel, message: InboundMessage)
        -> Result<(), RpcError>;

    async fn connected(&self, channel: &dyn Channel);

    async fn disconnected(&self, channel: &dyn Channel);
}

/// A bound listening endpoint for one local address.
#[async_trait]
pub trait Server: Send + Sync {
    /// Descriptor currently in effect, including the last reset.
    fn descriptor(&self) -> EndpointDescriptor;

    /// Reconfigures the endpoint in place with the parameters of `descriptor`.
    fn reset(&self, descriptor: &EndpointDescriptor);

    /// Closes the endpoint, allowing in-flight requests up to `timeout` to finish.
    async fn close(&self, timeout: Duration) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;
}

/// One outbound transport connection.
#[async_trait]
pub trait Client: Send + Sync {
    fn descriptor(&self) -> &EndpointDescriptor;

    async fn request(&self, invocation: Invocation) -> Result<Value, RpcError>;

    async fn close(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn is_closed(&self) -> bool;
}

/// A named transport implementation.
#[async_trait]
pub trait Transporter: Send + Sync {
    async fn bind(
        &self,
        descriptor: &EndpointDescriptor,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Result<Arc<dyn Server>, TransportError>;

    async fn connect(
        &self,
        descriptor: &EndpointDescriptor,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Result<Arc<dyn Client>, TransportError>;
}

/// Named transport lookup.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transporters: HashMap<String, Arc<dyn Transporter>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(mut self, name: &str, transporter: Arc<dyn Transporter>) -> Self {
        self.register(name, transporter);
        self
    }

    pub fn register(&mut self, name: &str, transporter: Arc<dyn Transporter>) {
        self.transporters.insert(name.to_string(), transporter);
    }

    pub fn has_transport(&self, name: &str) -> bool {
        self.transporters.contains_key(name)
    }

    pub fn supported_transports(&self) -> BTreeSet<String> {
        self.transporters.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transporter>> {
        self.transporters.get(name).cloned()
    }

    /// Looks up `name` or fails with [`RpcError::UnsupportedTransport`].
    pub(crate) fn require(
        &self,
        role: &'static str,
        name: &str,
    ) -> Result<Arc<dyn Transporter>, RpcError> {
        self.get(name).ok_or_else(|| RpcError::UnsupportedTransport {
            role,
            name: name.to_string(),
            supported: self
                .supported_transports()
                .into_iter()
                .collect::<Vec<_>>()
                .join(" "),
        })
    }
}

impl Debug for TransportRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.supported_transports())
            .finish()
    }
}
