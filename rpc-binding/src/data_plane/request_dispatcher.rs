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

//! Inbound call dispatch and connection lifecycle events.

use crate::control_plane::exporter_registry::ExporterRegistry;
use crate::control_plane::stub_methods::{parse_method_list, StubMethodRegistry};
use crate::descriptor::{keys, EndpointDescriptor};
use crate::error::RpcError;
use crate::invocation::{CallContext, Invocation};
use crate::observability::{events, fields};
use crate::routing::resolver::resolve_binding;
use crate::transport::{Channel, DispatchOutcome, ExchangeHandler, InboundMessage};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "request_dispatcher";

struct FormattedCallFields {
    remote: String,
    local: String,
    target: String,
}

impl FormattedCallFields {
    fn new(channel: &dyn Channel, invocation: &Invocation) -> Self {
        Self {
            remote: channel.remote_address().to_string(),
            local: channel.local_address().to_string(),
            target: fields::format_call_target(invocation),
        }
    }
}

/// Routes decoded calls to exported executors.
///
/// Registered with every bound endpoint and opened connection as its [`ExchangeHandler`].
pub struct RequestDispatcher {
    exporters: Arc<ExporterRegistry>,
    stub_methods: Arc<StubMethodRegistry>,
}

impl RequestDispatcher {
    pub(crate) fn new(
        exporters: Arc<ExporterRegistry>,
        stub_methods: Arc<StubMethodRegistry>,
    ) -> Self {
        Self {
            exporters,
            stub_methods,
        }
    }

    /// Resolves and executes one call.
    ///
    /// Callback calls for undeclared methods and stub events for undeclared event methods
    /// come back as [`DispatchOutcome::Dropped`]; the executor is not invoked.
    pub async fn handle(
        &self,
        channel: &dyn Channel,
        mut invocation: Invocation,
    ) -> Result<DispatchOutcome, RpcError> {
        let formatted_fields = tracing::enabled!(Level::DEBUG)
            .then(|| FormattedCallFields::new(channel, &invocation));
        if let Some(fields) = formatted_fields.as_ref() {
            debug!(
                event = events::DISPATCH_RECEIVE,
                component = COMPONENT,
                method = invocation.method_name(),
                target = fields.target.as_str(),
                remote = fields.remote.as_str(),
                local = fields.local.as_str(),
                "received call"
            );
        }

        let binding = match resolve_binding(&self.exporters, channel, &mut invocation) {
            Ok(binding) => binding,
            Err(err) => {
                warn!(
                    event = events::DISPATCH_SERVICE_NOT_FOUND,
                    component = COMPONENT,
                    method = invocation.method_name(),
                    err = %err,
                    "no exported service for call"
                );
                return Err(err);
            }
        };

        if invocation.is_callback_invoke() {
            let declared = binding
                .descriptor()
                .parameter(keys::METHODS)
                .map(parse_method_list)
                .unwrap_or_default();
            if !declared.contains(invocation.method_name()) {
                // Tolerated skew between the two sides of a callback; not an error reply.
                warn!(
                    event = events::DISPATCH_CALLBACK_METHOD_REJECTED,
                    component = COMPONENT,
                    service_key = %binding.key(),
                    method = invocation.method_name(),
                    declared = %binding.descriptor().parameter_or(keys::METHODS, fields::NONE),
                    "callback method not declared by service, call ignored"
                );
                return Ok(DispatchOutcome::Dropped(RpcError::CallbackMethodRejected {
                    key: binding.key().to_string(),
                    method: invocation.method_name().to_string(),
                }));
            }
        }

        if invocation.is_stub_event() {
            let service = invocation.service_key();
            if self.stub_methods.allows(&service, invocation.method_name()) == Some(false) {
                debug!(
                    event = events::DISPATCH_STUB_METHOD_REJECTED,
                    component = COMPONENT,
                    service_key = service.as_str(),
                    method = invocation.method_name(),
                    "stub event method not declared, call ignored"
                );
                return Ok(DispatchOutcome::Dropped(RpcError::StubMethodRejected {
                    service,
                    method: invocation.method_name().to_string(),
                }));
            }
        }

        let context = CallContext::new(channel.remote_address(), channel.local_address());
        let value = binding.executor().invoke(invocation, context).await?;
        Ok(DispatchOutcome::Reply(value))
    }

    fn malformed(&self, channel: &dyn Channel, kind: &str) -> RpcError {
        let err = RpcError::MalformedCallDescriptor {
            message: format!("unrecognized message kind {kind}"),
            remote: channel.remote_address(),
            local: channel.local_address(),
        };
        warn!(
            event = events::DISPATCH_MALFORMED,
            component = COMPONENT,
            err = %err,
            "inbound message is not a call descriptor"
        );
        err
    }

    /// Dispatches the lifecycle call named by the descriptor parameter `event_key`.
    ///
    /// Failures and panics raised by the hook are logged and never propagated.
    async fn dispatch_lifecycle_event(&self, channel: &dyn Channel, event_key: &str) {
        let Some(invocation) = lifecycle_invocation(channel.descriptor(), event_key) else {
            return;
        };
        let method = invocation.method_name().to_string();

        let outcome = AssertUnwindSafe(self.received(channel, InboundMessage::Call(invocation)))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => debug!(
                event = events::DISPATCH_LIFECYCLE_EVENT,
                component = COMPONENT,
                lifecycle = event_key,
                method = method.as_str(),
                remote = %channel.remote_address(),
                "lifecycle event dispatched"
            ),
            Ok(Err(err)) => warn!(
                event = events::DISPATCH_LIFECYCLE_EVENT_FAILED,
                component = COMPONENT,
                lifecycle = event_key,
                method = method.as_str(),
                remote = %channel.remote_address(),
                err = %err,
                "lifecycle event failed"
            ),
            Err(_) => warn!(
                event = events::DISPATCH_LIFECYCLE_EVENT_FAILED,
                component = COMPONENT,
                lifecycle = event_key,
                method = method.as_str(),
                remote = %channel.remote_address(),
                reason = "panic",
                "lifecycle event handler panicked"
            ),
        }
    }
}

/// Synthetic call for a connection lifecycle event, if the descriptor names a method for it.
pub(crate) fn lifecycle_invocation(
    descriptor: &EndpointDescriptor,
    event_key: &str,
) -> Option<Invocation> {
    let method = descriptor.parameter(event_key)?;
    let mut invocation = Invocation::new(method, Vec::new()).with_attachment(keys::PATH, descriptor.path());
    for key in [keys::GROUP, keys::INTERFACE, keys::VERSION] {
        if let Some(value) = descriptor.parameter(key) {
            invocation.set_attachment(key, value);
        }
    }
    if descriptor.parameter_bool(keys::STUB_EVENT, false) {
        invocation.set_attachment(keys::STUB_EVENT, "true");
    }
    Some(invocation)
}

#[async_trait]
impl ExchangeHandler for RequestDispatcher {
    async fn reply(
        &self,
        channel: &dyn Channel,
        message: InboundMessage,
    ) -> Result<DispatchOutcome, RpcError> {
        match message {
            InboundMessage::Call(invocation) => self.handle(channel, invocation).await,
            InboundMessage::Unrecognized { kind } => Err(self.malformed(channel, &kind)),
        }
    }

    async fn received(
        &self,
        channel: &dyn Channel,
        message: InboundMessage,
    ) -> Result<(), RpcError> {
        self.reply(channel, message).await.map(|_| ())
    }

    async fn connected(&self, channel: &dyn Channel) {
        self.dispatch_lifecycle_event(channel, keys::ON_CONNECT).await;
    }

    async fn disconnected(&self, channel: &dyn Channel) {
        info!(
            event = events::CHANNEL_DISCONNECTED,
            component = COMPONENT,
            remote = %channel.remote_address(),
            local = %channel.local_address(),
            address = %channel.descriptor().address(),
            "channel disconnected"
        );
        self.dispatch_lifecycle_event(channel, keys::ON_DISCONNECT).await;
    }
}
