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

//! Call executors and the consumer-side remote invoker.

use crate::data_plane::client_manager::ConnectionHandle;
use crate::descriptor::{keys, EndpointDescriptor};
use crate::error::RpcError;
use crate::invocation::{CallContext, Invocation};
use crate::observability::events;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

const COMPONENT: &str = "remote_invoker";

/// Performs the application logic of an exported service.
///
/// The dispatcher passes the [`CallContext`] of the channel the call arrived on.
#[async_trait]
pub trait CallExecutor: Send + Sync {
    async fn invoke(&self, invocation: Invocation, context: CallContext)
        -> Result<Value, RpcError>;
}

/// Callable handle returned by [`RpcProtocol::refer`](crate::RpcProtocol::refer).
///
/// Calls are spread round-robin across the reference's connections. After
/// [`destroy`](Self::destroy) every connection has been released exactly once and calls
/// fail with [`RpcError::InvokerDestroyed`].
pub struct RemoteInvoker {
    service: String,
    descriptor: EndpointDescriptor,
    connections: Vec<ConnectionHandle>,
    next: AtomicUsize,
    destroyed: AtomicBool,
}

impl RemoteInvoker {
    pub(crate) fn new(
        service: &str,
        descriptor: EndpointDescriptor,
        connections: Vec<ConnectionHandle>,
    ) -> Self {
        Self {
            service: service.to_string(),
            descriptor,
            connections,
            next: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Sends `invocation` to the referenced service with its routing attachments stamped.
    pub async fn call(&self, mut invocation: Invocation) -> Result<Value, RpcError> {
        let connection = match self.pick_connection() {
            Some(connection) => connection,
            None => return Err(self.destroyed_error()),
        };

        invocation.set_attachment(keys::PATH, self.descriptor.path());
        invocation.set_attachment(keys::INTERFACE, self.service.as_str());
        if let Some(version) = self.descriptor.version() {
            invocation.set_attachment(keys::VERSION, version);
        }
        if let Some(group) = self.descriptor.group() {
            invocation.set_attachment(keys::GROUP, group);
        }
        connection.request(invocation).await
    }

    fn pick_connection(&self) -> Option<&ConnectionHandle> {
        if self.is_destroyed() || self.connections.is_empty() {
            return None;
        }
        if self.connections.len() == 1 {
            return self.connections.first();
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections.get(index)
    }

    fn destroyed_error(&self) -> RpcError {
        RpcError::InvokerDestroyed {
            service: self.service.clone(),
            address: self.descriptor.address(),
        }
    }

    /// Whether any connection can currently carry a call.
    pub fn is_available(&self) -> bool {
        !self.is_destroyed() && self.connections.iter().any(ConnectionHandle::is_connected)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Releases every connection; returns `false` when already destroyed.
    pub async fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        for connection in &self.connections {
            connection.release().await;
        }
        debug!(
            event = events::INVOKER_DESTROY,
            component = COMPONENT,
            service = self.service.as_str(),
            address = %self.descriptor.address(),
            connections = self.connections.len(),
            "remote invoker destroyed"
        );
        true
    }
}

#[async_trait]
impl CallExecutor for RemoteInvoker {
    async fn invoke(
        &self,
        invocation: Invocation,
        _context: CallContext,
    ) -> Result<Value, RpcError> {
        self.call(invocation).await
    }
}
