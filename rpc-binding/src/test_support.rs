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

//! Recording collaborators for tests and benchmarks.
//!
//! These stand in for a real transport layer and real service implementations. They
//! record every interaction and can be told to fail.

use crate::descriptor::EndpointDescriptor;
use crate::error::{RpcError, TransportError};
use crate::invocation::{CallContext, Invocation};
use crate::invoker::CallExecutor;
use crate::transport::{
    Channel, Client, DispatchOutcome, ExchangeHandler, InboundMessage, Server, Transporter,
};
use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parses a socket address literal.
///
/// # Panics
///
/// Panics when `address` is not a valid socket address.
pub fn socket(address: &str) -> SocketAddr {
    address
        .parse()
        .unwrap_or_else(|err| panic!("invalid socket address {address}: {err}"))
}

/// Transporter whose endpoints and connections are in-memory recorders.
#[derive(Default)]
pub struct RecordingTransporter {
    bind_failure: Option<String>,
    connect_failure: Option<(usize, String)>,
    connect_delay: Option<Duration>,
    bind_delay: Option<Duration>,
    fail_close: bool,
    binds: AtomicUsize,
    connects: AtomicUsize,
    servers: Mutex<Vec<Arc<RecordingServer>>>,
    clients: Mutex<Vec<Arc<RecordingClient>>>,
    connected: Mutex<Vec<EndpointDescriptor>>,
    handlers: Mutex<Vec<Arc<dyn ExchangeHandler>>>,
}

impl RecordingTransporter {
    pub fn failing_bind(mut self, message: &str) -> Self {
        self.bind_failure = Some(message.to_string());
        self
    }

    pub fn failing_connect(self, message: &str) -> Self {
        self.failing_connect_after(0, message)
    }

    /// The first `successes` connects succeed; every later one fails.
    pub fn failing_connect_after(mut self, successes: usize, message: &str) -> Self {
        self.connect_failure = Some((successes, message.to_string()));
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn with_bind_delay(mut self, delay: Duration) -> Self {
        self.bind_delay = Some(delay);
        self
    }

    /// Endpoints and connections created from now on fail their close.
    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    /// Connect attempts, including failed ones.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn servers(&self) -> Vec<Arc<RecordingServer>> {
        lock(&self.servers).clone()
    }

    pub fn clients(&self) -> Vec<Arc<RecordingClient>> {
        lock(&self.clients).clone()
    }

    /// Descriptors passed to successful binds, in order.
    pub fn bound_descriptors(&self) -> Vec<EndpointDescriptor> {
        self.servers()
            .iter()
            .map(|server| server.initial_descriptor().clone())
            .collect()
    }

    /// Descriptors passed to every connect attempt, in order.
    pub fn connected_descriptors(&self) -> Vec<EndpointDescriptor> {
        lock(&self.connected).clone()
    }

    /// Handler passed to the most recent bind or connect.
    pub fn last_handler(&self) -> Option<Arc<dyn ExchangeHandler>> {
        lock(&self.handlers).last().cloned()
    }
}

#[async_trait]
impl Transporter for RecordingTransporter {
    async fn bind(
        &self,
        descriptor: &EndpointDescriptor,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Result<Arc<dyn Server>, TransportError> {
        if let Some(delay) = self.bind_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.bind_failure {
            return Err(TransportError::new(message.as_str()));
        }
        self.binds.fetch_add(1, Ordering::SeqCst);
        lock(&self.handlers).push(handler);
        let server = Arc::new(RecordingServer::new(descriptor.clone(), self.fail_close));
        lock(&self.servers).push(server.clone());
        Ok(server)
    }

    async fn connect(
        &self,
        descriptor: &EndpointDescriptor,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Result<Arc<dyn Client>, TransportError> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.connected).push(descriptor.clone());
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((successes, message)) = &self.connect_failure {
            if attempt >= *successes {
                return Err(TransportError::new(message.as_str()));
            }
        }
        lock(&self.handlers).push(handler);
        let client = Arc::new(RecordingClient::new(descriptor.clone()));
        if self.fail_close {
            client.fail_close.store(true, Ordering::SeqCst);
        }
        lock(&self.clients).push(client.clone());
        Ok(client)
    }
}

/// In-memory listening endpoint.
pub struct RecordingServer {
    initial: EndpointDescriptor,
    current: Mutex<EndpointDescriptor>,
    resets: AtomicUsize,
    closes: AtomicUsize,
    closed: AtomicBool,
    fail_close: bool,
}

impl RecordingServer {
    pub fn new(descriptor: EndpointDescriptor, fail_close: bool) -> Self {
        Self {
            current: Mutex::new(descriptor.clone()),
            initial: descriptor,
            resets: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            fail_close,
        }
    }

    pub fn initial_descriptor(&self) -> &EndpointDescriptor {
        &self.initial
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Server for RecordingServer {
    fn descriptor(&self) -> EndpointDescriptor {
        lock(&self.current).clone()
    }

    fn reset(&self, descriptor: &EndpointDescriptor) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = descriptor.clone();
    }

    async fn close(&self, _timeout: Duration) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::new("server close failed"));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// In-memory connection answering every request with the method name.
pub struct RecordingClient {
    descriptor: EndpointDescriptor,
    requests: Mutex<Vec<Invocation>>,
    closes: AtomicUsize,
    closed: AtomicBool,
    fail_close: AtomicBool,
}

impl RecordingClient {
    pub fn new(descriptor: EndpointDescriptor) -> Self {
        Self {
            descriptor,
            requests: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
        }
    }

    pub fn requests(&self) -> Vec<Invocation> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Client for RecordingClient {
    fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    async fn request(&self, invocation: Invocation) -> Result<Value, RpcError> {
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed {
                address: self.descriptor.address(),
                source: None,
            });
        }
        let reply = Value::String(invocation.method_name().to_string());
        lock(&self.requests).push(invocation);
        Ok(reply)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::new("client close failed"));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Channel with fixed addresses.
pub struct StaticChannel {
    descriptor: EndpointDescriptor,
    local: SocketAddr,
    remote: SocketAddr,
}

impl StaticChannel {
    /// # Panics
    ///
    /// Panics when either address is not a valid socket address.
    pub fn new(descriptor: EndpointDescriptor, local: &str, remote: &str) -> Self {
        Self {
            descriptor,
            local: socket(local),
            remote: socket(remote),
        }
    }
}

impl Channel for StaticChannel {
    fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    fn local_address(&self) -> SocketAddr {
        self.local
    }

    fn remote_address(&self) -> SocketAddr {
        self.remote
    }
}

/// Handler that ignores everything, for connections whose inbound side is irrelevant.
pub struct NoopHandler;

#[async_trait]
impl ExchangeHandler for NoopHandler {
    async fn reply(
        &self,
        _channel: &dyn Channel,
        _message: InboundMessage,
    ) -> Result<DispatchOutcome, RpcError> {
        Ok(DispatchOutcome::Reply(Value::Null))
    }

    async fn received(
        &self,
        _channel: &dyn Channel,
        _message: InboundMessage,
    ) -> Result<(), RpcError> {
        Ok(())
    }

    async fn connected(&self, _channel: &dyn Channel) {}

    async fn disconnected(&self, _channel: &dyn Channel) {}
}

#[derive(Clone, Debug, Default)]
enum ExecutorBehavior {
    #[default]
    EchoMethod,
    Fail(String),
    Panic,
}

/// Service implementation recording each call with its context.
#[derive(Default)]
pub struct RecordingExecutor {
    behavior: ExecutorBehavior,
    calls: Mutex<Vec<(Invocation, CallContext)>>,
}

impl RecordingExecutor {
    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = ExecutorBehavior::Fail(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = ExecutorBehavior::Panic;
        self
    }

    pub fn calls(&self) -> Vec<(Invocation, CallContext)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn methods(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|(invocation, _)| invocation.method_name().to_string())
            .collect()
    }
}

#[async_trait]
impl CallExecutor for RecordingExecutor {
    async fn invoke(
        &self,
        invocation: Invocation,
        context: CallContext,
    ) -> Result<Value, RpcError> {
        let reply = Value::String(invocation.method_name().to_string());
        lock(&self.calls).push((invocation, context));
        match &self.behavior {
            ExecutorBehavior::EchoMethod => Ok(reply),
            ExecutorBehavior::Fail(message) => Err(RpcError::ServiceFailure(message.clone())),
            ExecutorBehavior::Panic => panic!("executor configured to panic"),
        }
    }
}
