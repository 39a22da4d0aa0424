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

//! Deferred-connection client.

use crate::descriptor::EndpointDescriptor;
use crate::error::{RpcError, TransportError};
use crate::invocation::Invocation;
use crate::observability::{events, fields};
use crate::transport::{Client, ExchangeHandler, Transporter};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const COMPONENT: &str = "lazy_client";

/// Ghost clients warn on the first request and then once per this many requests.
pub(crate) const GHOST_WARNING_INTERVAL: usize = 5_000;

/// A [`Client`] that connects on its first request.
///
/// Concurrent first requests share one connect attempt. Until then the client reports
/// itself connected, so callers cannot tell it apart from an eager connection.
pub(crate) struct LazyConnectClient {
    descriptor: EndpointDescriptor,
    transporter: Arc<dyn Transporter>,
    handler: Arc<dyn ExchangeHandler>,
    connection: OnceCell<Arc<dyn Client>>,
    closed: AtomicBool,
    warn_every: Option<usize>,
    requests: AtomicUsize,
}

impl LazyConnectClient {
    pub(crate) fn new(
        descriptor: EndpointDescriptor,
        transporter: Arc<dyn Transporter>,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Self {
        debug!(
            event = events::LAZY_CLIENT_CREATE,
            component = COMPONENT,
            address = %descriptor.address(),
            "deferred client created"
        );
        Self {
            descriptor,
            transporter,
            handler,
            connection: OnceCell::new(),
            closed: AtomicBool::new(false),
            warn_every: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Stand-in installed behind a released shared client; every request through it is
    /// unexpected and periodically reported.
    pub(crate) fn ghost(
        descriptor: EndpointDescriptor,
        transporter: Arc<dyn Transporter>,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Self {
        let mut client = Self::new(descriptor, transporter, handler);
        client.warn_every = Some(GHOST_WARNING_INTERVAL);
        client
    }

    /// Whether the deferred connect has happened.
    pub(crate) fn has_connection(&self) -> bool {
        self.connection.initialized()
    }

    async fn connection(&self) -> Result<Arc<dyn Client>, RpcError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let connected = self
                    .transporter
                    .connect(&self.descriptor, self.handler.clone())
                    .await
                    .map_err(|source| RpcError::ConnectFailed {
                        descriptor: self.descriptor.to_string(),
                        source,
                    })?;
                debug!(
                    event = events::LAZY_CLIENT_CONNECT,
                    component = COMPONENT,
                    address = %self.descriptor.address(),
                    "deferred client connected"
                );
                Ok::<_, RpcError>(connected)
            })
            .await?
            .clone();

        // A close that raced the connect must not leave the new connection open.
        if self.closed.load(Ordering::Acquire) {
            if let Err(err) = connection.close().await {
                warn!(
                    event = events::LAZY_CLIENT_CLOSE_FAILED,
                    component = COMPONENT,
                    address = %self.descriptor.address(),
                    err = %err,
                    "unable to close connection opened after close"
                );
            }
            return Err(self.closed_error());
        }
        Ok(connection)
    }

    fn closed_error(&self) -> RpcError {
        RpcError::ConnectionClosed {
            address: self.descriptor.address(),
            source: None,
        }
    }
}

#[async_trait]
impl Client for LazyConnectClient {
    fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    async fn request(&self, invocation: Invocation) -> Result<Value, RpcError> {
        if let Some(every) = self.warn_every {
            let seen = self.requests.fetch_add(1, Ordering::Relaxed);
            if seen % every == 0 {
                warn!(
                    event = events::GHOST_CLIENT_REQUEST,
                    component = COMPONENT,
                    address = %self.descriptor.address(),
                    method = invocation.method_name(),
                    target = %fields::format_call_target(&invocation),
                    requests = seen + 1,
                    "request through a released shared client, reconnecting on demand"
                );
            }
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        self.connection().await?.request(invocation).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        match self.connection.get() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        match self.connection.get() {
            Some(connection) => connection.is_connected(),
            None => !self.closed.load(Ordering::Acquire),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::LazyConnectClient;
    use crate::descriptor::EndpointDescriptor;
    use crate::error::RpcError;
    use crate::invocation::Invocation;
    use crate::test_support::{NoopHandler, RecordingTransporter};
    use crate::transport::Client;
    use std::sync::Arc;
    use std::time::Duration;

    fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::new("rpc", "10.0.0.9", 20880, "com.x.Foo")
    }

    #[tokio::test]
    async fn connects_on_first_request_only() {
        let transporter = Arc::new(RecordingTransporter::default());
        let client = LazyConnectClient::new(descriptor(), transporter.clone(), Arc::new(NoopHandler));

        assert_eq!(transporter.connect_count(), 0);
        assert!(client.is_connected());

        client.request(Invocation::new("a", vec![])).await.expect("first request");
        client.request(Invocation::new("b", vec![])).await.expect("second request");

        assert_eq!(transporter.connect_count(), 1);
        assert!(client.has_connection());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_requests_share_one_connect() {
        let transporter =
            Arc::new(RecordingTransporter::default().with_connect_delay(Duration::from_millis(20)));
        let client = Arc::new(LazyConnectClient::new(
            descriptor(),
            transporter.clone(),
            Arc::new(NoopHandler),
        ));

        let mut tasks = Vec::new();
        for index in 0..8 {
            let client = client.clone();
            tasks.push(tokio::spawn(async move {
                client
                    .request(Invocation::new(&format!("m{index}"), vec![]))
                    .await
            }));
        }
        for task in tasks {
            task.await.expect("task should not panic").expect("request should succeed");
        }

        assert_eq!(transporter.connect_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_surfaces_on_request() {
        let transporter = Arc::new(RecordingTransporter::default().failing_connect("refused"));
        let client = LazyConnectClient::new(descriptor(), transporter, Arc::new(NoopHandler));

        let result = client.request(Invocation::new("a", vec![])).await;

        assert!(matches!(result, Err(RpcError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn closed_client_rejects_requests_without_connecting() {
        let transporter = Arc::new(RecordingTransporter::default());
        let client = LazyConnectClient::new(descriptor(), transporter.clone(), Arc::new(NoopHandler));

        client.close().await.expect("close never-connected client");
        let result = client.request(Invocation::new("a", vec![])).await;

        assert!(matches!(result, Err(RpcError::ConnectionClosed { .. })));
        assert_eq!(transporter.connect_count(), 0);
        assert!(client.is_closed());
        assert!(!client.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_during_connect_closes_the_late_connection() {
        let transporter = Arc::new(
            RecordingTransporter::default()
                .with_connect_delay(Duration::from_millis(50))
                .with_failing_close(),
        );
        let client = Arc::new(LazyConnectClient::new(
            descriptor(),
            transporter.clone(),
            Arc::new(NoopHandler),
        ));
        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.request(Invocation::new("a", vec![])).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        client.close().await.expect("close before the connect finishes");
        let result = pending.await.expect("request task should not panic");

        assert!(matches!(result, Err(RpcError::ConnectionClosed { .. })));
        assert_eq!(transporter.clients().len(), 1);
        assert_eq!(transporter.clients()[0].close_count(), 1);
    }
}
