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

//! The binding runtime object owning every registry.

use crate::config::ProtocolConfig;
use crate::control_plane::export_lifecycle::ExportLifecycle;
use crate::control_plane::exporter_registry::ExporterRegistry;
use crate::control_plane::server_registry::ServerRegistry;
use crate::control_plane::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::control_plane::stub_methods::StubMethodRegistry;
use crate::data_plane::client_manager::ClientConnectionManager;
use crate::data_plane::request_dispatcher::RequestDispatcher;
use crate::descriptor::EndpointDescriptor;
use crate::error::RpcError;
use crate::exporter::Exporter;
use crate::invoker::{CallExecutor, RemoteInvoker};
use crate::observability::events;
use crate::transport::{ExchangeHandler, Server, TransportRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const COMPONENT: &str = "rpc_protocol";

/// Exports services, refers to remote ones, and tears both down.
///
/// Each instance owns its own registries; nothing is process-global. Exporting or
/// referring after [`shutdown_all`](Self::shutdown_all) fails with
/// [`RpcError::ProtocolDestroyed`]; exports and refers already in flight finish before
/// shutdown starts tearing down.
pub struct RpcProtocol {
    config: ProtocolConfig,
    transports: TransportRegistry,
    exporters: Arc<ExporterRegistry>,
    stub_methods: Arc<StubMethodRegistry>,
    servers: ServerRegistry,
    dispatcher: Arc<RequestDispatcher>,
    clients: ClientConnectionManager,
    invokers: Mutex<Vec<Arc<RemoteInvoker>>>,
    /// Held shared by export and refer, exclusively by shutdown.
    admin: RwLock<()>,
    destroyed: AtomicBool,
}

impl RpcProtocol {
    pub fn new(config: ProtocolConfig, transports: TransportRegistry) -> Self {
        let exporters = Arc::new(ExporterRegistry::new());
        let stub_methods = Arc::new(StubMethodRegistry::new());
        let dispatcher = Arc::new(RequestDispatcher::new(
            exporters.clone(),
            stub_methods.clone(),
        ));
        let clients =
            ClientConnectionManager::new(config.clone(), transports.clone(), dispatcher.clone());

        Self {
            config,
            transports,
            exporters,
            stub_methods,
            servers: ServerRegistry::new(),
            dispatcher,
            clients,
            invokers: Mutex::new(Vec::new()),
            admin: RwLock::new(()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Inbound handler registered with every endpoint and connection.
    pub fn dispatcher(&self) -> Arc<RequestDispatcher> {
        self.dispatcher.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self, operation: &'static str) -> Result<(), RpcError> {
        if self.is_destroyed() {
            return Err(RpcError::ProtocolDestroyed { operation });
        }
        Ok(())
    }

    /// Binds `executor` to the descriptor's service key and opens (or reconfigures) the
    /// listening endpoint for the descriptor's address.
    pub async fn export(
        &self,
        executor: Arc<dyn CallExecutor>,
        descriptor: &EndpointDescriptor,
    ) -> Result<Exporter, RpcError> {
        let _admin = self.admin.read().await;
        self.ensure_alive("export")?;
        let handler: Arc<dyn ExchangeHandler> = self.dispatcher.clone();
        ExportLifecycle::new(
            &self.config,
            &self.transports,
            &self.exporters,
            &self.servers,
            &self.stub_methods,
            handler,
        )
        .export(executor, descriptor)
        .await
    }

    /// Opens the connections of a reference to `service` at the descriptor's address.
    pub async fn refer(
        &self,
        service: &str,
        descriptor: &EndpointDescriptor,
    ) -> Result<Arc<RemoteInvoker>, RpcError> {
        let _admin = self.admin.read().await;
        self.ensure_alive("refer")?;
        let connections = self.clients.obtain_connections(descriptor).await?;
        let invoker = Arc::new(RemoteInvoker::new(
            service,
            descriptor.clone(),
            connections,
        ));

        let mut invokers = self.invokers.lock().await;
        invokers.retain(|invoker| !invoker.is_destroyed());
        invokers.push(invoker.clone());

        info!(
            event = events::REFER_OK,
            component = COMPONENT,
            service,
            address = %descriptor.address(),
            connections = invoker.connection_count(),
            "remote reference created"
        );
        Ok(invoker)
    }

    /// Closes every endpoint and connection, destroys remote invokers and clears all
    /// bindings. A repeated call is a no-op returning an empty report.
    pub async fn shutdown_all(&self, timeout: Duration) -> ShutdownReport {
        let _admin = self.admin.write().await;
        if self.destroyed.swap(true, Ordering::AcqRel) {
            debug!(
                event = events::SHUTDOWN_REPEATED,
                component = COMPONENT,
                "shutdown already performed"
            );
            return ShutdownReport::default();
        }
        info!(
            event = events::SHUTDOWN_START,
            component = COMPONENT,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "shutting down"
        );

        let invokers = std::mem::take(&mut *self.invokers.lock().await);
        ShutdownCoordinator::new(
            &self.servers,
            self.clients.shared(),
            &self.stub_methods,
            &self.exporters,
            invokers,
        )
        .shutdown_all(timeout)
        .await
    }

    /// [`shutdown_all`](Self::shutdown_all) with the configured server grace period.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutdown_all(self.config.server_shutdown_timeout()).await
    }

    /// Keys of all exported bindings, sorted.
    pub fn exported_keys(&self) -> Vec<String> {
        self.exporters.keys()
    }

    /// Addresses with a listening endpoint, sorted.
    pub async fn server_addresses(&self) -> Vec<String> {
        self.servers.addresses().await
    }

    pub async fn server(&self, address: &str) -> Option<Arc<dyn Server>> {
        self.servers.get(address).await
    }

    /// Reference count of the shared connection to `address`, if one is installed.
    pub async fn shared_reference_count(&self, address: &str) -> Option<usize> {
        self.clients.shared().ref_count(address).await
    }

    /// Addresses whose released shared connection left a ghost client behind, sorted.
    pub fn ghost_addresses(&self) -> Vec<String> {
        self.clients.shared().ghost_addresses()
    }
}

#[cfg(test)]
mod tests {
    use super::RpcProtocol;
    use crate::config::ProtocolConfig;
    use crate::descriptor::EndpointDescriptor;
    use crate::error::RpcError;
    use crate::test_support::{RecordingExecutor, RecordingTransporter};
    use crate::transport::TransportRegistry;
    use std::sync::Arc;

    #[tokio::test]
    async fn destroyed_protocol_rejects_export_and_refer() {
        let protocol = RpcProtocol::new(
            ProtocolConfig::default(),
            TransportRegistry::new().with_transport("tcp", Arc::new(RecordingTransporter::default())),
        );
        let descriptor = EndpointDescriptor::new("rpc", "10.0.0.1", 20880, "com.x.Foo");

        protocol.shutdown().await;

        assert!(matches!(
            protocol
                .export(Arc::new(RecordingExecutor::default()), &descriptor)
                .await,
            Err(RpcError::ProtocolDestroyed { operation: "export" })
        ));
        assert!(matches!(
            protocol.refer("com.x.Foo", &descriptor).await,
            Err(RpcError::ProtocolDestroyed { operation: "refer" })
        ));
        assert!(protocol.shutdown().await.is_empty());
    }
}
