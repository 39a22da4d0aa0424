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

//! Export orchestration: binding registration, stub event methods and listening endpoints.

use crate::config::ProtocolConfig;
use crate::control_plane::exporter_registry::{ExporterRegistry, ServiceBinding};
use crate::control_plane::server_registry::ServerRegistry;
use crate::control_plane::stub_methods::StubMethodRegistry;
use crate::descriptor::{keys, EndpointDescriptor, COMPATIBLE_CODEC, DEFAULT_CODEC};
use crate::error::RpcError;
use crate::exporter::Exporter;
use crate::invoker::CallExecutor;
use crate::observability::events;
use crate::routing::service_key::compute_key;
use crate::transport::{ExchangeHandler, Server, TransportRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "export_lifecycle";

/// Borrowed view over the registries an export touches.
pub(crate) struct ExportLifecycle<'a> {
    config: &'a ProtocolConfig,
    transports: &'a TransportRegistry,
    exporters: &'a Arc<ExporterRegistry>,
    servers: &'a ServerRegistry,
    stub_methods: &'a StubMethodRegistry,
    handler: Arc<dyn ExchangeHandler>,
}

impl<'a> ExportLifecycle<'a> {
    pub(crate) fn new(
        config: &'a ProtocolConfig,
        transports: &'a TransportRegistry,
        exporters: &'a Arc<ExporterRegistry>,
        servers: &'a ServerRegistry,
        stub_methods: &'a StubMethodRegistry,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Self {
        Self {
            config,
            transports,
            exporters,
            servers,
            stub_methods,
            handler,
        }
    }

    /// Registers `executor` under the descriptor's service key and makes sure a listening
    /// endpoint serves the descriptor's address.
    ///
    /// A failed endpoint bind restores whatever binding the key held before.
    pub(crate) async fn export(
        &self,
        executor: Arc<dyn CallExecutor>,
        descriptor: &EndpointDescriptor,
    ) -> Result<Exporter, RpcError> {
        let key = compute_key(
            descriptor.port(),
            descriptor.path(),
            descriptor.version().unwrap_or_default(),
            descriptor.group().unwrap_or_default(),
        );
        let binding = Arc::new(ServiceBinding::new(key, descriptor.clone(), executor));
        let previous = self.exporters.insert(binding.clone());
        let replaced = previous.is_some();

        if let Err(err) = self.open_server(descriptor).await {
            self.exporters.roll_back(&binding, previous);
            warn!(
                event = events::EXPORT_ROLLBACK,
                component = COMPONENT,
                service_key = %binding.key(),
                err = %err,
                "export failed, binding rolled back"
            );
            return Err(err);
        }
        self.record_stub_methods(descriptor);

        let event = if replaced {
            events::EXPORT_REPLACED
        } else {
            events::EXPORT_OK
        };
        info!(
            event,
            component = COMPONENT,
            service_key = %binding.key(),
            address = %descriptor.address(),
            "service exported"
        );
        Ok(Exporter::new(binding, self.exporters.clone()))
    }

    fn record_stub_methods(&self, descriptor: &EndpointDescriptor) {
        let is_stub_event = descriptor.parameter_bool(keys::STUB_EVENT, false);
        let is_callback_service = descriptor.parameter_bool(keys::IS_CALLBACK_SERVICE, false);
        if !is_stub_event || is_callback_service {
            return;
        }

        let service_key = descriptor.service_key();
        let recorded = descriptor
            .parameter(keys::STUB_EVENT_METHODS)
            .is_some_and(|declared| self.stub_methods.record(&service_key, declared));
        if recorded {
            debug!(
                event = events::STUB_METHODS_RECORDED,
                component = COMPONENT,
                service_key = service_key.as_str(),
                "stub event methods recorded"
            );
        } else {
            warn!(
                event = events::STUB_METHODS_MISSING,
                component = COMPONENT,
                service_key = service_key.as_str(),
                "stub event enabled without declared event methods"
            );
        }
    }

    /// Binds the descriptor's address, or reconfigures the endpoint already bound there.
    pub(crate) async fn open_server(&self, descriptor: &EndpointDescriptor) -> Result<(), RpcError> {
        let address = descriptor.address();
        if !descriptor.parameter_bool(keys::IS_SERVER, true) {
            debug!(
                event = events::SERVER_SKIPPED_NOT_SERVER,
                component = COMPONENT,
                address = %address,
                "descriptor is not a server, no listening endpoint opened"
            );
            return Ok(());
        }

        let slot = self.servers.slot(&address);
        let mut current = slot.lock().await;
        match current.as_ref() {
            Some(server) if !server.is_closed() => {
                server.reset(descriptor);
                debug!(
                    event = events::SERVER_RESET,
                    component = COMPONENT,
                    address = %address,
                    "listening endpoint reconfigured"
                );
                return Ok(());
            }
            Some(_) => debug!(
                event = events::SERVER_REPLACE_CLOSED,
                component = COMPONENT,
                address = %address,
                "replacing closed listening endpoint"
            ),
            None => {}
        }

        *current = Some(self.create_server(descriptor).await?);
        Ok(())
    }

    async fn create_server(&self, descriptor: &EndpointDescriptor) -> Result<Arc<dyn Server>, RpcError> {
        let descriptor = descriptor
            .with_parameter_if_absent(keys::CHANNEL_READONLY_EVENT_SENT, "true")
            .with_parameter_if_absent(keys::HEARTBEAT, self.config.default_heartbeat_ms.to_string());

        let transport = descriptor
            .parameter(keys::SERVER)
            .unwrap_or(self.config.default_transport.as_str());
        let transporter = self.transports.require("server", transport)?;
        // Validated up front so a rejected export never leaves a bound endpoint behind.
        if let Some(client) = descriptor.parameter(keys::CLIENT) {
            self.transports.require("client", client)?;
        }

        let codec = if self.config.compatible_codec {
            COMPATIBLE_CODEC
        } else {
            DEFAULT_CODEC
        };
        let descriptor = descriptor.with_parameter(keys::CODEC, codec);

        match transporter.bind(&descriptor, self.handler.clone()).await {
            Ok(server) => {
                info!(
                    event = events::SERVER_BIND_OK,
                    component = COMPONENT,
                    address = %descriptor.address(),
                    codec,
                    "listening endpoint bound"
                );
                Ok(server)
            }
            Err(source) => {
                warn!(
                    event = events::SERVER_BIND_FAILED,
                    component = COMPONENT,
                    address = %descriptor.address(),
                    err = %source,
                    "unable to bind listening endpoint"
                );
                Err(RpcError::EndpointBindFailed {
                    descriptor: descriptor.to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExportLifecycle;
    use crate::config::ProtocolConfig;
    use crate::control_plane::exporter_registry::ExporterRegistry;
    use crate::control_plane::server_registry::ServerRegistry;
    use crate::control_plane::stub_methods::StubMethodRegistry;
    use crate::descriptor::{keys, EndpointDescriptor};
    use crate::error::RpcError;
    use crate::test_support::{NoopHandler, RecordingExecutor, RecordingTransporter};
    use crate::transport::TransportRegistry;
    use std::sync::Arc;

    struct Registries {
        config: ProtocolConfig,
        transports: TransportRegistry,
        exporters: Arc<ExporterRegistry>,
        servers: ServerRegistry,
        stub_methods: StubMethodRegistry,
    }

    impl Registries {
        fn new(transporter: Arc<RecordingTransporter>) -> Self {
            Self {
                config: ProtocolConfig::default(),
                transports: TransportRegistry::new().with_transport("tcp", transporter),
                exporters: Arc::new(ExporterRegistry::new()),
                servers: ServerRegistry::new(),
                stub_methods: StubMethodRegistry::new(),
            }
        }

        fn lifecycle(&self) -> ExportLifecycle<'_> {
            ExportLifecycle::new(
                &self.config,
                &self.transports,
                &self.exporters,
                &self.servers,
                &self.stub_methods,
                Arc::new(NoopHandler),
            )
        }
    }

    fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::new("rpc", "10.0.0.1", 20880, "com.x.Foo")
            .with_parameter(keys::VERSION, "1.0.0")
    }

    #[tokio::test]
    async fn server_descriptor_is_enriched_before_bind() {
        let transporter = Arc::new(RecordingTransporter::default());
        let registries = Registries::new(transporter.clone());

        registries
            .lifecycle()
            .export(Arc::new(RecordingExecutor::default()), &descriptor())
            .await
            .expect("export should succeed");

        let bound = transporter.bound_descriptors();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].parameter(keys::CHANNEL_READONLY_EVENT_SENT), Some("true"));
        assert_eq!(bound[0].parameter(keys::HEARTBEAT), Some("60000"));
        assert_eq!(bound[0].parameter(keys::CODEC), Some("rpc"));
    }

    #[tokio::test]
    async fn non_server_descriptor_registers_binding_only() {
        let transporter = Arc::new(RecordingTransporter::default());
        let registries = Registries::new(transporter.clone());

        registries
            .lifecycle()
            .export(
                Arc::new(RecordingExecutor::default()),
                &descriptor().with_parameter(keys::IS_SERVER, "false"),
            )
            .await
            .expect("export should succeed");

        assert_eq!(transporter.bind_count(), 0);
        assert_eq!(registries.exporters.len(), 1);
    }

    #[tokio::test]
    async fn unknown_client_transport_fails_before_bind() {
        let transporter = Arc::new(RecordingTransporter::default());
        let registries = Registries::new(transporter.clone());

        let result = registries
            .lifecycle()
            .export(
                Arc::new(RecordingExecutor::default()),
                &descriptor().with_parameter(keys::CLIENT, "bio"),
            )
            .await;

        assert!(matches!(result, Err(RpcError::UnsupportedTransport { role: "client", .. })));
        assert_eq!(transporter.bind_count(), 0);
        assert_eq!(registries.exporters.len(), 0);
    }

    #[tokio::test]
    async fn stub_event_without_methods_is_only_a_warning() {
        let registries = Registries::new(Arc::new(RecordingTransporter::default()));

        registries
            .lifecycle()
            .export(
                Arc::new(RecordingExecutor::default()),
                &descriptor().with_parameter(keys::STUB_EVENT, "true"),
            )
            .await
            .expect("missing stub methods are not fatal");

        registries
            .lifecycle()
            .export(
                Arc::new(RecordingExecutor::default()),
                &descriptor()
                    .with_parameter(keys::STUB_EVENT, "true")
                    .with_parameter(keys::IS_CALLBACK_SERVICE, "true")
                    .with_parameter(keys::STUB_EVENT_METHODS, "onConnect"),
            )
            .await
            .expect("callback services skip stub methods");

        assert_eq!(registries.stub_methods.len(), 0);
    }
}
