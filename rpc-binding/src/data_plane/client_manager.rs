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

//! Client connection policy: shared reference-counted connections or dedicated ones.

use crate::config::ProtocolConfig;
use crate::data_plane::lazy_client::LazyConnectClient;
use crate::data_plane::shared_client::{ReferenceCountClient, SharedClientRegistry, SharedLease};
use crate::descriptor::{
    keys, EndpointDescriptor, COMPATIBLE_CODEC, DEFAULT_CODEC, LEGACY_PROTOCOL_VERSION_PREFIX,
};
use crate::error::RpcError;
use crate::invocation::Invocation;
use crate::observability::events;
use crate::transport::{Client, ExchangeHandler, TransportRegistry, Transporter};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "client_manager";

/// One connection slot of a remote reference.
#[derive(Clone)]
pub(crate) enum ConnectionHandle {
    Shared(Arc<SharedLease>),
    /// Owned exclusively by one reference; released by closing it.
    Dedicated(Arc<dyn Client>),
}

impl ConnectionHandle {
    pub(crate) async fn request(&self, invocation: Invocation) -> Result<Value, RpcError> {
        match self {
            ConnectionHandle::Shared(lease) => lease.client().request(invocation).await,
            ConnectionHandle::Dedicated(client) => client.request(invocation).await,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        match self {
            ConnectionHandle::Shared(lease) => lease.client().is_connected(),
            ConnectionHandle::Dedicated(client) => client.is_connected(),
        }
    }

    pub(crate) async fn release(&self) {
        match self {
            ConnectionHandle::Shared(lease) => lease.release().await,
            ConnectionHandle::Dedicated(client) => {
                if let Err(err) = client.close().await {
                    warn!(
                        event = events::DEDICATED_CLIENT_CLOSE_FAILED,
                        component = COMPONENT,
                        address = %client.descriptor().address(),
                        err = %err,
                        "unable to close dedicated connection"
                    );
                }
            }
        }
    }
}

/// Transport choice and enriched descriptor for one outbound connection.
struct ClientPlan {
    transporter: Arc<dyn Transporter>,
    descriptor: EndpointDescriptor,
}

pub(crate) struct ClientConnectionManager {
    config: ProtocolConfig,
    transports: TransportRegistry,
    handler: Arc<dyn ExchangeHandler>,
    shared: Arc<SharedClientRegistry>,
}

impl ClientConnectionManager {
    pub(crate) fn new(
        config: ProtocolConfig,
        transports: TransportRegistry,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Self {
        Self {
            config,
            transports,
            handler,
            shared: Arc::new(SharedClientRegistry::new()),
        }
    }

    pub(crate) fn shared(&self) -> &SharedClientRegistry {
        &self.shared
    }

    /// Connection handles for one reference.
    ///
    /// An unset or zero `connections` parameter shares a single pooled connection per
    /// address; a positive value opens that many dedicated connections. When any slot
    /// fails, handles already obtained are released before the error is returned.
    pub(crate) async fn obtain_connections(
        &self,
        descriptor: &EndpointDescriptor,
    ) -> Result<Vec<ConnectionHandle>, RpcError> {
        let connections = descriptor.parameter_u32(keys::CONNECTIONS, 0);
        let share_connection = connections == 0;
        let count = if share_connection { 1 } else { connections };

        let mut handles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let handle = if share_connection {
                self.get_shared_client(descriptor).await.map(|client| {
                    ConnectionHandle::Shared(Arc::new(SharedLease::new(self.shared.clone(), client)))
                })
            } else {
                self.init_client(descriptor).await.map(ConnectionHandle::Dedicated)
            };

            match handle {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    for obtained in &handles {
                        obtained.release().await;
                    }
                    return Err(err);
                }
            }
        }
        Ok(handles)
    }

    /// Returns the shared client for the descriptor's address, taking one reference.
    ///
    /// The whole check-then-create sequence runs inside the address critical section, so
    /// concurrent callers for one address never open duplicate connections.
    pub(crate) async fn get_shared_client(
        &self,
        descriptor: &EndpointDescriptor,
    ) -> Result<Arc<ReferenceCountClient>, RpcError> {
        let address = descriptor.address();
        let slot = self.shared.slot(&address);
        let mut current = slot.lock().await;

        if let Some(existing) = current.as_ref() {
            // A connection closed by the transport or the peer is never handed out again.
            if !existing.is_closed() && existing.acquire() {
                debug!(
                    event = events::SHARED_CLIENT_REUSE,
                    component = COMPONENT,
                    address = %address,
                    ref_count = existing.ref_count(),
                    "reusing shared client"
                );
                return Ok(existing.clone());
            }
            debug!(
                event = events::SHARED_CLIENT_EVICT_STALE,
                component = COMPONENT,
                address = %address,
                ref_count = existing.ref_count(),
                "evicting closed shared client"
            );
            *current = None;
        }

        let plan = self.prepare_client(descriptor)?;
        let client = self.connect(&plan).await?;
        let shared = Arc::new(ReferenceCountClient::new(
            plan.descriptor,
            client,
            plan.transporter,
            self.handler.clone(),
        ));
        *current = Some(shared.clone());
        self.shared.discard_ghost(&address).await;

        debug!(
            event = events::SHARED_CLIENT_CREATE,
            component = COMPONENT,
            address = %address,
            ref_count = 1,
            "shared client created"
        );
        Ok(shared)
    }

    /// Opens one unshared client; the caller owns it.
    pub(crate) async fn init_client(
        &self,
        descriptor: &EndpointDescriptor,
    ) -> Result<Arc<dyn Client>, RpcError> {
        let plan = self.prepare_client(descriptor)?;
        self.connect(&plan).await
    }

    fn prepare_client(&self, descriptor: &EndpointDescriptor) -> Result<ClientPlan, RpcError> {
        let transport = descriptor
            .parameter(keys::CLIENT)
            .or_else(|| descriptor.parameter(keys::SERVER))
            .unwrap_or(self.config.default_transport.as_str());
        let transporter = self.transports.require("client", transport)?;

        let legacy_peer = descriptor
            .parameter(keys::PROTOCOL_VERSION)
            .is_some_and(|version| version.starts_with(LEGACY_PROTOCOL_VERSION_PREFIX));
        let codec = if self.config.compatible_codec && legacy_peer {
            COMPATIBLE_CODEC
        } else {
            DEFAULT_CODEC
        };

        let descriptor = descriptor
            .with_parameter(keys::CODEC, codec)
            .with_parameter_if_absent(keys::HEARTBEAT, self.config.default_heartbeat_ms.to_string());
        Ok(ClientPlan {
            transporter,
            descriptor,
        })
    }

    async fn connect(&self, plan: &ClientPlan) -> Result<Arc<dyn Client>, RpcError> {
        if plan.descriptor.parameter_bool(keys::LAZY_CONNECT, false) {
            return Ok(Arc::new(LazyConnectClient::new(
                plan.descriptor.clone(),
                plan.transporter.clone(),
                self.handler.clone(),
            )));
        }

        match plan
            .transporter
            .connect(&plan.descriptor, self.handler.clone())
            .await
        {
            Ok(client) => {
                debug!(
                    event = events::CLIENT_CONNECT_OK,
                    component = COMPONENT,
                    address = %plan.descriptor.address(),
                    "client connected"
                );
                Ok(client)
            }
            Err(source) => {
                warn!(
                    event = events::CLIENT_CONNECT_FAILED,
                    component = COMPONENT,
                    address = %plan.descriptor.address(),
                    err = %source,
                    "unable to connect client"
                );
                Err(RpcError::ConnectFailed {
                    descriptor: plan.descriptor.to_string(),
                    source,
                })
            }
        }
    }
}
