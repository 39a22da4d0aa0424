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

//! Process-wide teardown of endpoints, connections and references.

use crate::control_plane::exporter_registry::ExporterRegistry;
use crate::control_plane::server_registry::ServerRegistry;
use crate::control_plane::stub_methods::StubMethodRegistry;
use crate::data_plane::shared_client::{ReferenceCountClient, SharedClientRegistry};
use crate::error::TransportError;
use crate::invoker::RemoteInvoker;
use crate::observability::{events, fields};
use crate::transport::{Client, Server};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT: &str = "shutdown";

/// Extra time granted on top of the grace period a server close is asked to honor.
const SERVER_CLOSE_SLACK: Duration = Duration::from_millis(500);

/// What one shutdown pass released.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ShutdownReport {
    pub servers_closed: usize,
    pub shared_clients_closed: usize,
    pub ghost_clients_closed: usize,
    pub invokers_destroyed: usize,
    pub exporters_removed: usize,
    /// Close calls that failed or timed out; each was logged and skipped.
    pub failures: usize,
}

impl ShutdownReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub(crate) struct ShutdownCoordinator<'a> {
    servers: &'a ServerRegistry,
    shared: &'a SharedClientRegistry,
    stub_methods: &'a StubMethodRegistry,
    exporters: &'a ExporterRegistry,
    invokers: Vec<Arc<RemoteInvoker>>,
}

impl<'a> ShutdownCoordinator<'a> {
    pub(crate) fn new(
        servers: &'a ServerRegistry,
        shared: &'a SharedClientRegistry,
        stub_methods: &'a StubMethodRegistry,
        exporters: &'a ExporterRegistry,
        invokers: Vec<Arc<RemoteInvoker>>,
    ) -> Self {
        Self {
            servers,
            shared,
            stub_methods,
            exporters,
            invokers,
        }
    }

    /// Removes then closes every managed resource, one entry at a time.
    ///
    /// Each resource is closed at most once. A failed or timed out close is counted in
    /// [`ShutdownReport::failures`] and the sequence moves on.
    pub(crate) async fn shutdown_all(self, timeout: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        for (address, server) in self.servers.drain().await {
            let closed = close_within(
                timeout.saturating_add(SERVER_CLOSE_SLACK),
                server.close(timeout),
            )
            .await;
            tally(
                &mut report.servers_closed,
                &mut report.failures,
                fields::RESOURCE_SERVER,
                &address,
                closed,
            );
        }

        for (address, client) in self.shared.drain_shared().await {
            match force_close_within(&client, timeout).await {
                Some(closed) => tally(
                    &mut report.shared_clients_closed,
                    &mut report.failures,
                    fields::RESOURCE_SHARED_CLIENT,
                    &address,
                    closed,
                ),
                None => debug!(
                    event = events::SHUTDOWN_CLOSE_OK,
                    component = COMPONENT,
                    resource = fields::RESOURCE_SHARED_CLIENT,
                    address = %address,
                    reason = "already_released",
                    "shared client already closed by its last release"
                ),
            }
        }

        for (address, ghost) in self.shared.drain_ghosts() {
            let closed = close_within(timeout, ghost.close()).await;
            tally(
                &mut report.ghost_clients_closed,
                &mut report.failures,
                fields::RESOURCE_GHOST_CLIENT,
                &address,
                closed,
            );
        }

        self.stub_methods.clear();

        for invoker in &self.invokers {
            if invoker.destroy().await {
                report.invokers_destroyed += 1;
                debug!(
                    event = events::SHUTDOWN_CLOSE_OK,
                    component = COMPONENT,
                    resource = fields::RESOURCE_INVOKER,
                    service = invoker.service(),
                    address = %invoker.descriptor().address(),
                    "remote invoker destroyed"
                );
            }
        }
        report.exporters_removed = self.exporters.clear();

        info!(
            event = events::SHUTDOWN_OK,
            component = COMPONENT,
            servers = report.servers_closed,
            shared_clients = report.shared_clients_closed,
            ghost_clients = report.ghost_clients_closed,
            invokers = report.invokers_destroyed,
            exporters = report.exporters_removed,
            failures = report.failures,
            "shutdown complete"
        );
        report
    }
}

/// `None` when the shared client was already closed by its last release.
async fn force_close_within(
    client: &ReferenceCountClient,
    timeout: Duration,
) -> Option<Result<(), String>> {
    match tokio::time::timeout(timeout, client.force_close()).await {
        Ok(Some(closed)) => Some(closed.map_err(|err| err.to_string())),
        Ok(None) => None,
        Err(_) => Some(Err(format!("close timed out after {timeout:?}"))),
    }
}

async fn close_within<F>(timeout: Duration, close: F) -> Result<(), String>
where
    F: Future<Output = Result<(), TransportError>>,
{
    match tokio::time::timeout(timeout, close).await {
        Ok(closed) => closed.map_err(|err| err.to_string()),
        Err(_) => Err(format!("close timed out after {timeout:?}")),
    }
}

fn tally(
    closed_count: &mut usize,
    failures: &mut usize,
    resource: &'static str,
    address: &str,
    closed: Result<(), String>,
) {
    match closed {
        Ok(()) => {
            *closed_count += 1;
            debug!(
                event = events::SHUTDOWN_CLOSE_OK,
                component = COMPONENT,
                resource,
                address,
                "resource closed"
            );
        }
        Err(err) => {
            *failures += 1;
            warn!(
                event = events::SHUTDOWN_CLOSE_FAILED,
                component = COMPONENT,
                resource,
                address,
                err = err.as_str(),
                "unable to close resource, continuing shutdown"
            );
        }
    }
}
