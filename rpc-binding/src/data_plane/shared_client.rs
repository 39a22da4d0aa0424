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

//! Reference-counted sharing of one connection per remote address.

use crate::data_plane::lazy_client::LazyConnectClient;
use crate::descriptor::{keys, EndpointDescriptor};
use crate::error::{RpcError, TransportError};
use crate::invocation::Invocation;
use crate::observability::events;
use crate::runtime::address_slots::{AddressSlots, Slot};
use crate::transport::{Client, ExchangeHandler, Transporter};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "shared_client";

/// Result of giving back one reference.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum ReleaseOutcome {
    Retained(usize),
    /// This release took the count to zero; the caller must retire the connection.
    LastReference,
    /// The count was already zero.
    AlreadyReleased,
}

/// Ownership wrapper sharing one underlying [`Client`] across references.
///
/// The count only moves through [`acquire`](Self::acquire) and [`release`](Self::release).
/// Once it reaches zero it never rises again, so a wrapper found at zero is stale.
pub(crate) struct ReferenceCountClient {
    descriptor: EndpointDescriptor,
    ref_count: AtomicUsize,
    inner: ArcSwap<Arc<dyn Client>>,
    transporter: Arc<dyn Transporter>,
    handler: Arc<dyn ExchangeHandler>,
}

impl ReferenceCountClient {
    /// Wraps `client` with an initial count of one.
    pub(crate) fn new(
        descriptor: EndpointDescriptor,
        client: Arc<dyn Client>,
        transporter: Arc<dyn Transporter>,
        handler: Arc<dyn ExchangeHandler>,
    ) -> Self {
        Self {
            descriptor,
            ref_count: AtomicUsize::new(1),
            inner: ArcSwap::from_pointee(client),
            transporter,
            handler,
        }
    }

    pub(crate) fn address(&self) -> String {
        self.descriptor.address()
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Takes one more reference; fails once the count has reached zero.
    pub(crate) fn acquire(&self) -> bool {
        self.ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count > 0).then(|| count + 1)
            })
            .is_ok()
    }

    pub(crate) fn release(&self) -> ReleaseOutcome {
        match self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            }) {
            Ok(1) => ReleaseOutcome::LastReference,
            Ok(previous) => ReleaseOutcome::Retained(previous - 1),
            Err(_) => ReleaseOutcome::AlreadyReleased,
        }
    }

    fn current(&self) -> Arc<dyn Client> {
        let guard = self.inner.load();
        Arc::clone(&**guard)
    }

    pub(crate) async fn request(&self, invocation: Invocation) -> Result<Value, RpcError> {
        self.current().request(invocation).await
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.current().is_connected()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.current().is_closed()
    }

    /// Swaps in a lazily reconnecting ghost and closes the real connection.
    ///
    /// Stray requests through a released reference keep working through the ghost.
    async fn retire(&self) -> Arc<LazyConnectClient> {
        let ghost_descriptor = self
            .descriptor
            .with_parameter(keys::SEND_RECONNECT, "true")
            .with_parameter(keys::LAZY_CONNECT, "true");
        let ghost = Arc::new(LazyConnectClient::ghost(
            ghost_descriptor,
            self.transporter.clone(),
            self.handler.clone(),
        ));
        let replaced = self.inner.swap(Arc::new(ghost.clone() as Arc<dyn Client>));
        self.close_connection(&*replaced).await;
        ghost
    }

    /// Closes the connection regardless of outstanding references.
    ///
    /// Returns `None` when the count had already reached zero and the connection was
    /// closed by its last release.
    pub(crate) async fn force_close(&self) -> Option<Result<(), TransportError>> {
        if self.ref_count.swap(0, Ordering::AcqRel) == 0 {
            return None;
        }
        Some(self.current().close().await)
    }

    async fn close_connection(&self, client: &Arc<dyn Client>) {
        match client.close().await {
            Ok(()) => debug!(
                event = events::SHARED_CLIENT_CLOSE,
                component = COMPONENT,
                address = %self.address(),
                "shared connection closed after last release"
            ),
            Err(err) => warn!(
                event = events::SHARED_CLIENT_CLOSE_FAILED,
                component = COMPONENT,
                address = %self.address(),
                err = %err,
                "unable to close shared connection after last release"
            ),
        }
    }
}

/// Shared-connection and ghost registries, both keyed by `host:port`.
pub(crate) struct SharedClientRegistry {
    slots: AddressSlots<Arc<ReferenceCountClient>>,
    ghosts: DashMap<String, Arc<LazyConnectClient>>,
}

impl SharedClientRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: AddressSlots::new(),
            ghosts: DashMap::new(),
        }
    }

    pub(crate) fn slot(&self, address: &str) -> Slot<Arc<ReferenceCountClient>> {
        self.slots.slot(address)
    }

    /// Drops the ghost for `address` once a real shared client is installed there.
    ///
    /// Callers hold the address slot.
    pub(crate) async fn discard_ghost(&self, address: &str) {
        let Some((_, ghost)) = self.ghosts.remove(address) else {
            return;
        };
        debug!(
            event = events::GHOST_CLIENT_REMOVE,
            component = COMPONENT,
            address,
            connected = ghost.has_connection(),
            "ghost client replaced by shared client"
        );
        if let Err(err) = ghost.close().await {
            warn!(
                event = events::GHOST_CLIENT_REMOVE,
                component = COMPONENT,
                address,
                err = %err,
                "unable to close replaced ghost client"
            );
        }
    }

    /// Gives back one reference of `client`.
    ///
    /// The last release retires the connection, registers its ghost and empties the slot,
    /// all inside the address critical section.
    pub(crate) async fn release(&self, client: &Arc<ReferenceCountClient>) {
        let address = client.address();
        if self.release_in_slot(&address, client).await {
            self.slots.remove_if_idle(&address);
        }
    }

    /// Returns `true` when the slot was emptied by this release.
    async fn release_in_slot(&self, address: &str, client: &Arc<ReferenceCountClient>) -> bool {
        let slot = self.slots.slot(address);
        let mut current = slot.lock().await;

        match client.release() {
            ReleaseOutcome::Retained(remaining) => {
                debug!(
                    event = events::SHARED_CLIENT_RELEASE,
                    component = COMPONENT,
                    address = %address,
                    ref_count = remaining,
                    "shared client reference released"
                );
                false
            }
            ReleaseOutcome::LastReference => {
                let ghost = client.retire().await;
                if let Some(replaced) = self.ghosts.insert(address.to_string(), ghost) {
                    // An evicted wrapper left its ghost behind before this release.
                    if let Err(err) = replaced.close().await {
                        warn!(
                            event = events::GHOST_CLIENT_REMOVE,
                            component = COMPONENT,
                            address = %address,
                            err = %err,
                            "unable to close superseded ghost client"
                        );
                    }
                }
                debug!(
                    event = events::GHOST_CLIENT_INSTALL,
                    component = COMPONENT,
                    address = %address,
                    "ghost client installed for released shared client"
                );
                if current
                    .as_ref()
                    .is_some_and(|installed| Arc::ptr_eq(installed, client))
                {
                    *current = None;
                    return true;
                }
                false
            }
            ReleaseOutcome::AlreadyReleased => {
                debug!(
                    event = events::SHARED_CLIENT_RELEASE_AFTER_CLOSE,
                    component = COMPONENT,
                    address = %address,
                    ref_count = 0,
                    "release of an already closed shared client ignored"
                );
                false
            }
        }
    }

    pub(crate) async fn ref_count(&self, address: &str) -> Option<usize> {
        self.slots
            .get(address)
            .await
            .map(|client| client.ref_count())
    }

    pub(crate) fn ghost_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.ghosts.iter().map(|entry| entry.key().clone()).collect();
        addresses.sort();
        addresses
    }

    pub(crate) async fn drain_shared(&self) -> Vec<(String, Arc<ReferenceCountClient>)> {
        self.slots.drain().await
    }

    pub(crate) fn drain_ghosts(&self) -> Vec<(String, Arc<LazyConnectClient>)> {
        self.ghost_addresses()
            .into_iter()
            .filter_map(|address| self.ghosts.remove(&address))
            .collect()
    }
}

/// One caller's reference on a shared client; releasing it twice is a no-op.
pub(crate) struct SharedLease {
    registry: Arc<SharedClientRegistry>,
    client: Arc<ReferenceCountClient>,
    released: AtomicBool,
}

impl SharedLease {
    pub(crate) fn new(registry: Arc<SharedClientRegistry>, client: Arc<ReferenceCountClient>) -> Self {
        Self {
            registry,
            client,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn client(&self) -> &ReferenceCountClient {
        &self.client
    }

    pub(crate) async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.release(&self.client).await;
    }
}

#[cfg(test)]
mod tests {
    use super::{ReferenceCountClient, ReleaseOutcome, SharedClientRegistry, SharedLease};
    use crate::descriptor::EndpointDescriptor;
    use crate::invocation::Invocation;
    use crate::test_support::{NoopHandler, RecordingClient, RecordingTransporter};
    use crate::transport::Client;
    use std::sync::Arc;

    fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::new("rpc", "10.0.0.9", 20880, "com.x.Foo")
    }

    fn wrapper(
        inner: Arc<RecordingClient>,
        transporter: Arc<RecordingTransporter>,
    ) -> Arc<ReferenceCountClient> {
        Arc::new(ReferenceCountClient::new(
            descriptor(),
            inner,
            transporter,
            Arc::new(NoopHandler),
        ))
    }

    #[test]
    fn count_never_rises_after_reaching_zero() {
        let client = wrapper(
            Arc::new(RecordingClient::new(descriptor())),
            Arc::new(RecordingTransporter::default()),
        );

        assert!(client.acquire());
        assert_eq!(client.release(), ReleaseOutcome::Retained(1));
        assert_eq!(client.release(), ReleaseOutcome::LastReference);
        assert_eq!(client.release(), ReleaseOutcome::AlreadyReleased);
        assert!(!client.acquire());
        assert_eq!(client.ref_count(), 0);
    }

    #[tokio::test]
    async fn last_release_closes_once_and_installs_ghost() {
        let registry = Arc::new(SharedClientRegistry::new());
        let transporter = Arc::new(RecordingTransporter::default());
        let inner = Arc::new(RecordingClient::new(descriptor()));
        let client = wrapper(inner.clone(), transporter.clone());
        *registry.slot("10.0.0.9:20880").lock().await = Some(client.clone());
        assert!(client.acquire());

        let first = SharedLease::new(registry.clone(), client.clone());
        let second = SharedLease::new(registry.clone(), client.clone());
        first.release().await;
        first.release().await;
        assert_eq!(inner.close_count(), 0);
        assert_eq!(registry.ref_count("10.0.0.9:20880").await, Some(1));

        second.release().await;
        assert_eq!(inner.close_count(), 1);
        assert_eq!(registry.ref_count("10.0.0.9:20880").await, None);
        assert_eq!(registry.ghost_addresses(), vec!["10.0.0.9:20880"]);

        // A stray request through the released wrapper reconnects through the ghost.
        client
            .request(Invocation::new("late", vec![]))
            .await
            .expect("ghost request should reconnect");
        assert_eq!(transporter.connect_count(), 1);
        assert_eq!(inner.close_count(), 1);
    }

    #[tokio::test]
    async fn force_close_skips_connections_closed_by_release() {
        let inner = Arc::new(RecordingClient::new(descriptor()));
        let client = wrapper(inner.clone(), Arc::new(RecordingTransporter::default()));

        assert!(client.force_close().await.is_some());
        assert!(client.force_close().await.is_none());
        assert_eq!(client.release(), ReleaseOutcome::AlreadyReleased);
        assert_eq!(inner.close_count(), 1);
        assert!(inner.is_closed());
    }
}
