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

//! Listening endpoints, at most one per local address.

use crate::runtime::address_slots::{AddressSlots, Slot};
use crate::transport::Server;
use std::sync::Arc;

pub(crate) struct ServerRegistry {
    slots: AddressSlots<Arc<dyn Server>>,
}

impl ServerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: AddressSlots::new(),
        }
    }

    /// Critical section for bind/reset decisions on `address`.
    pub(crate) fn slot(&self, address: &str) -> Slot<Arc<dyn Server>> {
        self.slots.slot(address)
    }

    pub(crate) async fn get(&self, address: &str) -> Option<Arc<dyn Server>> {
        self.slots.get(address).await
    }

    pub(crate) async fn addresses(&self) -> Vec<String> {
        self.slots.occupied_addresses().await
    }

    /// Removes every endpoint from the registry so no new work reaches it.
    pub(crate) async fn drain(&self) -> Vec<(String, Arc<dyn Server>)> {
        self.slots.drain().await
    }
}
