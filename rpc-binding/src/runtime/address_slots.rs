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

//! Address-scoped async critical sections.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) type Slot<T> = Arc<Mutex<Option<T>>>;

/// One lazily created `tokio::sync::Mutex` per address, each guarding at most one value.
///
/// Releasing a value only sets the slot to `None`. A slot is removed only while it is
/// idle: empty, unlocked and not held by any caller. A lock handed out to one caller is
/// therefore never orphaned, and the map holds at most the addresses in use plus those
/// released since the last prune.
pub(crate) struct AddressSlots<T> {
    slots: DashMap<String, Slot<T>>,
}

impl<T: Clone> AddressSlots<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Returns the slot for `address`, creating an empty one on first use.
    pub(crate) fn slot(&self, address: &str) -> Slot<T> {
        if let Some(existing) = self.slots.get(address) {
            return existing.value().clone();
        }
        self.slots
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    fn snapshot(&self) -> Vec<(String, Slot<T>)> {
        // Collected up front so no map shard guard is held across an await.
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub(crate) async fn get(&self, address: &str) -> Option<T> {
        let slot = self.slots.get(address).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Addresses whose slot currently holds a value, sorted.
    pub(crate) async fn occupied_addresses(&self) -> Vec<String> {
        let mut addresses = Vec::new();
        for (address, slot) in self.snapshot() {
            if slot.lock().await.is_some() {
                addresses.push(address);
            }
        }
        addresses.sort();
        addresses
    }

    /// Removes the slot for `address` if it is idle.
    pub(crate) fn remove_if_idle(&self, address: &str) -> bool {
        self.slots
            .remove_if(address, |_, slot| is_idle(slot))
            .is_some()
    }

    /// Takes every held value out of its slot and prunes the slots left idle.
    pub(crate) async fn drain(&self) -> Vec<(String, T)> {
        let mut drained = Vec::new();
        for (address, slot) in self.snapshot() {
            if let Some(value) = slot.lock().await.take() {
                drained.push((address, value));
            }
        }
        self.slots.retain(|_, slot| !is_idle(slot));
        drained
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.len()
    }
}

// Callers clone a slot only through the map, so a count of one under the shard lock
// means nobody else can be holding or waiting on it.
fn is_idle<T>(slot: &Slot<T>) -> bool {
    Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|held| held.is_none())
}
