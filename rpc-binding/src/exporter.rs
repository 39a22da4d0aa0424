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

use crate::control_plane::exporter_registry::{ExporterRegistry, ServiceBinding};
use crate::descriptor::EndpointDescriptor;
use crate::observability::events;
use crate::routing::service_key::ServiceKey;
use std::sync::Arc;
use tracing::{debug, info};

const COMPONENT: &str = "exporter";

/// Handle to one exported service binding.
pub struct Exporter {
    binding: Arc<ServiceBinding>,
    exporters: Arc<ExporterRegistry>,
}

impl Exporter {
    pub(crate) fn new(binding: Arc<ServiceBinding>, exporters: Arc<ExporterRegistry>) -> Self {
        Self { binding, exporters }
    }

    pub fn key(&self) -> &ServiceKey {
        self.binding.key()
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        self.binding.descriptor()
    }

    /// Removes this binding from the registry.
    ///
    /// Does nothing once a later export replaced the binding under the same key, or after
    /// it was already removed.
    pub fn unexport(&self) -> bool {
        let removed = self.exporters.remove_if_current(&self.binding);
        if removed {
            info!(
                event = events::UNEXPORT_OK,
                component = COMPONENT,
                service_key = %self.key(),
                "service unexported"
            );
        } else {
            debug!(
                event = events::UNEXPORT_SKIPPED_REPLACED,
                component = COMPONENT,
                service_key = %self.key(),
                "binding no longer current, unexport skipped"
            );
        }
        removed
    }
}
