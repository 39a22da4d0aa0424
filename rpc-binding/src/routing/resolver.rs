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

//! Inbound call resolution: port selection, callback detection and binding lookup.

use crate::control_plane::exporter_registry::{ExporterRegistry, ServiceBinding};
use crate::descriptor::keys;
use crate::error::RpcError;
use crate::invocation::Invocation;
use crate::routing::service_key::{compute_key, ServiceKey};
use crate::transport::Channel;
use std::net::IpAddr;
use std::sync::Arc;

const LOCALHOST: &str = "127.0.0.1";

/// Maps loopback and unspecified host spellings onto one canonical local address.
pub(crate) fn normalize_local_host(host: &str) -> String {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.eq_ignore_ascii_case("localhost") {
        return LOCALHOST.to_string();
    }
    match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_loopback() || ip.is_unspecified() => LOCALHOST.to_string(),
        _ => host.to_string(),
    }
}

/// Whether the channel's own descriptor points at the peer, i.e. this side opened the
/// connection as a client.
///
/// This is an address heuristic. NAT or loopback aliasing can make it misclassify.
pub(crate) fn is_client_side(channel: &dyn Channel) -> bool {
    let descriptor = channel.descriptor();
    let remote = channel.remote_address();
    descriptor.port() == remote.port()
        && normalize_local_host(descriptor.host()) == normalize_local_host(&remote.ip().to_string())
}

/// Computes the key an inbound call resolves to.
///
/// Marks callback invocations on `invocation` so the dispatcher can apply its method check.
pub(crate) fn resolve_key(channel: &dyn Channel, invocation: &mut Invocation) -> ServiceKey {
    let is_stub_event = invocation.is_stub_event();
    // Stub events are addressed to the stub on the connecting side.
    let port = if is_stub_event {
        channel.remote_address().port()
    } else {
        channel.local_address().port()
    };

    let mut path = invocation.attachment(keys::PATH).unwrap_or_default().to_string();
    if is_client_side(channel) && !is_stub_event {
        path.push('.');
        path.push_str(invocation.attachment(keys::CALLBACK_SERVICE).unwrap_or_default());
        invocation.set_attachment(keys::IS_CALLBACK_SERVICE_INVOKE, "true");
    }

    compute_key(
        port,
        &path,
        invocation.attachment(keys::VERSION).unwrap_or_default(),
        invocation.attachment(keys::GROUP).unwrap_or_default(),
    )
}

/// Resolves the binding serving `invocation`; a miss leaves `exporters` untouched.
pub(crate) fn resolve_binding(
    exporters: &ExporterRegistry,
    channel: &dyn Channel,
    invocation: &mut Invocation,
) -> Result<Arc<ServiceBinding>, RpcError> {
    let key = resolve_key(channel, invocation);
    exporters
        .get(&key)
        .ok_or_else(|| RpcError::ServiceNotFound {
            key: key.into_string(),
            known_keys: exporters.keys(),
            remote: channel.remote_address(),
            local: channel.local_address(),
        })
}
