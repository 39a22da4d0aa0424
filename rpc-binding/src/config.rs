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

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TRANSPORT: &str = "tcp";
pub const DEFAULT_HEARTBEAT_MS: u64 = 60_000;
pub const DEFAULT_SERVER_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Process-level settings of one [`RpcProtocol`](crate::RpcProtocol).
///
/// ```
/// use rpc_binding::ProtocolConfig;
///
/// let config = ProtocolConfig::from_json5_str("{ default_transport: 'mina' }").unwrap();
/// assert_eq!(config.default_transport, "mina");
/// assert_eq!(config.default_heartbeat_ms, 60_000);
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct ProtocolConfig {
    pub default_transport: String,
    pub default_heartbeat_ms: u64,
    pub server_shutdown_timeout_ms: u64,
    /// Enables the legacy-compatible codec for servers and for clients talking to
    /// legacy peers.
    pub compatible_codec: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            default_transport: DEFAULT_TRANSPORT.to_string(),
            default_heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            server_shutdown_timeout_ms: DEFAULT_SERVER_SHUTDOWN_TIMEOUT_MS,
            compatible_codec: false,
        }
    }
}

impl ProtocolConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(json5::from_str(contents)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }

    pub fn server_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.server_shutdown_timeout_ms)
    }
}
