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

//! Process-boundary helpers shared by the `rpc-binding` integration tests.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

const DEFAULT_TEST_LOG_FILTER: &str = "rpc_binding=debug";

static INIT_LOGGING: Once = Once::new();

/// Installs a `tracing` subscriber once per test binary.
///
/// `RUST_LOG` overrides the default filter. Safe to call from every test.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_LOG_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
