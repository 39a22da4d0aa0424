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
mod support;

use rpc_binding::descriptor::keys;
use rpc_binding::test_support::{RecordingExecutor, RecordingTransporter};
use rpc_binding::{RpcError, Server};
use std::sync::Arc;
use support::{make_protocol, provider_descriptor};

const PROVIDER_ADDRESS: &str = "10.0.0.1:20880";

#[tokio::test]
async fn second_export_to_same_address_reconfigures_endpoint() {
    let transporter = Arc::new(RecordingTransporter::default());
    let protocol = make_protocol(transporter.clone());

    protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo"),
        )
        .await
        .expect("first export");
    protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Bar").with_parameter(keys::HEARTBEAT, "5000"),
        )
        .await
        .expect("second export");

    assert_eq!(transporter.bind_count(), 1);
    assert_eq!(protocol.server_addresses().await, vec![PROVIDER_ADDRESS]);
    let server = transporter.servers()[0].clone();
    assert_eq!(server.reset_count(), 1);
    assert_eq!(server.descriptor().parameter(keys::HEARTBEAT), Some("5000"));
    assert_eq!(
        protocol.exported_keys(),
        vec!["com.x.Bar:1.0.0:20880", "com.x.Foo:1.0.0:20880"]
    );
}

#[tokio::test]
async fn reexport_replaces_binding_and_stale_unexport_is_ignored() {
    let transporter = Arc::new(RecordingTransporter::default());
    let protocol = make_protocol(transporter.clone());

    let first = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo"),
        )
        .await
        .expect("first export");
    let second = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo"),
        )
        .await
        .expect("re-export");

    assert_eq!(first.key(), second.key());
    assert!(!first.unexport());
    assert_eq!(protocol.exported_keys(), vec!["com.x.Foo:1.0.0:20880"]);
    assert!(second.unexport());
    assert!(protocol.exported_keys().is_empty());
}

#[tokio::test]
async fn group_and_version_shape_the_exported_key() {
    let protocol = make_protocol(Arc::new(RecordingTransporter::default()));

    let exporter = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo").with_parameter(keys::GROUP, "g"),
        )
        .await
        .expect("export");
    let unversioned = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Bar").with_parameter(keys::VERSION, ""),
        )
        .await
        .expect("export");

    assert_eq!(exporter.key(), "g/com.x.Foo:1.0.0:20880");
    assert_eq!(unversioned.key(), "com.x.Bar::20880");
}

#[tokio::test]
async fn bind_failure_is_fatal_and_restores_previous_binding() {
    let transporter = Arc::new(RecordingTransporter::default().failing_bind("address in use"));
    let protocol = make_protocol(transporter.clone());

    let previous = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo").with_parameter(keys::IS_SERVER, "false"),
        )
        .await
        .expect("non-server export never binds");

    let result = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo"),
        )
        .await;

    match result {
        Err(RpcError::EndpointBindFailed { source, .. }) => {
            assert_eq!(source.message(), "address in use");
        }
        other => panic!("expected EndpointBindFailed, got {:?}", other.map(|_| ())),
    }
    assert!(protocol.server_addresses().await.is_empty());
    assert_eq!(protocol.exported_keys(), vec!["com.x.Foo:1.0.0:20880"]);
    assert!(previous.unexport());
}

#[tokio::test]
async fn unsupported_server_transport_leaves_no_trace() {
    let transporter = Arc::new(RecordingTransporter::default());
    let protocol = make_protocol(transporter.clone());

    let result = protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo").with_parameter(keys::SERVER, "grizzly"),
        )
        .await;

    assert!(matches!(
        result,
        Err(RpcError::UnsupportedTransport { role: "server", .. })
    ));
    assert_eq!(transporter.bind_count(), 0);
    assert!(protocol.exported_keys().is_empty());
    assert!(protocol.server_addresses().await.is_empty());
}

#[tokio::test]
async fn closed_endpoint_is_replaced_instead_of_reset() {
    let transporter = Arc::new(RecordingTransporter::default());
    let protocol = make_protocol(transporter.clone());

    protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo"),
        )
        .await
        .expect("first export");
    let stale = transporter.servers()[0].clone();
    stale
        .close(std::time::Duration::from_millis(10))
        .await
        .expect("close outside the protocol");

    protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Bar"),
        )
        .await
        .expect("second export");

    assert_eq!(transporter.bind_count(), 2);
    assert_eq!(stale.reset_count(), 0);
    let current = protocol
        .server(PROVIDER_ADDRESS)
        .await
        .expect("endpoint for provider address");
    assert!(!current.is_closed());
}
