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
use rpc_binding::test_support::{RecordingExecutor, RecordingTransporter, StaticChannel};
use rpc_binding::{DispatchOutcome, ExchangeHandler, InboundMessage, Invocation, RpcError};
use serde_json::json;
use std::sync::Arc;
use support::{make_protocol, provider_descriptor};

fn call(method: &str, path: &str) -> Invocation {
    Invocation::new(method, vec![json!("world")])
        .with_attachment(keys::PATH, path)
        .with_attachment(keys::VERSION, "1.0.0")
}

#[tokio::test]
async fn bound_handler_routes_calls_to_exported_executor() {
    let transporter = Arc::new(RecordingTransporter::default());
    let protocol = make_protocol(transporter.clone());
    let executor = Arc::new(RecordingExecutor::default());
    protocol
        .export(executor.clone(), &provider_descriptor("com.x.Foo"))
        .await
        .expect("export");

    let handler = transporter.last_handler().expect("bind registered a handler");
    let channel = StaticChannel::new(
        provider_descriptor("com.x.Foo"),
        "10.0.0.1:20880",
        "10.0.0.2:50123",
    );
    let outcome = handler
        .reply(&channel, InboundMessage::Call(call("sayHello", "com.x.Foo")))
        .await
        .expect("call should dispatch");

    match outcome {
        DispatchOutcome::Reply(value) => assert_eq!(value, json!("sayHello")),
        DispatchOutcome::Dropped(reason) => panic!("unexpected drop: {reason}"),
    }
    let calls = executor.calls();
    assert_eq!(calls[0].0.arguments(), &[json!("world")]);
    assert_eq!(calls[0].1.remote_address().to_string(), "10.0.0.2:50123");
    assert_eq!(calls[0].1.local_address().to_string(), "10.0.0.1:20880");
}

#[tokio::test]
async fn unknown_key_fails_with_diagnostics_and_leaves_registry_alone() {
    let protocol = make_protocol(Arc::new(RecordingTransporter::default()));
    protocol
        .export(
            Arc::new(RecordingExecutor::default()),
            &provider_descriptor("com.x.Foo").with_parameter(keys::VERSION, "2.0.0"),
        )
        .await
        .expect("export");
    let keys_before = protocol.exported_keys();
    let channel = StaticChannel::new(
        provider_descriptor("com.x.Foo"),
        "10.0.0.1:20880",
        "10.0.0.2:50123",
    );

    let result = protocol
        .dispatcher()
        .reply(&channel, InboundMessage::Call(call("sayHello", "com.x.Foo")))
        .await;

    match result {
        Err(err @ RpcError::ServiceNotFound { .. }) => {
            let rendered = err.to_string();
            assert!(rendered.contains("com.x.Foo:1.0.0:20880"));
            assert!(rendered.contains("com.x.Foo:2.0.0:20880"));
        }
        other => panic!("expected ServiceNotFound, got {other:?}"),
    }
    assert_eq!(protocol.exported_keys(), keys_before);
}

#[tokio::test]
async fn executor_failure_becomes_the_call_result() {
    let protocol = make_protocol(Arc::new(RecordingTransporter::default()));
    protocol
        .export(
            Arc::new(RecordingExecutor::default().failing("boom")),
            &provider_descriptor("com.x.Foo"),
        )
        .await
        .expect("export");
    let channel = StaticChannel::new(
        provider_descriptor("com.x.Foo"),
        "10.0.0.1:20880",
        "10.0.0.2:50123",
    );

    let result = protocol
        .dispatcher()
        .handle(&channel, call("sayHello", "com.x.Foo"))
        .await;

    assert!(matches!(result, Err(RpcError::ServiceFailure(message)) if message == "boom"));
}

#[tokio::test]
async fn stub_event_dispatches_only_declared_methods() {
    let protocol = make_protocol(Arc::new(RecordingTransporter::default()));
    let executor = Arc::new(RecordingExecutor::default());
    protocol
        .export(
            executor.clone(),
            &provider_descriptor("com.x.Foo")
                .with_parameter(keys::STUB_EVENT, "true")
                .with_parameter(keys::STUB_EVENT_METHODS, "onConnect,onDisconnect"),
        )
        .await
        .expect("export");
    // Stub events resolve against the remote port of the channel.
    let channel = StaticChannel::new(
        provider_descriptor("com.x.Foo"),
        "10.0.0.1:43000",
        "10.0.0.2:20880",
    );
    let stub_call =
        |method: &str| call(method, "com.x.Foo").with_attachment(keys::STUB_EVENT, "true");

    let declared = protocol
        .dispatcher()
        .reply(&channel, InboundMessage::Call(stub_call("onConnect")))
        .await
        .expect("declared stub event");
    let undeclared = protocol
        .dispatcher()
        .reply(&channel, InboundMessage::Call(stub_call("onOther")))
        .await
        .expect("undeclared stub event is not an error");

    assert!(matches!(declared, DispatchOutcome::Reply(_)));
    assert!(undeclared.is_dropped());
    assert_eq!(executor.methods(), vec!["onConnect"]);
}

#[tokio::test]
async fn callback_call_checks_declared_methods() {
    let protocol = make_protocol(Arc::new(RecordingTransporter::default()));
    let executor = Arc::new(RecordingExecutor::default());
    // Callback bindings live on the consumer's local port with an instance suffix.
    let callback_descriptor =
        rpc_binding::EndpointDescriptor::new("rpc", "10.0.0.2", 50123, "com.x.Listener.3")
            .with_parameter(keys::VERSION, "1.0.0")
            .with_parameter(keys::METHODS, "onChange")
            .with_parameter(keys::IS_SERVER, "false");
    protocol
        .export(executor.clone(), &callback_descriptor)
        .await
        .expect("export callback");
    // The consumer's connection descriptor points at the provider it dialed.
    let channel = StaticChannel::new(
        provider_descriptor("com.x.Foo"),
        "10.0.0.2:50123",
        "10.0.0.1:20880",
    );
    let callback =
        |method: &str| call(method, "com.x.Listener").with_attachment(keys::CALLBACK_SERVICE, "3");

    let accepted = protocol
        .dispatcher()
        .reply(&channel, InboundMessage::Call(callback("onChange")))
        .await
        .expect("declared callback");
    let skewed = protocol
        .dispatcher()
        .reply(&channel, InboundMessage::Call(callback("onRename")))
        .await
        .expect("undeclared callback is dropped, not failed");

    assert!(matches!(accepted, DispatchOutcome::Reply(_)));
    assert!(matches!(
        skewed,
        DispatchOutcome::Dropped(RpcError::CallbackMethodRejected { ref method, .. }) if method == "onRename"
    ));
    assert_eq!(executor.call_count(), 1);
    assert!(executor.calls()[0].0.is_callback_invoke());
}

#[tokio::test]
async fn lifecycle_events_route_through_dispatch_and_failures_stay_contained() {
    let transporter = Arc::new(RecordingTransporter::default());
    let protocol = make_protocol(transporter.clone());
    let executor = Arc::new(RecordingExecutor::default().failing("hook failed"));
    protocol
        .export(
            executor.clone(),
            &provider_descriptor("com.x.Foo")
                .with_parameter(keys::ON_CONNECT, "onConnect")
                .with_parameter(keys::ON_DISCONNECT, "onDisconnect"),
        )
        .await
        .expect("export");
    let handler = transporter.last_handler().expect("bind registered a handler");
    let bound = transporter.bound_descriptors()[0].clone();
    let channel = StaticChannel::new(bound, "10.0.0.1:20880", "10.0.0.2:50123");

    handler.connected(&channel).await;
    handler.disconnected(&channel).await;

    assert_eq!(executor.methods(), vec!["onConnect", "onDisconnect"]);
}

#[tokio::test]
async fn unrecognized_message_is_a_protocol_failure() {
    let protocol = make_protocol(Arc::new(RecordingTransporter::default()));
    let channel = StaticChannel::new(
        provider_descriptor("com.x.Foo"),
        "10.0.0.1:20880",
        "10.0.0.2:50123",
    );

    let result = protocol
        .dispatcher()
        .received(
            &channel,
            InboundMessage::Unrecognized {
                kind: "text".to_string(),
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(RpcError::MalformedCallDescriptor { .. })
    ));
}
