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

//! # rpc-binding
//!
//! `rpc-binding` is the transport-binding layer of an RPC system. It turns service
//! exports into listening endpoints, service references into pooled connections, and
//! routes inbound calls to the executor exported under the matching service key.
//!
//! Typical usage is API-first and centered on [`RpcProtocol`]. Framing, codecs and sockets
//! are supplied by a [`Transporter`] registered in a [`TransportRegistry`].
//!
//! ## Export and refer
//!
//! ```
//! use rpc_binding::descriptor::keys;
//! use rpc_binding::test_support::{RecordingExecutor, RecordingTransporter};
//! use rpc_binding::{EndpointDescriptor, Invocation, ProtocolConfig, RpcProtocol, TransportRegistry};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transporter = Arc::new(RecordingTransporter::default());
//! let protocol = RpcProtocol::new(
//!     ProtocolConfig::default(),
//!     TransportRegistry::new().with_transport("tcp", transporter.clone()),
//! );
//!
//! let provider = EndpointDescriptor::new("rpc", "10.0.0.1", 20880, "com.x.Foo")
//!     .with_parameter(keys::VERSION, "1.0.0");
//! let exporter = protocol
//!     .export(Arc::new(RecordingExecutor::default()), &provider)
//!     .await
//!     .unwrap();
//! assert_eq!(exporter.key(), "com.x.Foo:1.0.0:20880");
//! assert_eq!(protocol.server_addresses().await, vec!["10.0.0.1:20880"]);
//!
//! let invoker = protocol.refer("com.x.Foo", &provider).await.unwrap();
//! let reply = invoker.call(Invocation::new("sayHello", vec![])).await.unwrap();
//! assert_eq!(reply, "sayHello");
//!
//! let report = protocol.shutdown().await;
//! assert_eq!(report.servers_closed, 1);
//! assert_eq!(report.shared_clients_closed, 1);
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`RpcProtocol`], [`Exporter`], [`RemoteInvoker`], descriptors and calls
//! - Control plane: export lifecycle, binding/endpoint/stub-method registries, shutdown
//! - Routing: service-key computation and inbound resolution
//! - Data plane: request dispatch, shared and deferred client connections
//! - Runtime: per-address critical sections
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries and
//! tests are responsible for one-time `tracing_subscriber` initialization.

mod config;
pub use config::ProtocolConfig;

pub mod descriptor;
pub use descriptor::EndpointDescriptor;

mod error;
pub use error::{RpcError, TransportError};

mod invocation;
pub use invocation::{CallContext, Invocation};

pub mod transport;
pub use transport::{
    Channel, Client, DispatchOutcome, ExchangeHandler, InboundMessage, Server, TransportRegistry,
    Transporter,
};

mod exporter;
pub use exporter::Exporter;

mod invoker;
pub use invoker::{CallExecutor, RemoteInvoker};

mod protocol;
pub use protocol::RpcProtocol;

mod control_plane;
pub use control_plane::shutdown::ShutdownReport;

mod data_plane;
pub use data_plane::request_dispatcher::RequestDispatcher;

#[doc(hidden)]
pub mod observability;

mod routing;
pub use routing::service_key::{compute_key, ServiceKey};

mod runtime;

#[doc(hidden)]
pub mod test_support;
