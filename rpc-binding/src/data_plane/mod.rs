//! Data-plane layer.
//!
//! Owns inbound dispatch and outbound connections: the request dispatcher, the
//! reference-counted shared client with its ghost fallback, deferred connections, and
//! the shared-versus-dedicated connection policy.
//!
//! ```
//! use rpc_binding::test_support::RecordingTransporter;
//! use rpc_binding::{EndpointDescriptor, ProtocolConfig, RpcProtocol, TransportRegistry};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transporter = Arc::new(RecordingTransporter::default());
//! let protocol = RpcProtocol::new(
//!     ProtocolConfig::default(),
//!     TransportRegistry::new().with_transport("tcp", transporter.clone()),
//! );
//! let remote = EndpointDescriptor::new("rpc", "10.0.0.7", 20880, "com.x.Foo");
//!
//! // Two references to one address share a single connection.
//! let first = protocol.refer("com.x.Foo", &remote).await.unwrap();
//! let second = protocol.refer("com.x.Foo", &remote).await.unwrap();
//! assert_eq!(transporter.connect_count(), 1);
//! assert_eq!(protocol.shared_reference_count("10.0.0.7:20880").await, Some(2));
//!
//! first.destroy().await;
//! second.destroy().await;
//! assert_eq!(protocol.shared_reference_count("10.0.0.7:20880").await, None);
//! # });
//! ```

pub(crate) mod client_manager;
pub(crate) mod lazy_client;
pub(crate) mod request_dispatcher;
pub(crate) mod shared_client;
