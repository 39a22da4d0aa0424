//! Control-plane layer.
//!
//! Owns export orchestration, the exported-binding and listening-endpoint registries,
//! declared stub event methods, and process-wide shutdown. A second export to a bound
//! address reconfigures its endpoint in place, and a failed bind rolls the binding back.

pub(crate) mod export_lifecycle;
pub(crate) mod exporter_registry;
pub(crate) mod server_registry;
pub(crate) mod shutdown;
pub(crate) mod stub_methods;
