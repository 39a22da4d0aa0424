use rpc_binding::descriptor::keys;
use rpc_binding::test_support::RecordingTransporter;
use rpc_binding::{EndpointDescriptor, ProtocolConfig, RpcProtocol, TransportRegistry};
use std::sync::Arc;

pub(crate) const PROVIDER_HOST: &str = "10.0.0.1";
pub(crate) const PROVIDER_PORT: u16 = 20880;

pub(crate) fn make_protocol(transporter: Arc<RecordingTransporter>) -> RpcProtocol {
    integration_test_utils::init_logging();
    RpcProtocol::new(
        ProtocolConfig::default(),
        TransportRegistry::new().with_transport("tcp", transporter),
    )
}

pub(crate) fn provider_descriptor(path: &str) -> EndpointDescriptor {
    EndpointDescriptor::new("rpc", PROVIDER_HOST, PROVIDER_PORT, path)
        .with_parameter(keys::VERSION, "1.0.0")
}

#[allow(dead_code)]
pub(crate) fn remote_descriptor(host: &str) -> EndpointDescriptor {
    EndpointDescriptor::new("rpc", host, PROVIDER_PORT, "com.x.Foo")
        .with_parameter(keys::VERSION, "1.0.0")
}
