//! Routing layer.
//!
//! Computes composite service keys and resolves inbound calls to exported bindings,
//! including the port selection and callback detection rules of the inbound path.
//!
//! ```
//! use rpc_binding::compute_key;
//!
//! assert_eq!(compute_key(20880, "com.x.Foo", "1.0.0", "g"), "g/com.x.Foo:1.0.0:20880");
//! assert_eq!(compute_key(20880, "com.x.Foo", "", ""), "com.x.Foo::20880");
//! ```

pub(crate) mod resolver;
pub(crate) mod service_key;
