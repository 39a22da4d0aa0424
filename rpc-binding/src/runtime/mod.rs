//! Runtime integration layer.
//!
//! Holds the per-address critical sections that serialize check-then-act mutations of
//! the listening-endpoint and shared-client registries. Network I/O performed under a
//! slot only blocks callers targeting the same address.

pub(crate) mod address_slots;
