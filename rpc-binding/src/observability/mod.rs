//! Structured logging vocabulary.
//!
//! Library code emits `tracing` events carrying `event` and `component` fields whose
//! values come from [`events`] and [`fields`]. No subscriber is installed here.

pub mod events;
pub mod fields;
