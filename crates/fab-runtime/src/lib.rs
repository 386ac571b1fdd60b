//! fab-runtime library target.
//!
//! Exposes the wiring and supervisor types for integration tests. The binary
//! `main.rs` depends on this library target, mirroring the thin-main shape
//! every daemon-style crate in this workspace follows.

pub mod gate;
pub mod metrics_source;
pub mod supervisor;
pub mod tracing_init;
pub mod wiring;
