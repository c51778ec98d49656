//! Lifecycle management subsystem.
//!
//! Startup order is config first, then observability, then the listener.
//! Shutdown is a broadcast signal: the server stops accepting, in-flight
//! requests drain, sinks flush.

pub mod shutdown;

pub use shutdown::Shutdown;
