//! Chat Gateway Library
//!
//! Request-handling core for a chatbot backend: correlation ids, span
//! tracking, fixed-window rate limiting, structured multi-sink logging, and
//! the HTTP pipeline composing them around the downstream AI and
//! persistence collaborators.

pub mod config;
pub mod downstream;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
