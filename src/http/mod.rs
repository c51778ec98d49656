//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, correlation + access-log + timeout layers)
//!     → chat.rs (rate limit → validate → spanned handler pipeline)
//!     → health.rs (health probe, metrics and logs feeds)
//!     → error.rs (failure kinds → JSON responses)
//! ```

pub mod chat;
pub mod error;
pub mod health;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, GatewayServer};
