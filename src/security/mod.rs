//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming chat request:
//!     → rate_limit.rs (fixed-window check per client key)
//!     → rejected: 429 + retryAfter hint, logged at WARN, no span created
//!     → allowed: pass to the handler pipeline
//! ```

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RateLimitExceeded};
