//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → correlation.rs (assign/propagate trace id, X-Trace-Id header)
//!     → spans.rs (timed, attributed spans around units of work)
//!     → logging.rs (leveled entries, every line tagged with the trace id)
//!     → metrics.rs (counters + latency ring for the dashboard)
//!
//! Consumers:
//!     → Console + rolling log files (general and error-only)
//!     → GET /api/logs and GET /api/metrics (dashboard feeds)
//!     → Optional span exporter endpoint
//! ```
//!
//! # Design Decisions
//! - The trace id flows through every log entry and span of a request
//! - Log and span emission is fire-and-forget; observability failures are
//!   absorbed here and never affect request handling
//! - Tracing is switchable: with it off the same pipeline code runs on
//!   no-op spans

pub mod correlation;
pub mod logging;
pub mod metrics;
pub mod spans;

pub use correlation::{CorrelationId, TRACE_ID_HEADER};
pub use logging::{LogLevel, Logger, RequestLogger};
pub use metrics::MetricsRecorder;
pub use spans::{Span, SpanStatus, Tracer};
