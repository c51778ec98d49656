//! Span tracking: timed, attributed records of units of work.
//!
//! # Data Flow
//! ```text
//! Tracer::in_span / in_child
//!     → RecordingSpan (registered in the active-span registry)
//!     → set_attribute / add_event / record_exception while running
//!     → end() (exactly once; idempotent)
//!     → SpanRecord → log sink (DEBUG) + recent ring [+ HTTP exporter]
//! ```
//!
//! # Design Decisions
//! - One `Span` trait, two implementations (recording and no-op) behind the
//!   `Tracer` factory, so pipeline code is identical with tracing off
//! - Durations come from a monotonic clock; wall timestamps are recorded
//!   separately for export
//! - Exporter trouble never fails a request: the exporter disables itself
//!   after the first failure and reports it once at DEBUG

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;

use crate::config::schema::TracingConfig;
use crate::observability::correlation::CorrelationId;
use crate::observability::logging::Logger;

const RECENT_SPAN_CAPACITY: usize = 256;

/// Terminal state of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpanStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// A timestamped event attached to a span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: Map<String, Value>,
}

/// A finished span, as exported to the sinks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub trace_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: SpanStatus,
    pub attributes: Map<String, Value>,
    pub events: Vec<SpanEvent>,
}

/// A unit of work being measured.
///
/// Attribute and event calls after `end()` are ignored; `end()` itself is
/// idempotent and never double-emits.
pub trait Span: Send + Sync {
    /// Span id; empty for the no-op implementation.
    fn id(&self) -> &str;

    /// Correlation id this span belongs to, if any.
    fn trace_id(&self) -> Option<String>;

    fn set_attribute(&self, key: &str, value: Value);

    fn add_event(&self, name: &str, attributes: Value);

    /// Append an `exception` event and mark the span errored.
    /// Does not end the span.
    fn record_exception(&self, error: &dyn std::error::Error);

    /// Finalize the span and emit it. Safe to call more than once.
    fn end(&self);

    fn status(&self) -> SpanStatus;
}

struct SpanState {
    name: String,
    parent_id: Option<String>,
    trace_id: Option<String>,
    started_at: DateTime<Utc>,
    start: Instant,
    attributes: Map<String, Value>,
    events: Vec<SpanEvent>,
    status: SpanStatus,
    ended: bool,
}

struct RecordingSpan {
    id: String,
    shared: Arc<TracerShared>,
    state: Mutex<SpanState>,
}

impl Span for RecordingSpan {
    fn id(&self) -> &str {
        &self.id
    }

    fn trace_id(&self) -> Option<String> {
        self.state.lock().expect("span state poisoned").trace_id.clone()
    }

    fn set_attribute(&self, key: &str, value: Value) {
        let mut state = self.state.lock().expect("span state poisoned");
        if state.ended {
            return;
        }
        state.attributes.insert(key.to_string(), value);
    }

    fn add_event(&self, name: &str, attributes: Value) {
        let mut state = self.state.lock().expect("span state poisoned");
        if state.ended {
            return;
        }
        let attributes = match attributes {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        state.events.push(SpanEvent {
            name: name.to_string(),
            timestamp: Utc::now(),
            attributes,
        });
    }

    fn record_exception(&self, error: &dyn std::error::Error) {
        let mut state = self.state.lock().expect("span state poisoned");
        if state.ended {
            return;
        }
        let mut attributes = Map::new();
        attributes.insert("exception.message".to_string(), json!(error.to_string()));
        if let Some(source) = error.source() {
            attributes.insert("exception.cause".to_string(), json!(source.to_string()));
        }
        state.events.push(SpanEvent {
            name: "exception".to_string(),
            timestamp: Utc::now(),
            attributes,
        });
        state.status = SpanStatus::Error;
    }

    fn end(&self) {
        let record = {
            // Also runs on the Drop path; a poisoned lock must not panic here.
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if state.ended {
                return;
            }
            state.ended = true;
            SpanRecord {
                id: self.id.clone(),
                name: state.name.clone(),
                parent_id: state.parent_id.clone(),
                trace_id: state.trace_id.clone(),
                started_at: state.started_at,
                ended_at: Utc::now(),
                duration_ms: state.start.elapsed().as_millis() as u64,
                status: state.status,
                attributes: state.attributes.clone(),
                events: state.events.clone(),
            }
        };
        self.shared.finish(record);
    }

    fn status(&self) -> SpanStatus {
        self.state.lock().expect("span state poisoned").status
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        // Belt for spans that escape the run-in-span wrappers.
        self.end();
    }
}

/// Span implementation used when tracing is disabled or degraded.
/// Every operation is a no-op; callers cannot tell the difference.
struct NoopSpan;

impl Span for NoopSpan {
    fn id(&self) -> &str {
        ""
    }

    fn trace_id(&self) -> Option<String> {
        None
    }

    fn set_attribute(&self, _key: &str, _value: Value) {}

    fn add_event(&self, _name: &str, _attributes: Value) {}

    fn record_exception(&self, _error: &dyn std::error::Error) {}

    fn end(&self) {}

    fn status(&self) -> SpanStatus {
        SpanStatus::Ok
    }
}

struct SpanExporter {
    tx: tokio::sync::mpsc::UnboundedSender<SpanRecord>,
}

impl SpanExporter {
    /// Spawn the export task. Requires a running Tokio runtime.
    fn spawn(endpoint: String, service_name: String, logger: Logger) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SpanRecord>();
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let mut degraded = false;
            while let Some(record) = rx.recv().await {
                if degraded {
                    continue;
                }
                let payload = json!({
                    "resource": { "service.name": service_name },
                    "spans": [record],
                });
                match client.post(&endpoint).json(&payload).send().await {
                    Ok(response) if response.status().is_success() => {}
                    Ok(response) => {
                        degraded = true;
                        logger.debug(
                            "Span exporter rejected payload, export disabled",
                            json!({"status": response.status().as_u16()}),
                        );
                    }
                    Err(e) => {
                        degraded = true;
                        logger.debug(
                            "Span exporter unreachable, export disabled",
                            json!({"error": e.to_string()}),
                        );
                    }
                }
            }
        });
        Self { tx }
    }
}

struct TracerShared {
    enabled: bool,
    logger: Logger,
    /// Active spans, keyed by span id. Touched only by a span's creator and
    /// its `end()` call, so there is no cross-request contention per key.
    registry: DashMap<String, String>,
    recent: Mutex<VecDeque<SpanRecord>>,
    exporter: Option<SpanExporter>,
}

impl TracerShared {
    fn finish(&self, record: SpanRecord) {
        self.registry.remove(&record.id);

        {
            let mut recent = self.recent.lock().expect("recent span ring poisoned");
            if recent.len() == RECENT_SPAN_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(record.clone());
        }

        self.logger.emit(
            crate::observability::logging::LogLevel::Debug,
            format!("Span completed: {}", record.name),
            record.trace_id.clone(),
            json!({
                "spanId": record.id,
                "parentId": record.parent_id,
                "durationMs": record.duration_ms,
                "status": record.status,
            }),
        );

        if let Some(exporter) = &self.exporter {
            // Export task gone or saturated: drop, never block.
            let _ = exporter.tx.send(record);
        }
    }
}

/// Factory for spans. Cheap to clone; shared across the pipeline.
#[derive(Clone)]
pub struct Tracer {
    shared: Arc<TracerShared>,
}

impl Tracer {
    /// Build a tracer from configuration.
    ///
    /// Must run inside a Tokio runtime when an exporter endpoint is
    /// configured (the export task is spawned here).
    pub fn new(config: &TracingConfig, logger: Logger) -> Self {
        let exporter = match (&config.exporter_endpoint, config.enabled) {
            (Some(endpoint), true) => Some(SpanExporter::spawn(
                endpoint.clone(),
                config.service_name.clone(),
                logger.clone(),
            )),
            _ => None,
        };
        Self {
            shared: Arc::new(TracerShared {
                enabled: config.enabled,
                logger,
                registry: DashMap::new(),
                recent: Mutex::new(VecDeque::new()),
                exporter,
            }),
        }
    }

    /// A tracer that hands out no-op spans only.
    pub fn disabled(logger: Logger) -> Self {
        Self::new(
            &TracingConfig {
                enabled: false,
                exporter_endpoint: None,
                service_name: String::new(),
            },
            logger,
        )
    }

    /// Start a root span tied to a request's correlation id.
    pub fn start_span(&self, name: &str, trace_id: Option<&CorrelationId>) -> Arc<dyn Span> {
        self.make_span(name, None, trace_id.map(|id| id.as_str().to_string()))
    }

    /// Start a child span; inherits the parent's correlation id.
    pub fn start_child(&self, name: &str, parent: &dyn Span) -> Arc<dyn Span> {
        let parent_id = (!parent.id().is_empty()).then(|| parent.id().to_string());
        self.make_span(name, parent_id, parent.trace_id())
    }

    fn make_span(
        &self,
        name: &str,
        parent_id: Option<String>,
        trace_id: Option<String>,
    ) -> Arc<dyn Span> {
        if !self.shared.enabled {
            return Arc::new(NoopSpan);
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.shared.registry.insert(id.clone(), name.to_string());
        Arc::new(RecordingSpan {
            id,
            shared: Arc::clone(&self.shared),
            state: Mutex::new(SpanState {
                name: name.to_string(),
                parent_id,
                trace_id,
                started_at: Utc::now(),
                start: Instant::now(),
                attributes: Map::new(),
                events: Vec::new(),
                status: SpanStatus::Ok,
                ended: false,
            }),
        })
    }

    /// Run `f` inside a new root span, guaranteeing exactly one `end()` on
    /// both the success and failure path. Failures are recorded on the span
    /// and re-propagated untouched.
    pub async fn in_span<T, E, F, Fut>(
        &self,
        name: &str,
        trace_id: Option<&CorrelationId>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Arc<dyn Span>) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let span = self.start_span(name, trace_id);
        Self::run(span, f).await
    }

    /// Like [`Tracer::in_span`], under an existing parent.
    pub async fn in_child<T, E, F, Fut>(
        &self,
        name: &str,
        parent: &dyn Span,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Arc<dyn Span>) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let span = self.start_child(name, parent);
        Self::run(span, f).await
    }

    async fn run<T, E, F, Fut>(span: Arc<dyn Span>, f: F) -> Result<T, E>
    where
        F: FnOnce(Arc<dyn Span>) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let result = f(Arc::clone(&span)).await;
        match &result {
            Ok(_) => span.end(),
            Err(e) => {
                span.record_exception(e);
                span.end();
            }
        }
        result
    }

    /// Number of spans currently in flight.
    pub fn active_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Recently finished spans, oldest first.
    pub fn finished(&self) -> Vec<SpanRecord> {
        self.shared
            .recent
            .lock()
            .expect("recent span ring poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::LogLevel;
    use std::io;

    fn test_tracer() -> Tracer {
        let logger = Logger::with_sinks(LogLevel::Debug, Vec::new(), 16);
        Tracer::new(
            &TracingConfig {
                enabled: true,
                exporter_endpoint: None,
                service_name: "test".to_string(),
            },
            logger,
        )
    }

    #[test]
    fn span_lifecycle_and_registry() {
        let tracer = test_tracer();
        let span = tracer.start_span("work", None);
        assert_eq!(tracer.active_count(), 1);

        span.set_attribute("size", json!(42));
        span.end();

        assert_eq!(tracer.active_count(), 0);
        let finished = tracer.finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].name, "work");
        assert_eq!(finished[0].status, SpanStatus::Ok);
        assert_eq!(finished[0].attributes["size"], json!(42));
    }

    #[test]
    fn end_is_idempotent() {
        let tracer = test_tracer();
        let span = tracer.start_span("once", None);
        span.end();
        let first = tracer.finished()[0].duration_ms;

        std::thread::sleep(std::time::Duration::from_millis(5));
        span.end();

        let finished = tracer.finished();
        assert_eq!(finished.len(), 1, "second end must not re-emit");
        assert_eq!(finished[0].duration_ms, first, "duration must not change");
    }

    #[test]
    fn attributes_after_end_are_ignored() {
        let tracer = test_tracer();
        let span = tracer.start_span("late", None);
        span.end();
        span.set_attribute("ignored", json!(true));
        assert!(tracer.finished()[0].attributes.is_empty());
    }

    #[test]
    fn record_exception_marks_error_without_ending() {
        let tracer = test_tracer();
        let span = tracer.start_span("failing", None);
        span.record_exception(&io::Error::new(io::ErrorKind::Other, "boom"));

        assert_eq!(span.status(), SpanStatus::Error);
        assert_eq!(tracer.active_count(), 1, "still running");

        span.end();
        let record = &tracer.finished()[0];
        assert_eq!(record.status, SpanStatus::Error);
        assert_eq!(record.events.len(), 1);
        assert_eq!(record.events[0].name, "exception");
        assert_eq!(record.events[0].attributes["exception.message"], json!("boom"));
    }

    #[tokio::test]
    async fn in_span_ends_on_success() {
        let tracer = test_tracer();
        let result: Result<u32, io::Error> = tracer
            .in_span("ok-path", None, |span| async move {
                span.set_attribute("n", json!(1));
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(tracer.active_count(), 0);
        assert_eq!(tracer.finished()[0].status, SpanStatus::Ok);
    }

    #[tokio::test]
    async fn in_span_ends_and_repropagates_on_failure() {
        let tracer = test_tracer();
        let result: Result<(), io::Error> = tracer
            .in_span("err-path", None, |_span| async move {
                Err(io::Error::new(io::ErrorKind::Other, "downstream down"))
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "downstream down");
        assert_eq!(tracer.active_count(), 0);
        let record = &tracer.finished()[0];
        assert_eq!(record.status, SpanStatus::Error);
        assert_eq!(record.events[0].name, "exception");
    }

    #[tokio::test]
    async fn child_spans_link_parent_and_trace() {
        let tracer = test_tracer();
        let correlation = CorrelationId::generate();
        let result: Result<(), io::Error> = tracer
            .in_span("parent", Some(&correlation), |parent| {
                let tracer = tracer.clone();
                async move {
                    tracer
                        .in_child("child", parent.as_ref(), |_child| async move { Ok(()) })
                        .await
                }
            })
            .await;
        result.unwrap();

        let finished = tracer.finished();
        assert_eq!(finished.len(), 2);
        let child = finished.iter().find(|s| s.name == "child").unwrap();
        let parent = finished.iter().find(|s| s.name == "parent").unwrap();
        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(child.trace_id.as_deref(), Some(correlation.as_str()));
        assert_eq!(parent.trace_id.as_deref(), Some(correlation.as_str()));
    }

    #[test]
    fn poisoned_span_still_ends_on_drop() {
        let logger = Logger::with_sinks(LogLevel::Debug, Vec::new(), 16);
        let shared = Arc::new(TracerShared {
            enabled: true,
            logger,
            registry: DashMap::new(),
            recent: Mutex::new(VecDeque::new()),
            exporter: None,
        });
        let span = Arc::new(RecordingSpan {
            id: "poisoned".to_string(),
            shared: Arc::clone(&shared),
            state: Mutex::new(SpanState {
                name: "work".to_string(),
                parent_id: None,
                trace_id: None,
                started_at: Utc::now(),
                start: Instant::now(),
                attributes: Map::new(),
                events: Vec::new(),
                status: SpanStatus::Ok,
                ended: false,
            }),
        });

        let locker = Arc::clone(&span);
        std::thread::spawn(move || {
            let _guard = locker.state.lock().unwrap();
            panic!("poison the span lock");
        })
        .join()
        .unwrap_err();

        // Must not panic (a panic here would abort the process in real use).
        drop(span);
        assert_eq!(shared.recent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_tracer_still_runs_work_and_propagates_errors() {
        let logger = Logger::with_sinks(LogLevel::Debug, Vec::new(), 16);
        let tracer = Tracer::disabled(logger);

        let ok: Result<u32, io::Error> = tracer
            .in_span("noop", None, |span| async move {
                assert_eq!(span.id(), "");
                Ok(3)
            })
            .await;
        assert_eq!(ok.unwrap(), 3);

        let err: Result<(), io::Error> = tracer
            .in_span("noop", None, |_| async move {
                Err(io::Error::new(io::ErrorKind::Other, "still surfaced"))
            })
            .await;
        assert!(err.is_err());

        assert_eq!(tracer.active_count(), 0);
        assert!(tracer.finished().is_empty());
    }
}
