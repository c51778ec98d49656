//! Structured, correlated, multi-sink logging.
//!
//! # Data Flow
//! ```text
//! Logger::log(level, message, attributes)
//!     → threshold filter
//!     → LogEntry (timestamp, level, message, traceId, attributes)
//!     → in-memory ring (recent entries, /api/logs feed)
//!     → per-sink channel → dedicated writer thread → console / rolling file
//! ```
//!
//! # Design Decisions
//! - Writes are fire-and-forget relative to the request lifecycle; each sink
//!   has its own writer thread, so per-sink ordering is the channel order
//! - Sink write failures are dropped; the first failure per sink is reported
//!   once to stderr as a fallback, never to the caller
//! - Files are JSON lines, rolled daily; console is a human-readable format

use std::collections::VecDeque;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::schema::LoggingConfig;
use crate::observability::correlation::CorrelationId;

/// Log severity, ordered most-to-least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Http,
    Debug,
}

impl LogLevel {
    /// Numeric severity; lower is more severe (error = 0, debug = 4).
    pub fn severity(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Http => 3,
            LogLevel::Debug => 4,
        }
    }

    /// Whether an entry at this level passes the given threshold.
    pub fn passes(self, threshold: LogLevel) -> bool {
        self.severity() <= threshold.severity()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "http" => Ok(LogLevel::Http),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized level name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

/// A single log record. Created per call, immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl LogEntry {
    fn console_line(&self) -> String {
        let mut line = format!(
            "{} {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.message
        );
        if let Some(id) = &self.correlation_id {
            line.push_str(&format!(" [{id}]"));
        }
        if !self.attributes.is_empty() {
            line.push(' ');
            line.push_str(&Value::Object(self.attributes.clone()).to_string());
        }
        line
    }
}

/// A logging output destination. Implementations run on a dedicated writer
/// thread and may block; they must never panic on write failure.
pub trait Sink: Send + 'static {
    /// Level filter; entries failing this never reach `write`.
    fn accepts(&self, level: LogLevel) -> bool {
        let _ = level;
        true
    }

    fn write(&mut self, entry: &LogEntry) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Human-readable sink writing to stdout.
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn write(&mut self, entry: &LogEntry) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", entry.console_line())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// JSON-lines sink with daily rotation: `<prefix>-YYYY-MM-DD.log`.
///
/// An optional severity cap turns this into a bucketed sink (e.g. the
/// error-only file).
pub struct RollingFileSink {
    directory: PathBuf,
    prefix: String,
    max_severity: Option<LogLevel>,
    current: Option<(NaiveDate, File)>,
}

impl RollingFileSink {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            max_severity: None,
            current: None,
        }
    }

    /// Restrict the sink to entries at least as severe as `level`.
    pub fn at_most(mut self, level: LogLevel) -> Self {
        self.max_severity = Some(level);
        self
    }

    fn file_for(&mut self, date: NaiveDate) -> io::Result<&mut File> {
        let stale = match &self.current {
            Some((open_date, _)) => *open_date != date,
            None => true,
        };
        if stale {
            let path = self
                .directory
                .join(format!("{}-{}.log", self.prefix, date.format("%Y-%m-%d")));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.current = Some((date, file));
        }
        match &mut self.current {
            Some((_, file)) => Ok(file),
            None => unreachable!("file opened above"),
        }
    }
}

impl Sink for RollingFileSink {
    fn accepts(&self, level: LogLevel) -> bool {
        match self.max_severity {
            Some(cap) => level.severity() <= cap.severity(),
            None => true,
        }
    }

    fn write(&mut self, entry: &LogEntry) -> io::Result<()> {
        let file = self.file_for(entry.timestamp.date_naive())?;
        let mut line = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push('\n');
        file.write_all(line.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some((_, file)) = &mut self.current {
            file.flush()?;
        }
        Ok(())
    }
}

enum SinkMessage {
    Entry(Arc<LogEntry>),
    Flush(mpsc::Sender<()>),
}

struct SinkWorker {
    tx: mpsc::Sender<SinkMessage>,
}

impl SinkWorker {
    fn spawn(mut sink: Box<dyn Sink>) -> Self {
        let (tx, rx) = mpsc::channel::<SinkMessage>();
        thread::Builder::new()
            .name("log-sink".to_string())
            .spawn(move || {
                let mut failure_reported = false;
                for message in rx {
                    match message {
                        SinkMessage::Entry(entry) => {
                            if !sink.accepts(entry.level) {
                                continue;
                            }
                            if let Err(e) = sink.write(&entry) {
                                // Dropped by design; report the first failure
                                // once to the fallback stream.
                                if !failure_reported {
                                    failure_reported = true;
                                    eprintln!("log sink write failed, dropping entries: {e}");
                                }
                            }
                        }
                        SinkMessage::Flush(ack) => {
                            let _ = sink.flush();
                            let _ = ack.send(());
                        }
                    }
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| eprintln!("failed to spawn log sink thread: {e}"));
        Self { tx }
    }
}

struct LoggerInner {
    threshold: LogLevel,
    sinks: Vec<SinkWorker>,
    recent: Mutex<VecDeque<LogEntry>>,
    recent_capacity: usize,
}

/// Leveled, correlated, multi-sink logger. Cheap to clone.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Build a logger from configuration: console sink plus, when enabled, a
    /// general rolling file and an error-only rolling file.
    ///
    /// Never fails: if the log directory cannot be created, the file sinks
    /// are skipped and the logger degrades to console-only.
    pub fn new(config: &LoggingConfig) -> Self {
        let threshold = config.level.parse().unwrap_or(LogLevel::Info);
        let mut sinks: Vec<Box<dyn Sink>> = vec![Box::new(ConsoleSink)];

        if config.file_sinks_enabled {
            match std::fs::create_dir_all(&config.directory) {
                Ok(()) => {
                    sinks.push(Box::new(RollingFileSink::new(&config.directory, "application")));
                    sinks.push(Box::new(
                        RollingFileSink::new(&config.directory, "error").at_most(LogLevel::Error),
                    ));
                }
                Err(e) => {
                    eprintln!(
                        "cannot create log directory {}, file sinks disabled: {e}",
                        config.directory
                    );
                }
            }
        }

        Self::with_sinks(threshold, sinks, config.recent_capacity)
    }

    /// Build a logger with explicit sinks. Used by tests and by callers that
    /// want a non-default sink set.
    pub fn with_sinks(
        threshold: LogLevel,
        sinks: Vec<Box<dyn Sink>>,
        recent_capacity: usize,
    ) -> Self {
        let workers = sinks.into_iter().map(SinkWorker::spawn).collect();
        Self {
            inner: Arc::new(LoggerInner {
                threshold,
                sinks: workers,
                recent: Mutex::new(VecDeque::new()),
                recent_capacity: recent_capacity.max(1),
            }),
        }
    }

    pub fn threshold(&self) -> LogLevel {
        self.inner.threshold
    }

    /// Core logging operation. Below-threshold calls are no-ops.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, attributes: Value) {
        self.emit(level, message.into(), None, attributes);
    }

    pub fn error(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Error, message, attributes);
    }

    pub fn warn(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Warn, message, attributes);
    }

    pub fn info(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Info, message, attributes);
    }

    pub fn http(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Http, message, attributes);
    }

    pub fn debug(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Debug, message, attributes);
    }

    /// A view of this logger that stamps every entry with a correlation id.
    pub fn scoped(&self, correlation_id: &CorrelationId) -> RequestLogger {
        RequestLogger {
            logger: self.clone(),
            correlation_id: correlation_id.clone(),
        }
    }

    /// Recent entries, newest first, optionally filtered by level and by a
    /// case-insensitive message substring. Returns the page plus the total
    /// buffered count and the page size.
    pub fn recent(
        &self,
        level: Option<LogLevel>,
        search: Option<&str>,
        limit: usize,
    ) -> (Vec<LogEntry>, usize, usize) {
        let ring = self.inner.recent.lock().expect("recent log ring poisoned");
        let total = ring.len();
        let needle = search.map(str::to_lowercase);
        let entries: Vec<LogEntry> = ring
            .iter()
            .rev()
            .filter(|e| level.map_or(true, |l| e.level == l))
            .filter(|e| {
                needle
                    .as_deref()
                    .map_or(true, |n| e.message.to_lowercase().contains(n))
            })
            .take(limit)
            .cloned()
            .collect();
        let filtered = entries.len();
        (entries, total, filtered)
    }

    /// Block until every sink has drained and flushed what was queued so far.
    /// Test and shutdown aid; normal logging never waits.
    pub fn flush(&self) {
        for worker in &self.inner.sinks {
            let (ack_tx, ack_rx) = mpsc::channel();
            if worker.tx.send(SinkMessage::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        message: String,
        correlation_id: Option<String>,
        attributes: Value,
    ) {
        if !level.passes(self.inner.threshold) {
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

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message,
            correlation_id,
            attributes,
        };

        {
            let mut ring = self.inner.recent.lock().expect("recent log ring poisoned");
            if ring.len() == self.inner.recent_capacity {
                ring.pop_front();
            }
            ring.push_back(entry.clone());
        }

        let entry = Arc::new(entry);
        for worker in &self.inner.sinks {
            // A closed channel means the sink thread is gone; drop silently.
            let _ = worker.tx.send(SinkMessage::Entry(entry.clone()));
        }
    }
}

/// Logger view bound to one request's correlation id.
#[derive(Clone)]
pub struct RequestLogger {
    logger: Logger,
    correlation_id: CorrelationId,
}

impl RequestLogger {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, attributes: Value) {
        self.logger.emit(
            level,
            message.into(),
            Some(self.correlation_id.as_str().to_string()),
            attributes,
        );
    }

    pub fn error(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Error, message, attributes);
    }

    pub fn warn(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Warn, message, attributes);
    }

    pub fn info(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Info, message, attributes);
    }

    pub fn http(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Http, message, attributes);
    }

    pub fn debug(&self, message: impl Into<String>, attributes: Value) {
        self.log(LogLevel::Debug, message, attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Sink that collects entries for assertions.
    struct MemorySink {
        entries: Arc<Mutex<Vec<LogEntry>>>,
    }

    impl Sink for MemorySink {
        fn write(&mut self, entry: &LogEntry) -> io::Result<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn memory_logger(threshold: LogLevel) -> (Logger, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = MemorySink {
            entries: entries.clone(),
        };
        (Logger::with_sinks(threshold, vec![Box::new(sink)], 100), entries)
    }

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Error.passes(LogLevel::Info));
        assert!(LogLevel::Info.passes(LogLevel::Info));
        assert!(!LogLevel::Debug.passes(LogLevel::Info));
        assert!(!LogLevel::Http.passes(LogLevel::Info));
        assert!(LogLevel::Http.passes(LogLevel::Debug));
    }

    #[test]
    fn threshold_suppresses_less_severe() {
        let (logger, entries) = memory_logger(LogLevel::Info);
        logger.debug("hidden", Value::Null);
        logger.info("visible", Value::Null);
        logger.flush();

        let entries = entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "visible");
    }

    #[test]
    fn scoped_logger_stamps_correlation_id() {
        let (logger, entries) = memory_logger(LogLevel::Debug);
        let id = CorrelationId::generate();
        logger.scoped(&id).info("tagged", json!({"k": 1}));
        logger.flush();

        let entries = entries.lock().unwrap();
        assert_eq!(entries[0].correlation_id.as_deref(), Some(id.as_str()));
        assert_eq!(entries[0].attributes["k"], json!(1));
    }

    #[test]
    fn per_sink_ordering_is_preserved() {
        let (logger, entries) = memory_logger(LogLevel::Debug);
        for i in 0..50 {
            logger.info(format!("m{i}"), Value::Null);
        }
        logger.flush();

        let entries = entries.lock().unwrap();
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("m{i}")).collect();
        assert_eq!(messages, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn recent_is_newest_first_bounded_and_filterable() {
        let (logger, _) = memory_logger(LogLevel::Debug);
        logger.warn("w1", Value::Null);
        logger.info("i1", Value::Null);
        logger.warn("w2", Value::Null);

        let (all, total, filtered) = logger.recent(None, None, 10);
        assert_eq!((total, filtered), (3, 3));
        assert_eq!(all[0].message, "w2", "newest entry comes first");
        assert_eq!(all[2].message, "w1");

        let (warns, _, filtered) = logger.recent(Some(LogLevel::Warn), None, 1);
        assert_eq!(filtered, 1);
        assert_eq!(warns[0].message, "w2");
    }

    #[test]
    fn recent_search_matches_messages_case_insensitively() {
        let (logger, _) = memory_logger(LogLevel::Debug);
        logger.info("Chat request received", Value::Null);
        logger.warn("Rate limit exceeded", Value::Null);
        logger.info("Chat response sent", Value::Null);

        let (hits, total, filtered) = logger.recent(None, Some("CHAT"), 10);
        assert_eq!(total, 3);
        assert_eq!(filtered, 2);
        assert_eq!(hits[0].message, "Chat response sent");
        assert_eq!(hits[1].message, "Chat request received");

        let (misses, _, _) = logger.recent(None, Some("mongo"), 10);
        assert!(misses.is_empty());
    }

    #[test]
    fn rolling_file_sink_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RollingFileSink::new(dir.path(), "application");
        let logger = Logger::with_sinks(LogLevel::Debug, vec![Box::new(sink)], 10);
        logger.info("to file", json!({"n": 7}));
        logger.flush();

        let date = Utc::now().date_naive().format("%Y-%m-%d");
        let path = dir.path().join(format!("application-{date}.log"));
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["message"], "to file");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["n"], 7);
    }

    #[test]
    fn error_only_sink_skips_other_levels() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RollingFileSink::new(dir.path(), "error").at_most(LogLevel::Error);
        let logger = Logger::with_sinks(LogLevel::Debug, vec![Box::new(sink)], 10);
        logger.warn("not recorded", Value::Null);
        logger.error("recorded", Value::Null);
        logger.flush();

        let date = Utc::now().date_naive().format("%Y-%m-%d");
        let content =
            std::fs::read_to_string(dir.path().join(format!("error-{date}.log"))).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("recorded"));
    }

    #[test]
    fn sink_failure_never_reaches_caller() {
        struct FailingSink;
        impl Sink for FailingSink {
            fn write(&mut self, _entry: &LogEntry) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
            }
        }
        let logger = Logger::with_sinks(LogLevel::Debug, vec![Box::new(FailingSink)], 10);
        logger.error("still fine", Value::Null);
        logger.flush();
        // No panic, no error surfaced; the entry stays in the ring.
        assert_eq!(logger.recent(None, None, 10).0.len(), 1);
    }
}
