//! HTTP server setup and request pipeline wiring.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (correlation id, request logging, timeout)
//! - Bind the server to a listener with graceful shutdown
//!
//! Middleware order, outermost first: correlation id → request logger →
//! timeout → handler. The correlation layer runs first so every response,
//! including 404s and timeouts, carries `X-Trace-Id` and every log line has
//! an id to attach.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::GatewayConfig;
use crate::downstream::{AiProvider, ConversationStore, MemoryStore, OpenAiProvider, StaticProvider};
use crate::http::{chat, health};
use crate::observability::correlation::{correlation_middleware, CorrelationId};
use crate::observability::{Logger, MetricsRecorder, Tracer};
use crate::security::FixedWindowLimiter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub logger: Logger,
    pub tracer: Tracer,
    pub limiter: Arc<FixedWindowLimiter>,
    pub ai: Arc<dyn AiProvider>,
    pub store: Arc<dyn ConversationStore>,
    pub metrics: Arc<MetricsRecorder>,
}

/// HTTP server for the chat gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Create a server with default collaborators: the OpenAI-compatible
    /// provider when an API key is configured, the canned provider otherwise,
    /// and the in-memory conversation store.
    pub fn new(config: GatewayConfig, logger: Logger, tracer: Tracer) -> Self {
        let ai: Arc<dyn AiProvider> = if config.ai.api_key.is_empty() {
            Arc::new(StaticProvider::new(config.ai.model.clone()))
        } else {
            Arc::new(OpenAiProvider::new(&config.ai))
        };
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
        Self::with_collaborators(config, logger, tracer, ai, store)
    }

    /// Create a server with explicit downstream collaborators.
    /// Tests use this to inject programmable providers and stores.
    pub fn with_collaborators(
        config: GatewayConfig,
        logger: Logger,
        tracer: Tracer,
        ai: Arc<dyn AiProvider>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::new(
            Duration::from_millis(config.rate_limit.window_ms),
            config.rate_limit.max_requests,
        ));

        let state = AppState {
            config: Arc::new(config),
            logger,
            tracer,
            limiter,
            ai,
            store,
            metrics: Arc::new(MetricsRecorder::new()),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/api/chat", post(chat::handle_chat))
            .route("/api/health", get(health::health))
            .route("/api/metrics", get(health::metrics_snapshot))
            .route("/api/logs", get(health::recent_logs))
            .fallback(not_found)
            .with_state(state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                state.config.timeouts.request_secs,
            )))
            .layer(middleware::from_fn_with_state(
                state,
                request_logger_middleware,
            ))
            .layer(middleware::from_fn(correlation_middleware))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let logger = self.state.logger.clone();
        logger.info(
            "HTTP server starting",
            json!({ "address": addr.to_string() }),
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        logger.info("HTTP server stopped", json!(null));
        logger.flush();
        Ok(())
    }
}

/// Access log + metrics middleware.
///
/// Logs one HTTP-level line per response, tagged with the correlation id,
/// and feeds the metrics recorder. Successful health probes are skipped to
/// cut noise. Request bodies are never logged.
async fn request_logger_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let correlation = request.extensions().get::<CorrelationId>().cloned();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(request).await;

    let duration = started.elapsed();
    let status = response.status().as_u16();
    state.metrics.record(status, duration);

    if path == "/api/health" && status == 200 {
        return response;
    }

    let duration_ms = duration.as_millis() as u64;
    let message = format!("{method} {path} {status} {duration_ms}ms");
    let attributes = json!({
        "method": method.as_str(),
        "path": path,
        "status": status,
        "durationMs": duration_ms,
        "ip": client_ip,
    });
    match &correlation {
        Some(id) => state.logger.scoped(id).http(message, attributes),
        None => state.logger.http(message, attributes),
    }

    response
}

/// Fallback for unknown routes. The correlation layer wraps the whole
/// router, so the extension is always present here.
async fn not_found(
    State(state): State<AppState>,
    axum::Extension(correlation): axum::Extension<CorrelationId>,
    method: Method,
    uri: Uri,
) -> impl IntoResponse {
    state.logger.scoped(&correlation).warn(
        format!("Route not found: {}", uri.path()),
        json!({ "method": method.as_str() }),
    );
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
