//! The chat endpoint: composition of rate limiting, span tracking, and
//! correlated logging around the downstream collaborators.
//!
//! Order per request: correlation id is already assigned upstream →
//! rate-limit check keyed by client address (rejections get no span) →
//! input validation → `handle_chat` span wrapping the AI call and the
//! conversation save, each in its own child span. Downstream failures are
//! logged with full detail and mapped to a generic 500.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::downstream::{with_timeout, ConversationRecord, DownstreamError};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::correlation::CorrelationId;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

pub async fn handle_chat(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(correlation): Extension<CorrelationId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let log = state.logger.scoped(&correlation);
    let client_key = addr.ip().to_string();

    // Gate before any span is created; rejected requests are not traced.
    if let Err(rejection) = state.limiter.check(&client_key) {
        log.warn(
            "Rate limit exceeded",
            json!({ "ip": client_key, "retryAfter": rejection.retry_after_secs }),
        );
        return Err(ApiError::RateLimited {
            retry_after_secs: rejection.retry_after_secs,
        });
    }

    // Absent or malformed bodies count as missing input, not a parse 4xx.
    let message = payload
        .ok()
        .and_then(|Json(body)| body.message)
        .filter(|m| !m.trim().is_empty());
    let message = match message {
        Some(m) => m,
        None => {
            log.warn("Chat request rejected: empty message", json!({ "ip": client_key }));
            return Err(ApiError::Validation("Message is required".to_string()));
        }
    };

    let downstream_timeout = Duration::from_secs(state.config.timeouts.downstream_secs);
    let tracer = state.tracer.clone();

    let result: Result<String, DownstreamError> = tracer
        .in_span("handle_chat", Some(&correlation), |span| {
            let state = state.clone();
            let log = log.clone();
            let message = message.clone();
            async move {
                let started = Instant::now();
                span.set_attribute("payload.size", json!(message.len()));
                log.info(
                    "Chat request received",
                    json!({ "messageLength": message.len() }),
                );

                let ai = state.ai.clone();
                let model = ai.model().to_string();
                let reply = state
                    .tracer
                    .in_child("ai.get_response", span.as_ref(), |child| {
                        let message = message.clone();
                        async move {
                            child.set_attribute("model", json!(model));
                            child.set_attribute("message.length", json!(message.len()));
                            let reply =
                                with_timeout(downstream_timeout, ai.get_response(&message))
                                    .await?;
                            child.set_attribute("response.length", json!(reply.len()));
                            Ok::<String, DownstreamError>(reply)
                        }
                    })
                    .await?;

                let store = state.store.clone();
                let record = ConversationRecord {
                    user_message: message.clone(),
                    bot_response: reply.clone(),
                    timestamp: Utc::now(),
                };
                state
                    .tracer
                    .in_child("store.save_conversation", span.as_ref(), |_child| async move {
                        with_timeout(downstream_timeout, store.save_conversation(record)).await
                    })
                    .await?;

                let duration_ms = started.elapsed().as_millis() as u64;
                span.set_attribute("latency_ms", json!(duration_ms));
                log.info(
                    "Chat response sent",
                    json!({ "durationMs": duration_ms, "responseLength": reply.len() }),
                );
                Ok(reply)
            }
        })
        .await;

    match result {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e) => {
            // Full internal detail stays here; the client gets a generic 500.
            log.error(
                format!("Error in chat handler: {e}"),
                json!({ "error": e.to_string(), "ip": client_key }),
            );
            Err(ApiError::Internal)
        }
    }
}
