//! Downstream collaborators consumed by the chat pipeline.
//!
//! The AI provider and the conversation store are trait boundaries: the
//! pipeline only sees fallible async calls with a timeout. Failures surface
//! as [`DownstreamError`], which the pipeline maps to a generic 500 while
//! logging full detail internally.

pub mod ai;
pub mod persistence;

use std::time::Duration;

pub use ai::{AiProvider, OpenAiProvider, StaticProvider};
pub use persistence::{ConversationRecord, ConversationStore, MemoryStore};

/// Failure of a downstream collaborator (AI provider or persistence).
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("persistence error: {0}")]
    Store(String),

    #[error("downstream call timed out after {0:?}")]
    Timeout(Duration),
}

/// Bound a downstream call with a timeout; elapsed timers become
/// [`DownstreamError::Timeout`] and take the normal failure path.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, DownstreamError>
where
    F: std::future::Future<Output = Result<T, DownstreamError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DownstreamError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_maps_to_downstream_error() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(DownstreamError::Timeout(_))));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(42u32) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
