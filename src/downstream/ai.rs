//! AI response providers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::schema::AiConfig;
use crate::downstream::DownstreamError;

/// Generates a reply to a user message. Fallible; the pipeline owns timeouts
/// and error mapping.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn get_response(&self, message: &str) -> Result<String, DownstreamError>;

    /// Model identifier, reported by /api/health and attached to spans.
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn get_response(&self, message: &str) -> Result<String, DownstreamError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": message }],
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DownstreamError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownstreamError::Provider(format!(
                "upstream returned {}",
                response.status()
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| DownstreamError::Provider(format!("malformed response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| DownstreamError::Provider("no choices in response".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Canned-response provider used when no API key is configured and in tests.
pub struct StaticProvider {
    model: String,
}

impl StaticProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl AiProvider for StaticProvider {
    async fn get_response(&self, message: &str) -> Result<String, DownstreamError> {
        Ok(format!("Test response for: {message}"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_echoes() {
        let provider = StaticProvider::new("test-model");
        let reply = provider.get_response("Hello").await.unwrap();
        assert_eq!(reply, "Test response for: Hello");
        assert_eq!(provider.model(), "test-model");
    }
}
