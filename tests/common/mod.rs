//! Shared utilities for integration testing.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use chat_gateway::config::GatewayConfig;
use chat_gateway::downstream::{AiProvider, DownstreamError, MemoryStore};
use chat_gateway::http::GatewayServer;
use chat_gateway::lifecycle::Shutdown;
use chat_gateway::observability::{LogLevel, Logger, Tracer};

/// A running gateway plus handles for assertions.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub logger: Logger,
    pub tracer: Tracer,
    pub store: Arc<MemoryStore>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Test configuration: tracing on, no file sinks, tight defaults.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = "test".to_string();
    config.logging.file_sinks_enabled = false;
    config.timeouts.downstream_secs = 2;
    config
}

/// Start a gateway on an ephemeral port with the given AI provider.
/// The logger has no sinks; assertions read the in-memory ring.
pub async fn spawn_gateway(config: GatewayConfig, ai: Arc<dyn AiProvider>) -> TestGateway {
    let logger = Logger::with_sinks(LogLevel::Debug, Vec::new(), 1000);
    let tracer = Tracer::new(&config.tracing, logger.clone());
    let store = Arc::new(MemoryStore::new());

    let server = GatewayServer::with_collaborators(
        config,
        logger.clone(),
        tracer.clone(),
        ai,
        store.clone(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.watch();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let gateway = TestGateway {
        addr,
        logger,
        tracer,
        store,
        shutdown,
    };
    wait_until_ready(&gateway).await;
    gateway
}

async fn wait_until_ready(gateway: &TestGateway) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client
            .get(gateway.url("/api/health"))
            .send()
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway did not become ready");
}

/// AI provider that always fails; simulates the upstream being down.
pub struct FailingProvider;

#[async_trait]
impl AiProvider for FailingProvider {
    async fn get_response(&self, _message: &str) -> Result<String, DownstreamError> {
        Err(DownstreamError::Provider(
            "AI provider unavailable".to_string(),
        ))
    }

    fn model(&self) -> &str {
        "failing-model"
    }
}

/// AI provider that hangs longer than any test timeout.
pub struct HangingProvider;

#[async_trait]
impl AiProvider for HangingProvider {
    async fn get_response(&self, _message: &str) -> Result<String, DownstreamError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    fn model(&self) -> &str {
        "hanging-model"
    }
}
