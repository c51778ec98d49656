//! Chat Gateway
//!
//! A chatbot backend built with Tokio and Axum.
//!
//! # Architecture Overview
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                  CHAT GATEWAY                    │
//!                    │                                                  │
//!  Client Request    │  ┌─────────────┐   ┌────────────┐   ┌─────────┐ │
//!  ──────────────────┼─▶│ correlation │──▶│ rate limit │──▶│  chat   │ │
//!                    │  │  middleware │   │  (fixed    │   │ handler │ │
//!                    │  └─────────────┘   │   window)  │   └────┬────┘ │
//!                    │                    └────────────┘        │      │
//!                    │                                          ▼      │
//!  Client Response   │  ┌──────────────────────────┐   ┌─────────────┐ │
//!  ◀─────────────────┼──│ X-Trace-Id + JSON body   │◀──│ spans around│─┼──▶ AI API
//!                    │  └──────────────────────────┘   │ downstream  │ │
//!                    │                                 │ calls       │─┼──▶ store
//!                    │  ┌────────────────────────────┐ └─────────────┘ │
//!                    │  │   Cross-Cutting Concerns   │                 │
//!                    │  │  config · structured logs  │                 │
//!                    │  │  metrics · span registry   │                 │
//!                    │  └────────────────────────────┘                 │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use chat_gateway::config::{self, GatewayConfig};
use chat_gateway::http::GatewayServer;
use chat_gateway::lifecycle::Shutdown;
use chat_gateway::observability::{Logger, Tracer};

#[derive(Parser, Debug)]
#[command(name = "chat-gateway", version, about = "Chatbot backend gateway")]
struct Args {
    /// Path to a TOML config file. Defaults plus environment variables are
    /// used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config: GatewayConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };
    if let Some(port) = args.port {
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }

    let logger = Logger::new(&config.logging);
    logger.info(
        "chat-gateway starting",
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "environment": config.environment,
            "bindAddress": config.listener.bind_address,
            "logLevel": config.logging.level,
            "tracingEnabled": config.tracing.enabled,
            "rateLimitWindowMs": config.rate_limit.window_ms,
            "rateLimitMaxRequests": config.rate_limit.max_requests,
        }),
    );

    let tracer = Tracer::new(&config.tracing, logger.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    logger.info(
        "Listening for connections",
        json!({ "address": local_addr.to_string() }),
    );

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.watch();
    let ctrl_c_logger = logger.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_logger.info("Shutdown signal received", json!(null));
            shutdown.trigger();
        }
    });

    let server = GatewayServer::new(config, logger.clone(), tracer);
    server.run(listener, shutdown_rx).await?;

    logger.info("Shutdown complete", json!(null));
    logger.flush();
    Ok(())
}
