use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shwe_g12::config::Config;
use shwe_g12::gateway::GeminiGateway;
use shwe_g12::scheduler::LocalClock;
use shwe_g12::state::{AppState, Settings};
use shwe_g12::{handlers, profiling};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shwe_g12=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  // Initialize profiling (no-op if feature disabled)
  profiling::init();

  let config = match Config::load() {
    Ok(config) => config,
    Err(e) => {
      tracing::error!("Configuration error: {}", e);
      std::process::exit(1);
    }
  };

  let gateway = match GeminiGateway::new(&config.gateway) {
    Ok(gateway) => gateway,
    Err(e) => {
      tracing::error!("Failed to create AI teacher client: {}", e);
      std::process::exit(1);
    }
  };
  tracing::info!(
    "AI teacher ready (chat: {}, exams: {})",
    config.gateway.chat_model,
    config.gateway.exam_model
  );

  let state = AppState::new(Arc::new(gateway), Arc::new(LocalClock), Settings::from_config(&config));
  let app = handlers::router(state);

  let bind_addr = config.bind_addr();
  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://localhost:{}", config.server_port);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server failed to start");

  profiling::shutdown();
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("Failed to listen for shutdown signal: {}", e);
    std::future::pending::<()>().await;
  }
  tracing::info!("Shutting down");
}
