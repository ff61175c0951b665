// demos/user_service/src/main.rs

// Declare modules for the application
mod config;
mod errors;
mod models;
mod pipelines;
mod services;
mod state;

use crate::config::AppConfig;
use crate::errors::Result as AppResult;
use crate::models::UserResponse;
use crate::services::user_resilience::UserResilienceService;
use crate::state::AppState;

use rampart::{CancellationToken, PipelineRegistry};
use serde_json::json;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing

const SCENARIOS: &[&str] = &[
  "fault-tolerance",
  "fallback",
  "ioc",
  "timeout",
  "circuit-breaker",
  "fault-tolerance-with-fallback",
  "external-api-default-resilience",
];

fn init_tracing(json: bool) {
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO) // Default level
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

async fn run_scenario(
  service: &UserResilienceService,
  scenario: &str,
  cancellation: CancellationToken,
) -> AppResult<UserResponse> {
  let user_id = "42";
  match scenario {
    "fault-tolerance" => service.get_user_with_fault_tolerance(user_id, cancellation).await,
    "fallback" => service.get_user_with_fallback(user_id, cancellation).await,
    "ioc" => service.get_user_ioc_pipeline(user_id, cancellation).await,
    "timeout" => service.get_user_with_timeout(user_id, cancellation).await,
    "circuit-breaker" => service.get_user_with_circuit_breaker(user_id, cancellation).await,
    "fault-tolerance-with-fallback" => {
      service
        .get_user_with_fault_tolerance_with_fallback(user_id, cancellation)
        .await
    }
    "external-api-default-resilience" => {
      service
        .get_user_with_http_default_resilience(user_id, cancellation)
        .await
    }
    other => Err(errors::AppError::Config(format!(
      "Unknown scenario '{}'; expected one of {:?}",
      other, SCENARIOS
    ))),
  }
}

/// Prints the status and body an HTTP layer would have sent for this result.
fn respond(scenario: &str, result: AppResult<UserResponse>) {
  let (status, body) = match result {
    Ok(user) => (200, json!(user)),
    Err(err) => (err.status_code(), err.error_body()),
  };
  tracing::info!(scenario, status, "Scenario finished.");
  println!("{}", json!({ "scenario": scenario, "status": status, "body": body }));
}

#[tokio::main]
async fn main() -> AppResult<()> {
  // Load application configuration
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg), // Arc the config for sharing
    Err(e) => {
      eprintln!("Configuration error: {}", e);
      return Err(e);
    }
  };

  init_tracing(app_config.log_json);
  tracing::info!("Starting user service demo...");

  // Register all shared pipelines
  let registry = Arc::new(PipelineRegistry::new());
  pipelines::register_all_pipelines(&registry, &app_config)?;

  let app_state = AppState {
    registry: registry.clone(),
    config: app_config.clone(),
  };
  let service = UserResilienceService::new(app_state);

  // Ctrl+C cancels whatever is in flight; callers see 499.
  let shutdown = CancellationToken::new();
  let on_signal = shutdown.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("Interrupt received; cancelling in-flight lookups.");
      on_signal.cancel();
    }
  });

  let selected: Vec<&str> = match app_config.scenario.as_str() {
    "all" => SCENARIOS.to_vec(),
    one => vec![one],
  };
  for scenario in selected {
    let result = run_scenario(&service, scenario, shutdown.child_token()).await;
    respond(scenario, result);
  }

  Ok(())
}
