// rampart/examples/registry_basic.rs

use rampart::{
  CancellationToken, CircuitBreakerOptions, ErrorKind, PipelineRegistry, ResilienceContext, ResilienceError,
  TimeoutOptions,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone, Debug)]
struct Profile {
  user_id: u32,
}

#[derive(Clone, Debug)]
struct Inventory {
  sku: String,
  available: u32,
}

#[derive(Debug, thiserror::Error)]
enum RegistryExampleError {
  #[error("Profile store error: {0}")]
  Profile(String),
}

fn register_pipelines(registry: &PipelineRegistry) -> Result<(), ResilienceError> {
  registry.register::<Profile, _>("profiles", |builder| {
    builder
      .add_circuit_breaker(
        CircuitBreakerOptions::new()
          .with_failure_ratio(0.5)
          .with_minimum_throughput(2)
          .with_break_duration(Duration::from_secs(10)),
      )
      .add_timeout(Duration::from_millis(200))
  })?;

  registry.register::<Inventory, _>("inventory", |builder| {
    builder.add_timeout(TimeoutOptions::new(Duration::from_millis(100)).on_timeout(|args| {
      error!(timeout = ?args.timeout, "Inventory lookup timed out.");
    }))
  })?;
  Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ResilienceError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Pipeline Registry Example ---");

  let registry = Arc::new(PipelineRegistry::new());
  register_pipelines(&registry)?;
  info!(keys = ?registry.keys(), "Registered pipelines.");

  // The inventory lookup is slower than its timeout.
  let inventory = registry
    .execute(
      "inventory",
      |ctx: ResilienceContext| async move {
        tokio::select! {
          _ = ctx.cancellation_token().cancelled() => Err(anyhow::anyhow!("lookup abandoned")),
          _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(Inventory { sku: "SKU-1".to_string(), available: 3 }),
        }
      },
      CancellationToken::new(),
    )
    .await;
  match &inventory {
    Ok(item) => info!(sku = %item.sku, available = item.available, "Inventory lookup succeeded."),
    Err(err) => error!(kind = ?err.kind(), "Inventory lookup failed: {}", err),
  }
  assert_eq!(inventory.map_err(|e| e.kind()).unwrap_err(), ErrorKind::TimedOut);

  // Failing profile lookups trip the shared breaker.
  for user_id in 1..=4u32 {
    let result = registry
      .execute(
        "profiles",
        move |_ctx: ResilienceContext| async move {
          if user_id <= 2 {
            Err(RegistryExampleError::Profile(format!("user {} not loaded", user_id)))
          } else {
            Ok(Profile { user_id })
          }
        },
        CancellationToken::new(),
      )
      .await;
    match result {
      Ok(profile) => info!(user_id = profile.user_id, "Loaded profile."),
      Err(err) if err.kind() == ErrorKind::CircuitOpen => info!(user_id, "Breaker open; call rejected: {}", err),
      Err(err) => error!(user_id, "Profile lookup failed: {}", err),
    }
  }

  // Asking for the wrong result type is reported, not panicked on.
  let mismatch = registry.resolve::<Inventory>("profiles").unwrap_err();
  info!("Resolving with the wrong type: {}", mismatch);

  Ok(())
}
