// demos/user_service/src/pipelines/mod.rs

//! Defines the resilience pipelines used by the user service and registers the
//! shared ones with the application's registry.

use crate::config::AppConfig;
use crate::errors::Result;
use rampart::PipelineRegistry;

pub mod user_pipelines;

pub use user_pipelines::{IOC_REGISTERED_PIPELINE, STANDARD_RESILIENCE_PIPELINE};

/// Registers all shared pipelines with the provided registry.
///
/// This function is typically called once at application startup.
pub fn register_all_pipelines(registry: &PipelineRegistry, config: &AppConfig) -> Result<()> {
  tracing::info!("Registering resilience pipelines...");

  user_pipelines::register_ioc_pipeline(registry)?;
  user_pipelines::register_standard_resilience(registry, config)?;

  tracing::info!(keys = ?registry.keys(), "All application pipelines registered.");
  Ok(())
}
