// demos/user_service/src/pipelines/user_pipelines.rs

use crate::config::AppConfig;
use crate::errors::{BackendError, Result};
use crate::models::UserResponse;
use rampart::{
  CircuitBreakerOptions, CircuitTransition, DelayBackoff, FallbackOptions, Pipeline, PipelineBuilder,
  PipelineRegistry, PredicateBuilder, RetryOptions, ShouldHandle, TimeoutOptions,
};
use std::time::Duration;
use tracing::{info, warn};

pub const IOC_REGISTERED_PIPELINE: &str = "ioc-registered-pipeline";
pub const STANDARD_RESILIENCE_PIPELINE: &str = "external-api-standard-resilience";

fn backend_failures() -> ShouldHandle<UserResponse> {
  PredicateBuilder::new().handle::<BackendError>().build()
}

fn quick_retry() -> RetryOptions<UserResponse> {
  RetryOptions::new()
    .with_max_retry_attempts(2)
    .with_backoff(DelayBackoff::Constant)
    .with_delay(Duration::ZERO)
    .with_should_handle(backend_failures())
    .on_retry(|args| {
      warn!(
        attempt = args.attempt,
        error = ?args.outcome.error().map(|e| e.to_string()),
        "Retrying user lookup."
      )
    })
}

pub fn register_ioc_pipeline(registry: &PipelineRegistry) -> Result<()> {
  registry.register::<UserResponse, _>(IOC_REGISTERED_PIPELINE, |builder| {
    builder.add_fallback(FallbackOptions::with_value(UserResponse::placeholder("FromIoCUser")))
  })?;
  Ok(())
}

/// Registers the pipeline guarding every external API call. It lives in the registry
/// so all calls share one circuit breaker.
pub fn register_standard_resilience(registry: &PipelineRegistry, config: &AppConfig) -> Result<()> {
  let retry_delay = config.standard_retry_delay;
  registry.register::<UserResponse, _>(STANDARD_RESILIENCE_PIPELINE, move |builder| {
    standard_resilience(builder, retry_delay)
  })?;
  Ok(())
}

/// The usual four layers for an outbound HTTP dependency, outermost first:
/// total timeout, retry, circuit breaker, per-attempt timeout.
pub fn standard_resilience(builder: PipelineBuilder<UserResponse>, retry_delay: Duration) -> PipelineBuilder<UserResponse> {
  let transient = || {
    PredicateBuilder::<UserResponse>::new()
      .handle::<BackendError>()
      .handle_timeout()
      .build()
  };
  builder
    .add_timeout(Duration::from_secs(30))
    .add_retry(
      RetryOptions::new()
        .with_max_retry_attempts(3)
        .with_backoff(DelayBackoff::ExponentialWithJitter)
        .with_delay(retry_delay)
        .with_should_handle(transient())
        .on_retry(|args| warn!(attempt = args.attempt, delay = ?args.delay, "Retrying external API call.")),
    )
    .add_circuit_breaker(
      CircuitBreakerOptions::new()
        .with_failure_ratio(0.1)
        .with_sampling_duration(Duration::from_secs(30))
        .with_minimum_throughput(100)
        .with_break_duration(Duration::from_secs(5))
        .with_should_handle(transient()),
    )
    .add_timeout(Duration::from_secs(10))
}

pub fn fault_tolerance() -> Result<Pipeline<UserResponse>> {
  Ok(Pipeline::builder().with_name("fault-tolerance").add_retry(quick_retry()).build()?)
}

pub fn fallback() -> Result<Pipeline<UserResponse>> {
  Ok(
    Pipeline::builder()
      .with_name("fallback")
      .add_fallback(FallbackOptions::with_value(UserResponse::placeholder("DefaultPolicyResponse")))
      .build()?,
  )
}

pub fn timeout(config: &AppConfig) -> Result<Pipeline<UserResponse>> {
  Ok(
    Pipeline::builder()
      .with_name("timeout")
      .add_timeout(TimeoutOptions::new(config.timeout).on_timeout(|args| {
        warn!(timeout = ?args.timeout, "User lookup timed out; backend token cancelled.")
      }))
      .build()?,
  )
}

pub fn circuit_breaker(config: &AppConfig) -> Result<Pipeline<UserResponse>> {
  Ok(
    Pipeline::builder()
      .with_name("circuit-breaker")
      .add_circuit_breaker(
        CircuitBreakerOptions::new()
          .with_failure_ratio(config.breaker_failure_ratio)
          .with_sampling_duration(config.breaker_sampling)
          .with_minimum_throughput(config.breaker_min_throughput)
          .with_break_duration(config.breaker_break)
          .with_should_handle(backend_failures())
          .on_state_change(|transition| match transition {
            CircuitTransition::Opened { health, .. } => warn!(
              failures = health.failures,
              total = health.total,
              "User backend circuit opened."
            ),
            other => info!(transition = ?other, "User backend circuit changed state."),
          }),
      )
      .build()?,
  )
}

/// Fallback outermost, retry innermost: the fallback only sees the failure left
/// after every retry has been spent.
pub fn fault_tolerance_with_fallback() -> Result<Pipeline<UserResponse>> {
  Ok(
    Pipeline::builder()
      .with_name("fault-tolerance-with-fallback")
      .add_fallback(FallbackOptions::with_value(UserResponse::placeholder(
        "Fallback after all retries",
      )))
      .add_retry(quick_retry())
      .build()?,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pipelines_are_layered_outermost_first() {
    let pipeline = fault_tolerance_with_fallback().unwrap();
    assert_eq!(pipeline.strategy_names(), vec!["fallback", "retry"]);
    assert_eq!(pipeline.name(), Some("fault-tolerance-with-fallback"));
  }

  #[test]
  fn standard_resilience_wraps_attempts_in_a_total_timeout() {
    let pipeline = standard_resilience(Pipeline::builder(), Duration::from_millis(10))
      .build()
      .unwrap();
    assert_eq!(
      pipeline.strategy_names(),
      vec!["timeout", "retry", "circuit_breaker", "timeout"]
    );
  }

  #[test]
  fn ioc_pipeline_resolves_from_registry() {
    let registry = PipelineRegistry::new();
    register_ioc_pipeline(&registry).unwrap();
    let pipeline = registry.resolve::<UserResponse>(IOC_REGISTERED_PIPELINE).unwrap();
    assert_eq!(pipeline.strategy_names(), vec!["fallback"]);
  }
}
