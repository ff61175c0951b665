// demos/user_service/src/services/user_resilience.rs

//! The user lookups exposed by the service, each protected by a different pipeline.

use crate::errors::{AppError, Result};
use crate::models::UserResponse;
use crate::pipelines::{user_pipelines, IOC_REGISTERED_PIPELINE, STANDARD_RESILIENCE_PIPELINE};
use crate::services::external_backend::get_user_from_external_api;
use crate::services::user_backend::{get_the_user, get_the_user_with_delay};
use crate::state::AppState;
use rampart::{CancellationToken, ErrorKind, ResilienceContext};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub struct UserResilienceService {
  state: AppState,
}

impl UserResilienceService {
  pub fn new(state: AppState) -> Self {
    Self { state }
  }

  /// Retries a flaky backend twice with no delay.
  #[instrument(skip(self, cancellation))]
  pub async fn get_user_with_fault_tolerance(&self, user_id: &str, cancellation: CancellationToken) -> Result<UserResponse> {
    let p = self.state.config.retry_failure_probability;
    let pipeline = user_pipelines::fault_tolerance()?;
    Ok(pipeline.execute(move |_ctx: ResilienceContext| get_the_user(p), cancellation).await?)
  }

  #[instrument(skip(self, cancellation))]
  pub async fn get_user_with_fallback(&self, user_id: &str, cancellation: CancellationToken) -> Result<UserResponse> {
    let p = self.state.config.fallback_failure_probability;
    let pipeline = user_pipelines::fallback()?;
    Ok(pipeline.execute(move |_ctx: ResilienceContext| get_the_user(p), cancellation).await?)
  }

  /// Uses the pipeline registered at startup under `ioc-registered-pipeline`.
  #[instrument(skip(self, cancellation))]
  pub async fn get_user_ioc_pipeline(&self, user_id: &str, cancellation: CancellationToken) -> Result<UserResponse> {
    let p = self.state.config.ioc_failure_probability;
    let pipeline = self.state.registry.resolve::<UserResponse>(IOC_REGISTERED_PIPELINE)?;
    Ok(pipeline.execute(move |_ctx: ResilienceContext| get_the_user(p), cancellation).await?)
  }

  /// The backend must observe the context's token, otherwise the timeout cannot stop it.
  #[instrument(skip(self, cancellation))]
  pub async fn get_user_with_timeout(&self, user_id: &str, cancellation: CancellationToken) -> Result<UserResponse> {
    let config = &self.state.config;
    let (p, delay) = (config.timeout_slow_probability, config.backend_delay);
    let pipeline = user_pipelines::timeout(config)?;
    let result = pipeline
      .execute(move |ctx: ResilienceContext| get_the_user_with_delay(p, delay, ctx), cancellation)
      .await;
    match result {
      Err(err) if err.kind() == ErrorKind::TimedOut => {
        error!(error = %err, "Operation timed out please try again.");
        Err(err.into())
      }
      other => Ok(other?),
    }
  }

  /// Issues `breaker_calls` lookups through one breaker, counting the failures it let
  /// through. A rejected call ends the loop with `CircuitOpen`.
  #[instrument(skip(self, cancellation))]
  pub async fn get_user_with_circuit_breaker(&self, user_id: &str, cancellation: CancellationToken) -> Result<UserResponse> {
    let config = &self.state.config;
    let p = config.breaker_failure_probability;
    let pipeline = user_pipelines::circuit_breaker(config)?;

    let mut user = None;
    let mut failed_attempts = 0u32;
    for call in 0..config.breaker_calls {
      match pipeline
        .execute(move |_ctx: ResilienceContext| get_the_user(p), cancellation.clone())
        .await
      {
        Ok(found) => user = Some(found),
        Err(err) if err.kind() == ErrorKind::OperationFailed => {
          warn!(call, "Operation failed please try again.");
          failed_attempts += 1;
        }
        Err(err) => {
          error!(call, error = %err, "Operation failed too many times please try again later.");
          return Err(err.into());
        }
      }
    }

    let user = user.ok_or_else(|| AppError::Internal(format!("all {} lookups failed", config.breaker_calls)))?;
    info!(failed_attempts, "Circuit breaker loop finished.");
    Ok(UserResponse {
      id: user.id,
      name: format!("{}- Failed {} times", user.name, failed_attempts),
    })
  }

  /// Nearly always fails, so the fallback answers once the retries are spent.
  #[instrument(skip(self, cancellation))]
  pub async fn get_user_with_fault_tolerance_with_fallback(
    &self,
    user_id: &str,
    cancellation: CancellationToken,
  ) -> Result<UserResponse> {
    let p = self.state.config.exhausting_failure_probability;
    let pipeline = user_pipelines::fault_tolerance_with_fallback()?;
    Ok(pipeline.execute(move |_ctx: ResilienceContext| get_the_user(p), cancellation).await?)
  }

  /// Calls the external user API through the registry's standard resilience pipeline.
  #[instrument(skip(self, cancellation))]
  pub async fn get_user_with_http_default_resilience(
    &self,
    user_id: &str,
    cancellation: CancellationToken,
  ) -> Result<UserResponse> {
    let p = self.state.config.external_failure_probability;
    let external_id = Uuid::new_v4();
    Ok(
      self
        .state
        .registry
        .execute(
          STANDARD_RESILIENCE_PIPELINE,
          move |_ctx: ResilienceContext| get_user_from_external_api(external_id, p),
          cancellation,
        )
        .await?,
    )
  }
}
