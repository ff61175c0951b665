// demos/user_service/src/services/user_backend.rs

//! Simulated user backend that fails (or stalls) at random.

use crate::errors::BackendError;
use crate::models::UserResponse;
use rand::Rng;
use rampart::ResilienceContext;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

fn roll() -> f64 {
  rand::thread_rng().gen::<f64>()
}

fn user_for(roll: f64) -> UserResponse {
  UserResponse {
    id: Uuid::new_v4(),
    name: format!("Perico - {:.2}", roll * 100.0),
  }
}

/// Fails with `BackendError` with probability `probability_of_failure`.
pub async fn get_the_user(probability_of_failure: f64) -> Result<UserResponse, BackendError> {
  let roll = roll();
  if roll <= probability_of_failure {
    warn!(roll, probability_of_failure, "Simulated backend failure.");
    return Err(BackendError {
      roll,
      probability: probability_of_failure,
    });
  }
  debug!(roll, "Simulated backend returned a user.");
  Ok(user_for(roll))
}

/// With probability `probability_of_delay` waits `delay` before answering. The wait ends early
/// (with an error) once the context's cancellation token fires.
pub async fn get_the_user_with_delay(
  probability_of_delay: f64,
  delay: Duration,
  ctx: ResilienceContext,
) -> anyhow::Result<UserResponse> {
  let roll = roll();
  if roll <= probability_of_delay {
    debug!(roll, ?delay, "Simulated backend is slow.");
    tokio::select! {
      _ = ctx.cancellation_token().cancelled() => {
        warn!("Slow backend call abandoned after cancellation.");
        anyhow::bail!("backend call cancelled");
      }
      _ = tokio::time::sleep(delay) => {}
    }
  }
  Ok(user_for(roll))
}
