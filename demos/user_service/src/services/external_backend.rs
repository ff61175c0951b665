// demos/user_service/src/services/external_backend.rs

//! In-process stand-in for the external user API reached over HTTP.

use crate::errors::BackendError;
use crate::models::UserResponse;
use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

/// Returns the user with `id`, failing with probability `probability_of_failure`.
pub async fn get_user_from_external_api(id: Uuid, probability_of_failure: f64) -> Result<UserResponse, BackendError> {
  let roll = rand::thread_rng().gen::<f64>();
  if roll <= probability_of_failure {
    warn!(%id, roll, "External API failed.");
    return Err(BackendError {
      roll,
      probability: probability_of_failure,
    });
  }
  debug!(%id, roll, "External API returned a user.");
  Ok(UserResponse {
    id,
    name: format!("Perico From External Api- {:.2}", roll * 100.0),
  })
}
