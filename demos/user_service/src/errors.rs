// demos/user_service/src/errors.rs

use rampart::{ErrorKind, ResilienceError};
use serde_json::{json, Value};
use thiserror::Error;

/// Simulated backend failure.
#[derive(Debug, Error)]
#[error("It just failed (roll {roll:.3} <= p {probability})")]
pub struct BackendError {
  pub roll: f64,
  pub probability: f64,
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Resilience pipeline error: {source}")]
  Resilience {
    #[from] // Allows conversion from rampart::ResilienceError
    source: ResilienceError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

// Allow anyhow::Error to be converted into AppError::Internal for convenience.
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<ResilienceError>() {
      Ok(source) => AppError::Resilience { source },
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl AppError {
  /// Transport status a caller of the user service would see.
  pub fn status_code(&self) -> u16 {
    match self {
      AppError::Resilience { source } => match source.kind() {
        ErrorKind::CircuitOpen => 503,
        ErrorKind::TimedOut => 504,
        ErrorKind::Cancelled => 499,
        ErrorKind::OperationFailed | ErrorKind::RetriesExhausted => 500,
        ErrorKind::NotFound | ErrorKind::AlreadyRegistered | ErrorKind::TypeMismatch | ErrorKind::Configuration => {
          500
        }
      },
      AppError::Config(_) | AppError::Internal(_) => 500,
    }
  }

  /// JSON body sent alongside `status_code`.
  pub fn error_body(&self) -> Value {
    // Log the full error when it's turned into a response
    tracing::error!(application_error = %self, status = self.status_code(), "Responding with error");
    match self {
      AppError::Resilience { source } => match source {
        ResilienceError::CircuitOpen { retry_after } => json!({
          "error": "Operation failed too many times please try again later.",
          "retry_after_ms": retry_after.map(|d| d.as_millis() as u64),
        }),
        ResilienceError::TimedOut { .. } => json!({"error": "Operation timed out please try again."}),
        ResilienceError::Cancelled => json!({"error": "Request cancelled."}),
        other => json!({"error": "Operation failed", "detail": other.to_string()}),
      },
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      AppError::Internal(m) => json!({"error": "An internal error occurred", "detail": m}),
    }
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
