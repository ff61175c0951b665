// rampart/src/error.rs
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError {
  /// The callback's own failure, captured before any strategy looked at it.
  #[error("Operation failed: {source}")]
  OperationFailed {
    #[source]
    source: AnyhowError,
  },

  #[error("Retries exhausted after {attempts} attempts. Last failure: {last}")]
  RetriesExhausted { attempts: u32, last: Box<ResilienceError> },

  /// Preemptive rejection by a circuit breaker. The callback was not invoked.
  #[error("Circuit is open; execution rejected")]
  CircuitOpen { retry_after: Option<Duration> },

  #[error("Operation timed out after {timeout:?}")]
  TimedOut { timeout: Duration },

  #[error("Execution was cancelled by the caller")]
  Cancelled,

  #[error("No pipeline registered under key '{key}'")]
  NotFound { key: String },

  #[error("A pipeline is already registered under key '{key}'")]
  AlreadyRegistered { key: String },

  #[error("Pipeline '{key}' does not produce results of type {expected}")]
  TypeMismatch { key: String, expected: String },

  #[error("Invalid configuration for {strategy} strategy: {message}")]
  Configuration { strategy: &'static str, message: String },
}

/// Fieldless mirror of [`ResilienceError`], for callers that only need to
/// switch on the category (e.g. mapping to a transport status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  OperationFailed,
  RetriesExhausted,
  CircuitOpen,
  TimedOut,
  Cancelled,
  NotFound,
  AlreadyRegistered,
  TypeMismatch,
  Configuration,
}

impl ResilienceError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ResilienceError::OperationFailed { .. } => ErrorKind::OperationFailed,
      ResilienceError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
      ResilienceError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
      ResilienceError::TimedOut { .. } => ErrorKind::TimedOut,
      ResilienceError::Cancelled => ErrorKind::Cancelled,
      ResilienceError::NotFound { .. } => ErrorKind::NotFound,
      ResilienceError::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
      ResilienceError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
      ResilienceError::Configuration { .. } => ErrorKind::Configuration,
    }
  }

  /// Follows `RetriesExhausted` chains down to the failure that was retried.
  pub fn root_cause(&self) -> &ResilienceError {
    let mut current = self;
    while let ResilienceError::RetriesExhausted { last, .. } = current {
      current = last;
    }
    current
  }

  /// The callback's error, if the root cause is an `OperationFailed`.
  pub fn operation_error(&self) -> Option<&AnyhowError> {
    match self.root_cause() {
      ResilienceError::OperationFailed { source } => Some(source),
      _ => None,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, ResilienceError::Cancelled)
  }

  pub(crate) fn configuration(strategy: &'static str, message: impl Into<String>) -> Self {
    ResilienceError::Configuration {
      strategy,
      message: message.into(),
    }
  }
}

// Callbacks report failures as anything convertible to anyhow::Error.
impl From<AnyhowError> for ResilienceError {
  fn from(err: AnyhowError) -> Self {
    // A callback that bubbles up a ResilienceError (e.g. from a nested pipeline)
    // keeps its category instead of being re-wrapped as OperationFailed.
    match err.downcast::<ResilienceError>() {
      Ok(resilience_err) => resilience_err,
      Err(source) => ResilienceError::OperationFailed { source },
    }
  }
}

pub type ResilienceResult<T, E = ResilienceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  #[error("backend down")]
  struct BackendDown;

  #[test]
  fn anyhow_conversion_unwraps_nested_resilience_errors() {
    let nested = AnyhowError::new(ResilienceError::TimedOut {
      timeout: Duration::from_millis(10),
    });
    assert_eq!(ResilienceError::from(nested).kind(), ErrorKind::TimedOut);

    let plain = AnyhowError::new(BackendDown);
    let converted = ResilienceError::from(plain);
    assert_eq!(converted.kind(), ErrorKind::OperationFailed);
    assert!(converted.operation_error().unwrap().is::<BackendDown>());
  }

  #[test]
  fn root_cause_sees_through_exhausted_retries() {
    let err = ResilienceError::RetriesExhausted {
      attempts: 3,
      last: Box::new(ResilienceError::RetriesExhausted {
        attempts: 2,
        last: Box::new(ResilienceError::from(AnyhowError::new(BackendDown))),
      }),
    };
    assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
    assert_eq!(err.root_cause().kind(), ErrorKind::OperationFailed);
    assert!(err.operation_error().is_some());
    assert!(err.to_string().contains("backend down"));
  }
}
