// rampart/src/core/outcome.rs

//! Defines `Outcome<T>`, the value every strategy inspects and passes outward.
//! Callback results are always captured into an `Outcome` before a strategy sees them.

use crate::error::ResilienceError;

#[derive(Debug)]
pub enum Outcome<T> {
  Success(T),
  Failure(ResilienceError),
}

impl<T> Outcome<T> {
  pub fn from_result<E>(result: Result<T, E>) -> Self
  where
    E: Into<anyhow::Error>,
  {
    match result {
      Ok(value) => Outcome::Success(value),
      Err(err) => Outcome::Failure(ResilienceError::from(err.into())),
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::Success(_))
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, Outcome::Failure(_))
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      Outcome::Success(value) => Some(value),
      Outcome::Failure(_) => None,
    }
  }

  pub fn error(&self) -> Option<&ResilienceError> {
    match self {
      Outcome::Success(_) => None,
      Outcome::Failure(err) => Some(err),
    }
  }

  pub fn into_result(self) -> Result<T, ResilienceError> {
    match self {
      Outcome::Success(value) => Ok(value),
      Outcome::Failure(err) => Err(err),
    }
  }
}

impl<T> From<Result<T, ResilienceError>> for Outcome<T> {
  fn from(result: Result<T, ResilienceError>) -> Self {
    match result {
      Ok(value) => Outcome::Success(value),
      Err(err) => Outcome::Failure(err),
    }
  }
}
