// rampart/src/strategies/timeout.rs

//! Timeout strategy: races the inner pipeline against a timer.

use crate::core::context::ResilienceContext;
use crate::core::outcome::Outcome;
use crate::core::strategy::{Next, ResilienceStrategy};
use crate::error::{ResilienceError, ResilienceResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

pub struct OnTimeoutArguments<'a> {
  pub timeout: Duration,
  pub context: &'a ResilienceContext,
}

pub type OnTimeout = Arc<dyn Fn(&OnTimeoutArguments<'_>) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct TimeoutOptions {
  pub timeout: Duration,
  pub on_timeout: Option<OnTimeout>,
}

impl Default for TimeoutOptions {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      on_timeout: None,
    }
  }
}

impl TimeoutOptions {
  pub fn new(timeout: Duration) -> Self {
    Self {
      timeout,
      on_timeout: None,
    }
  }

  pub fn on_timeout(mut self, observer: impl Fn(&OnTimeoutArguments<'_>) + Send + Sync + 'static) -> Self {
    self.on_timeout = Some(Arc::new(observer));
    self
  }
}

impl From<Duration> for TimeoutOptions {
  fn from(timeout: Duration) -> Self {
    Self::new(timeout)
  }
}

/// On expiry the inner step's token is cancelled and `TimedOut` is returned at once;
/// the inner future is dropped without waiting for it to wind down. Work the callback
/// spawned elsewhere keeps running unless it observes its token.
pub struct TimeoutStrategy {
  options: TimeoutOptions,
}

impl TimeoutStrategy {
  pub fn new(options: TimeoutOptions) -> ResilienceResult<Self> {
    if options.timeout.is_zero() {
      return Err(ResilienceError::configuration("timeout", "timeout must be greater than zero"));
    }
    Ok(Self { options })
  }

  pub fn timeout(&self) -> Duration {
    self.options.timeout
  }
}

#[async_trait]
impl<T: Send + 'static> ResilienceStrategy<T> for TimeoutStrategy {
  fn name(&self) -> &'static str {
    "timeout"
  }

  async fn execute(&self, ctx: ResilienceContext, next: Next<'_, T>) -> Outcome<T> {
    let timeout = self.options.timeout;
    // Child token: cancelling it on expiry leaves the caller's token untouched.
    let inner_token = ctx.cancellation_token().child_token();
    let inner_ctx = ctx.with_cancellation(inner_token.clone());

    tokio::select! {
      biased;
      _ = ctx.cancellation_token().cancelled() => {
        event!(Level::DEBUG, "Caller cancelled during timed execution.");
        Outcome::Failure(ResilienceError::Cancelled)
      }
      _ = tokio::time::sleep(timeout) => {
        inner_token.cancel();
        event!(Level::WARN, timeout_ms = timeout.as_millis() as u64, "Execution timed out.");
        if let Some(observer) = &self.options.on_timeout {
          observer(&OnTimeoutArguments { timeout, context: &ctx });
        }
        Outcome::Failure(ResilienceError::TimedOut { timeout })
      }
      outcome = next.run(inner_ctx) => outcome,
    }
  }
}
