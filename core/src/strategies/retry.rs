// rampart/src/strategies/retry.rs

//! Retry strategy: re-runs the inner pipeline while its outcome is handled,
//! up to `max_retry_attempts` extra attempts, with a cancellable backoff delay.

use crate::core::context::ResilienceContext;
use crate::core::outcome::Outcome;
use crate::core::predicate::ShouldHandle;
use crate::core::strategy::{Next, ResilienceStrategy};
use crate::error::{ErrorKind, ResilienceError, ResilienceResult};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayBackoff {
  /// Retry immediately.
  None,
  /// `delay` before every retry.
  #[default]
  Constant,
  /// `delay * 2^attempt`.
  Exponential,
  /// Exponential, scaled by a random factor in `[0, 1]`.
  ExponentialWithJitter,
}

impl DelayBackoff {
  /// Delay to wait after the failed attempt `attempt` (0 for the first try).
  pub fn delay_for(&self, attempt: u32, base: Duration, max_delay: Option<Duration>) -> Duration {
    let delay = match self {
      DelayBackoff::None => Duration::ZERO,
      DelayBackoff::Constant => base,
      DelayBackoff::Exponential => exponential(base, attempt),
      DelayBackoff::ExponentialWithJitter => {
        let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        let scaled = exponential(base, attempt).as_secs_f64() * factor;
        Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX)
      }
    };
    match max_delay {
      Some(max) => delay.min(max),
      None => delay,
    }
  }
}

fn exponential(base: Duration, attempt: u32) -> Duration {
  2u32
    .checked_pow(attempt)
    .and_then(|factor| base.checked_mul(factor))
    .unwrap_or(Duration::MAX)
}

/// Arguments passed to the `on_retry` observer.
pub struct OnRetryArguments<'a, T> {
  /// Zero-based index of the attempt that just failed.
  pub attempt: u32,
  pub delay: Duration,
  pub outcome: &'a Outcome<T>,
  pub context: &'a ResilienceContext,
}

pub type OnRetry<T> = Arc<dyn Fn(&OnRetryArguments<'_, T>) + Send + Sync + 'static>;

pub struct RetryOptions<T> {
  /// Extra attempts beyond the first. `0` disables retrying.
  pub max_retry_attempts: u32,
  pub backoff: DelayBackoff,
  pub delay: Duration,
  pub max_delay: Option<Duration>,
  pub should_handle: ShouldHandle<T>,
  pub on_retry: Option<OnRetry<T>>,
}

impl<T: 'static> Default for RetryOptions<T> {
  fn default() -> Self {
    Self {
      max_retry_attempts: 3,
      backoff: DelayBackoff::Constant,
      delay: Duration::from_secs(2),
      max_delay: None,
      should_handle: ShouldHandle::failures_except(&[ErrorKind::Cancelled]),
      on_retry: None,
    }
  }
}

impl<T: 'static> RetryOptions<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
    self.max_retry_attempts = attempts;
    self
  }

  pub fn with_backoff(mut self, backoff: DelayBackoff) -> Self {
    self.backoff = backoff;
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
    self.max_delay = Some(max_delay);
    self
  }

  pub fn with_should_handle(mut self, should_handle: impl Into<ShouldHandle<T>>) -> Self {
    self.should_handle = should_handle.into();
    self
  }

  pub fn on_retry(mut self, observer: impl Fn(&OnRetryArguments<'_, T>) + Send + Sync + 'static) -> Self {
    self.on_retry = Some(Arc::new(observer));
    self
  }
}

pub struct RetryStrategy<T> {
  options: RetryOptions<T>,
}

impl<T: Send + 'static> RetryStrategy<T> {
  pub fn new(options: RetryOptions<T>) -> ResilienceResult<Self> {
    if let Some(max_delay) = options.max_delay {
      if max_delay < options.delay && options.backoff != DelayBackoff::None {
        return Err(ResilienceError::configuration(
          "retry",
          format!("max_delay {:?} is shorter than delay {:?}", max_delay, options.delay),
        ));
      }
    }
    Ok(Self { options })
  }

  fn exhausted(outcome: Outcome<T>, attempts: u32) -> Outcome<T> {
    match outcome {
      Outcome::Failure(last) => {
        event!(Level::WARN, attempts, error = %last, "Retries exhausted.");
        Outcome::Failure(ResilienceError::RetriesExhausted {
          attempts,
          last: Box::new(last),
        })
      }
      success => success,
    }
  }
}

#[async_trait]
impl<T: Send + 'static> ResilienceStrategy<T> for RetryStrategy<T> {
  fn name(&self) -> &'static str {
    "retry"
  }

  async fn execute(&self, ctx: ResilienceContext, next: Next<'_, T>) -> Outcome<T> {
    let options = &self.options;
    let mut attempt: u32 = 0;

    loop {
      let outcome = next.run(ctx.clone()).await;

      if !options.should_handle.is_handled(&outcome) {
        event!(Level::TRACE, attempt, "Outcome not handled by retry; returning it.");
        return outcome;
      }
      if attempt >= options.max_retry_attempts {
        return Self::exhausted(outcome, attempt + 1);
      }

      let delay = options.backoff.delay_for(attempt, options.delay, options.max_delay);
      event!(
        Level::WARN,
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = outcome.error().map(tracing::field::display),
        "Handled outcome; scheduling retry."
      );
      if let Some(observer) = &options.on_retry {
        observer(&OnRetryArguments {
          attempt,
          delay,
          outcome: &outcome,
          context: &ctx,
        });
      }

      // Cancellation wins ties against the timer and is never itself retried.
      tokio::select! {
        biased;
        _ = ctx.cancellation_token().cancelled() => {
          event!(Level::DEBUG, attempt, "Cancelled while waiting to retry.");
          return Outcome::Failure(ResilienceError::Cancelled);
        }
        _ = tokio::time::sleep(delay) => {}
      }

      attempt += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_delays_follow_the_configured_kind() {
    let base = Duration::from_millis(100);
    assert_eq!(DelayBackoff::None.delay_for(3, base, None), Duration::ZERO);
    assert_eq!(DelayBackoff::Constant.delay_for(3, base, None), base);
    assert_eq!(DelayBackoff::Exponential.delay_for(0, base, None), base);
    assert_eq!(DelayBackoff::Exponential.delay_for(3, base, None), Duration::from_millis(800));
    assert_eq!(
      DelayBackoff::Exponential.delay_for(3, base, Some(Duration::from_millis(250))),
      Duration::from_millis(250)
    );
  }

  #[test]
  fn jittered_backoff_stays_within_exponential_bound() {
    let base = Duration::from_millis(100);
    for attempt in 0..6 {
      let delay = DelayBackoff::ExponentialWithJitter.delay_for(attempt, base, None);
      let bound = DelayBackoff::Exponential.delay_for(attempt, base, None);
      assert!(delay <= bound + Duration::from_micros(1));
    }
  }

  #[test]
  fn exponential_backoff_saturates_instead_of_overflowing() {
    let delay = DelayBackoff::Exponential.delay_for(200, Duration::from_secs(1), None);
    assert_eq!(delay, Duration::MAX);
  }

  #[test]
  fn max_delay_shorter_than_delay_is_rejected() {
    let options = RetryOptions::<u32>::new()
      .with_delay(Duration::from_secs(2))
      .with_max_delay(Duration::from_secs(1));
    assert!(matches!(
      RetryStrategy::new(options),
      Err(ResilienceError::Configuration { strategy: "retry", .. })
    ));
  }
}
