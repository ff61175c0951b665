// rampart/src/strategies/circuit_breaker/mod.rs

//! Circuit breaker strategy: stops calling a failing dependency for a while once
//! the ratio of handled failures in the sampling window reaches a threshold.
//!
//! `Closed` passes calls through and samples their outcomes. `Open` rejects calls
//! with `CircuitOpen` until the break duration has elapsed; the next call then moves
//! the circuit to `HalfOpen` and is let through as the single probe. A successful
//! probe closes the circuit and clears the window, a handled failure reopens it.

mod handle;
mod sampling;
mod state;

pub use handle::CircuitBreakerHandle;
pub use sampling::HealthInfo;
pub use state::{CircuitState, CircuitTransition, OnStateChange};

use crate::core::context::ResilienceContext;
use crate::core::outcome::Outcome;
use crate::core::predicate::ShouldHandle;
use crate::core::strategy::{Next, ResilienceStrategy};
use crate::error::{ErrorKind, ResilienceError, ResilienceResult};
use async_trait::async_trait;
use state::{Admission, CircuitController};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{event, Level};

pub struct CircuitBreakerOptions<T> {
  /// Handled failures / total calls at or above which the circuit opens. In (0, 1].
  pub failure_ratio: f64,
  pub sampling_duration: Duration,
  /// Calls required inside the window before the ratio is evaluated.
  pub minimum_throughput: u32,
  pub break_duration: Duration,
  pub should_handle: ShouldHandle<T>,
  pub on_state_change: Option<OnStateChange>,
  pub handle: Option<CircuitBreakerHandle>,
}

impl<T: 'static> Default for CircuitBreakerOptions<T> {
  fn default() -> Self {
    Self {
      failure_ratio: 0.1,
      sampling_duration: Duration::from_secs(30),
      minimum_throughput: 100,
      break_duration: Duration::from_secs(5),
      should_handle: ShouldHandle::failures_except(&[ErrorKind::Cancelled, ErrorKind::CircuitOpen]),
      on_state_change: None,
      handle: None,
    }
  }
}

impl<T: 'static> CircuitBreakerOptions<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_failure_ratio(mut self, failure_ratio: f64) -> Self {
    self.failure_ratio = failure_ratio;
    self
  }

  pub fn with_sampling_duration(mut self, sampling_duration: Duration) -> Self {
    self.sampling_duration = sampling_duration;
    self
  }

  pub fn with_minimum_throughput(mut self, minimum_throughput: u32) -> Self {
    self.minimum_throughput = minimum_throughput;
    self
  }

  pub fn with_break_duration(mut self, break_duration: Duration) -> Self {
    self.break_duration = break_duration;
    self
  }

  pub fn with_should_handle(mut self, should_handle: impl Into<ShouldHandle<T>>) -> Self {
    self.should_handle = should_handle.into();
    self
  }

  pub fn with_handle(mut self, handle: CircuitBreakerHandle) -> Self {
    self.handle = Some(handle);
    self
  }

  pub fn on_state_change(mut self, observer: impl Fn(&CircuitTransition) + Send + Sync + 'static) -> Self {
    self.on_state_change = Some(Arc::new(observer));
    self
  }

  fn validate(&self) -> ResilienceResult<()> {
    if !(self.failure_ratio > 0.0 && self.failure_ratio <= 1.0) {
      return Err(ResilienceError::configuration(
        "circuit_breaker",
        format!("failure_ratio must be in (0, 1], got {}", self.failure_ratio),
      ));
    }
    if self.minimum_throughput == 0 {
      return Err(ResilienceError::configuration(
        "circuit_breaker",
        "minimum_throughput must be at least 1",
      ));
    }
    if self.sampling_duration.is_zero() || self.break_duration.is_zero() {
      return Err(ResilienceError::configuration(
        "circuit_breaker",
        "sampling_duration and break_duration must be greater than zero",
      ));
    }
    Ok(())
  }
}

pub struct CircuitBreakerStrategy<T> {
  controller: Arc<CircuitController>,
  should_handle: ShouldHandle<T>,
  handle: Option<CircuitBreakerHandle>,
}

impl<T: Send + 'static> CircuitBreakerStrategy<T> {
  pub fn new(options: CircuitBreakerOptions<T>) -> ResilienceResult<Self> {
    let strategy = Self::unbound(options)?;
    strategy.bind_handle()?;
    Ok(strategy)
  }

  /// Validates and builds the breaker without attaching its handle yet.
  pub(crate) fn unbound(options: CircuitBreakerOptions<T>) -> ResilienceResult<Self> {
    options.validate()?;
    let controller = Arc::new(CircuitController::new(
      options.failure_ratio,
      options.minimum_throughput,
      options.sampling_duration,
      options.break_duration,
      options.on_state_change,
    ));
    Ok(Self {
      controller,
      should_handle: options.should_handle,
      handle: options.handle,
    })
  }

  /// Attaches the configured handle, if any, to this breaker.
  pub(crate) fn bind_handle(&self) -> ResilienceResult<()> {
    match &self.handle {
      Some(handle) => handle.attach(Arc::clone(&self.controller)),
      None => Ok(()),
    }
  }

  pub fn state(&self) -> CircuitState {
    self.controller.circuit_state()
  }
}

/// Gives the probe slot back if the execution future is dropped before it records
/// an outcome (e.g. an outer timeout fired).
struct InFlight<'a> {
  controller: &'a CircuitController,
  probe: bool,
  settled: bool,
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if !self.settled {
      self.controller.on_abandoned(self.probe);
    }
  }
}

#[async_trait]
impl<T: Send + 'static> ResilienceStrategy<T> for CircuitBreakerStrategy<T> {
  fn name(&self) -> &'static str {
    "circuit_breaker"
  }

  async fn execute(&self, ctx: ResilienceContext, next: Next<'_, T>) -> Outcome<T> {
    let probe = match self.controller.try_admit(Instant::now()) {
      Admission::Allowed { probe } => probe,
      Admission::Rejected { retry_after } => {
        event!(Level::DEBUG, ?retry_after, "Circuit not closed; rejecting call.");
        return Outcome::Failure(ResilienceError::CircuitOpen { retry_after });
      }
    };

    let mut in_flight = InFlight {
      controller: &self.controller,
      probe,
      settled: false,
    };
    let outcome = next.run(ctx).await;
    in_flight.settled = true;

    match &outcome {
      Outcome::Failure(ResilienceError::Cancelled) => self.controller.on_abandoned(probe),
      _ => {
        let handled = self.should_handle.is_handled(&outcome);
        self.controller.on_outcome(probe, handled, Instant::now());
      }
    }
    outcome
  }
}
