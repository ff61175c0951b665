// rampart/src/strategies/circuit_breaker/handle.rs

use super::sampling::HealthInfo;
use super::state::{CircuitController, CircuitState};
use crate::error::{ResilienceError, ResilienceResult};
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;

/// Observes and manually controls one circuit breaker from outside its pipeline.
///
/// Create a handle, pass a clone in `CircuitBreakerOptions::with_handle`, and keep
/// the original. A handle binds to exactly one breaker.
#[derive(Clone, Default)]
pub struct CircuitBreakerHandle {
  controller: Arc<OnceLock<Arc<CircuitController>>>,
}

impl CircuitBreakerHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn attach(&self, controller: Arc<CircuitController>) -> ResilienceResult<()> {
    self.controller.set(controller).map_err(|_| {
      ResilienceError::configuration("circuit_breaker", "handle is already attached to another circuit breaker")
    })
  }

  /// `None` until the breaker this handle was given to has been built.
  pub fn state(&self) -> Option<CircuitState> {
    self.controller.get().map(|controller| controller.circuit_state())
  }

  pub fn health(&self) -> Option<HealthInfo> {
    self.controller.get().map(|controller| controller.health(Instant::now()))
  }

  /// Forces the circuit open until [`CircuitBreakerHandle::close`] is called.
  pub fn isolate(&self) -> ResilienceResult<()> {
    self.attached()?.isolate();
    Ok(())
  }

  /// Closes the circuit and clears its sampling window.
  pub fn close(&self) -> ResilienceResult<()> {
    self.attached()?.close();
    Ok(())
  }

  fn attached(&self) -> ResilienceResult<&Arc<CircuitController>> {
    self
      .controller
      .get()
      .ok_or_else(|| ResilienceError::configuration("circuit_breaker", "handle is not attached to a circuit breaker"))
  }
}

impl std::fmt::Debug for CircuitBreakerHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CircuitBreakerHandle").field("state", &self.state()).finish()
  }
}
