// rampart/src/strategies/circuit_breaker/state.rs

//! The breaker's shared state machine. All reads and writes go through
//! `CircuitController`, which holds the only lock on state and window.

use super::sampling::{HealthInfo, SamplingWindow};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
  Closed,
  Open,
  HalfOpen,
  /// Manually forced open; stays open until closed manually.
  Isolated,
}

/// A state change, reported to the `on_state_change` observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitTransition {
  Opened {
    break_duration: Option<Duration>,
    health: HealthInfo,
    manual: bool,
  },
  HalfOpened,
  Closed {
    manual: bool,
  },
}

pub type OnStateChange = Arc<dyn Fn(&CircuitTransition) + Send + Sync + 'static>;

pub(crate) enum Admission {
  Allowed { probe: bool },
  Rejected { retry_after: Option<Duration> },
}

#[derive(Debug)]
struct ControllerState {
  circuit: CircuitState,
  window: SamplingWindow,
  blocked_until: Option<Instant>,
  probe_in_flight: bool,
}

pub(crate) struct CircuitController {
  state: Mutex<ControllerState>,
  failure_ratio: f64,
  minimum_throughput: u32,
  break_duration: Duration,
  on_state_change: Option<OnStateChange>,
}

impl CircuitController {
  pub(crate) fn new(
    failure_ratio: f64,
    minimum_throughput: u32,
    sampling_duration: Duration,
    break_duration: Duration,
    on_state_change: Option<OnStateChange>,
  ) -> Self {
    Self {
      state: Mutex::new(ControllerState {
        circuit: CircuitState::Closed,
        window: SamplingWindow::new(sampling_duration),
        blocked_until: None,
        probe_in_flight: false,
      }),
      failure_ratio,
      minimum_throughput,
      break_duration,
      on_state_change,
    }
  }

  pub(crate) fn circuit_state(&self) -> CircuitState {
    self.state.lock().circuit
  }

  pub(crate) fn health(&self, now: Instant) -> HealthInfo {
    self.state.lock().window.health(now)
  }

  /// Decides whether a call may reach the inner step. Moves `Open` to `HalfOpen`
  /// once the break has elapsed; the caller that does so becomes the probe.
  pub(crate) fn try_admit(&self, now: Instant) -> Admission {
    let (admission, transition) = {
      let mut state = self.state.lock();
      let (circuit, blocked_until) = (state.circuit, state.blocked_until);
      match circuit {
        CircuitState::Closed => (Admission::Allowed { probe: false }, None),
        CircuitState::Open => match blocked_until {
          Some(until) if now < until => (
            Admission::Rejected {
              retry_after: Some(until - now),
            },
            None,
          ),
          _ => {
            state.circuit = CircuitState::HalfOpen;
            state.probe_in_flight = true;
            (Admission::Allowed { probe: true }, Some(CircuitTransition::HalfOpened))
          }
        },
        CircuitState::HalfOpen if state.probe_in_flight => (Admission::Rejected { retry_after: None }, None),
        CircuitState::HalfOpen => {
          state.probe_in_flight = true;
          (Admission::Allowed { probe: true }, None)
        }
        CircuitState::Isolated => (Admission::Rejected { retry_after: None }, None),
      }
    };
    self.notify(transition);
    admission
  }

  pub(crate) fn on_outcome(&self, probe: bool, handled_failure: bool, now: Instant) {
    let transition = {
      let mut state = self.state.lock();
      let circuit = state.circuit;
      match circuit {
        CircuitState::HalfOpen if probe => {
          state.probe_in_flight = false;
          if handled_failure {
            let health = state.window.health(now);
            Some(self.open(&mut state, now, health))
          } else {
            state.circuit = CircuitState::Closed;
            state.blocked_until = None;
            state.window.reset();
            Some(CircuitTransition::Closed { manual: false })
          }
        }
        CircuitState::Closed => {
          state.window.record(handled_failure, now);
          let health = state.window.health(now);
          if health.failures > 0
            && health.total >= self.minimum_throughput
            && health.failure_ratio() >= self.failure_ratio
          {
            Some(self.open(&mut state, now, health))
          } else {
            None
          }
        }
        // Late results from calls admitted before the circuit left `Closed` are ignored.
        _ => {
          if probe {
            state.probe_in_flight = false;
          }
          None
        }
      }
    };
    self.notify(transition);
  }

  /// A call finished without a usable outcome (cancelled or dropped). Nothing is
  /// recorded; a probe gives its slot back so the next call can probe instead.
  pub(crate) fn on_abandoned(&self, probe: bool) {
    if probe {
      let mut state = self.state.lock();
      state.probe_in_flight = false;
      event!(Level::DEBUG, circuit = ?state.circuit, "Probe abandoned; slot released.");
    }
  }

  pub(crate) fn isolate(&self) {
    let transition = {
      let mut state = self.state.lock();
      if state.circuit == CircuitState::Isolated {
        None
      } else {
        state.circuit = CircuitState::Isolated;
        state.blocked_until = None;
        state.probe_in_flight = false;
        Some(CircuitTransition::Opened {
          break_duration: None,
          health: HealthInfo::default(),
          manual: true,
        })
      }
    };
    self.notify(transition);
  }

  pub(crate) fn close(&self) {
    let transition = {
      let mut state = self.state.lock();
      let was_closed = state.circuit == CircuitState::Closed;
      state.circuit = CircuitState::Closed;
      state.blocked_until = None;
      state.probe_in_flight = false;
      state.window.reset();
      (!was_closed).then_some(CircuitTransition::Closed { manual: true })
    };
    self.notify(transition);
  }

  fn open(&self, state: &mut ControllerState, now: Instant, health: HealthInfo) -> CircuitTransition {
    state.circuit = CircuitState::Open;
    state.blocked_until = Some(now + self.break_duration);
    CircuitTransition::Opened {
      break_duration: Some(self.break_duration),
      health,
      manual: false,
    }
  }

  // Observers run after the lock is released.
  fn notify(&self, transition: Option<CircuitTransition>) {
    let Some(transition) = transition else {
      return;
    };
    match &transition {
      CircuitTransition::Opened {
        break_duration,
        health,
        manual,
      } => event!(
        Level::WARN,
        ?break_duration,
        failures = health.failures,
        total = health.total,
        manual,
        "Circuit opened."
      ),
      CircuitTransition::HalfOpened => event!(Level::INFO, "Circuit half-open; admitting probe."),
      CircuitTransition::Closed { manual } => event!(Level::INFO, manual, "Circuit closed."),
    }
    if let Some(observer) = &self.on_state_change {
      observer(&transition);
    }
  }
}
