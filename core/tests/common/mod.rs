// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use parking_lot::Mutex;
use rampart::{BoxFuture, CircuitTransition, ResilienceContext};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

// --- Common Result Type ---
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
  pub id: u32,
  pub name: String,
}

impl User {
  pub fn named(name: &str) -> Self {
    Self {
      id: 1,
      name: name.to_string(),
    }
  }
}

// --- Common Error Types for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Transient backend failure: {0}")]
  Transient(String),

  #[error("Permanent backend failure: {0}")]
  Permanent(String),
}

// --- Common Callback Creators ---

pub type UserFuture = BoxFuture<'static, Result<User, TestError>>;

/// Fails with `TestError::Transient` for the first `failures` calls, then returns a user.
pub fn flaky_callback(
  failures: usize,
  calls: Arc<AtomicUsize>,
) -> impl Fn(ResilienceContext) -> UserFuture + Send + Sync
{
  move |_ctx: ResilienceContext| -> UserFuture {
    let calls = calls.clone();
    Box::pin(async move {
      let call = calls.fetch_add(1, Ordering::SeqCst);
      if call < failures {
        tracing::warn!(target: "test_callbacks", call, "failing on purpose");
        Err(TestError::Transient(format!("call {}", call)))
      } else {
        tracing::debug!(target: "test_callbacks", call, "succeeding");
        Ok(User::named("Perico"))
      }
    })
  }
}

pub fn always_failing(
  calls: Arc<AtomicUsize>,
) -> impl Fn(ResilienceContext) -> UserFuture + Send + Sync
{
  flaky_callback(usize::MAX, calls)
}

/// Sleeps for `delay` (or until its token is cancelled) before returning a user.
pub fn slow_callback(
  delay: Duration,
  calls: Arc<AtomicUsize>,
) -> impl Fn(ResilienceContext) -> UserFuture + Send + Sync
{
  move |ctx: ResilienceContext| -> UserFuture {
    let calls = calls.clone();
    Box::pin(async move {
      calls.fetch_add(1, Ordering::SeqCst);
      tokio::select! {
        _ = ctx.cancellation_token().cancelled() => Err(TestError::Transient("cancelled".to_string())),
        _ = tokio::time::sleep(delay) => Ok(User::named("Slow Perico")),
      }
    })
  }
}

pub fn counter() -> Arc<AtomicUsize> {
  Arc::new(AtomicUsize::new(0))
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
  counter.load(Ordering::SeqCst)
}

/// Collects circuit transitions reported to an `on_state_change` observer.
#[derive(Clone, Default)]
pub struct TransitionLog(Arc<Mutex<Vec<CircuitTransition>>>);

impl TransitionLog {
  pub fn recorder(&self) -> impl Fn(&CircuitTransition) + Send + Sync + 'static {
    let log = self.0.clone();
    move |transition| log.lock().push(*transition)
  }

  pub fn entries(&self) -> Vec<CircuitTransition> {
    self.0.lock().clone()
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Atomic counters shared by tests that run serially ---
pub static BACKEND_CALLS: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));
pub static FALLBACK_CALLS: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  BACKEND_CALLS.store(0, Ordering::SeqCst);
  FALLBACK_CALLS.store(0, Ordering::SeqCst);
}
