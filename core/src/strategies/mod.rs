// rampart/src/strategies/mod.rs

//! The built-in strategies. Each wraps, never extends, the layer inside it.

pub mod circuit_breaker;
pub mod fallback;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{
  CircuitBreakerHandle, CircuitBreakerOptions, CircuitBreakerStrategy, CircuitState, CircuitTransition, HealthInfo,
};
pub use fallback::{FallbackOptions, FallbackStrategy};
pub use retry::{DelayBackoff, OnRetryArguments, RetryOptions, RetryStrategy};
pub use timeout::{OnTimeoutArguments, TimeoutOptions, TimeoutStrategy};
