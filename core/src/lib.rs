// src/lib.rs

//! Rampart: composable, asynchronous resilience pipelines for Rust.
//!
//! A pipeline wraps any fallible async operation (a "callback") with layered
//! fault handling so the caller does not have to implement it:
//!  - Retry with constant, exponential or jittered backoff.
//!  - Circuit breaker with a time-bucketed sampling window and a single half-open probe.
//!  - Timeout that cancels the callback's token and returns without waiting for it.
//!  - Fallback that substitutes a value for a handled failure.
//!  - A string-keyed registry for pipelines built once and shared by many call sites.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod strategies;

// --- Re-exports for the Public API ---

pub use crate::core::context::ResilienceContext;
pub use crate::core::outcome::Outcome;
pub use crate::core::predicate::{PredicateBuilder, ShouldHandle};
pub use crate::core::strategy::{BoxFuture, Next, ResilienceStrategy};

pub use crate::pipeline::{build_pipeline, Pipeline, PipelineBuilder, StrategyConfig};

pub use crate::strategies::{
  CircuitBreakerHandle, CircuitBreakerOptions, CircuitState, CircuitTransition, DelayBackoff, FallbackOptions,
  HealthInfo, OnRetryArguments, OnTimeoutArguments, RetryOptions, TimeoutOptions,
};

pub use crate::error::{ErrorKind, ResilienceError, ResilienceResult};

pub use crate::registry::PipelineRegistry;

// The cancellation primitive threaded through every execution.
pub use tokio_util::sync::CancellationToken;

/*
    Core Workflow:
    1. Build a `Pipeline<T>` with `Pipeline::builder()`, adding strategies outermost first:
       `.add_fallback(..)`, `.add_retry(..)`, `.add_circuit_breaker(..)`, `.add_timeout(..)`.
    2. Optionally register the recipe in a `PipelineRegistry` under a key at startup.
    3. At call time, resolve the pipeline and call
       `pipeline.execute(|ctx| async move { .. }, cancellation_token).await`.
       The callback should watch `ctx.cancellation_token()`.
    4. Match on `ResilienceError::kind()` to translate final failures for your transport.
*/
