// rampart/src/pipeline/execution.rs

//! Contains the `Pipeline::execute*` methods, the executor that runs the
//! composed strategies around a caller's callback.

use crate::core::context::ResilienceContext;
use crate::core::outcome::Outcome;
use crate::core::strategy::{FnCallback, Next};
use crate::error::ResilienceError;
use crate::pipeline::definition::Pipeline;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

impl<T: Send + 'static> Pipeline<T> {
  /// Runs `callback` through every strategy and returns its final result.
  ///
  /// The callback receives a `ResilienceContext` whose cancellation token it should
  /// observe; strategies such as `Timeout` hand it a token tighter than `cancellation`.
  /// Errors returned by the callback surface as `ResilienceError::OperationFailed`
  /// unless a strategy resolves them. An error returned after the callback's token
  /// was cancelled surfaces as `ResilienceError::Cancelled`.
  pub async fn execute<F, Fut, E>(&self, callback: F, cancellation: CancellationToken) -> Result<T, ResilienceError>
  where
    F: Fn(ResilienceContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    self.execute_outcome(callback, cancellation).await.into_result()
  }

  /// Like [`Pipeline::execute`], returning the final `Outcome` instead of a `Result`.
  pub async fn execute_outcome<F, Fut, E>(&self, callback: F, cancellation: CancellationToken) -> Outcome<T>
  where
    F: Fn(ResilienceContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let mut ctx = ResilienceContext::new(cancellation);
    if let Some(name) = &self.name {
      ctx = ctx.with_operation_key(name.clone());
    }
    self.execute_with_context(callback, ctx).await
  }

  #[instrument(
    name = "Pipeline::execute",
    skip_all,
    fields(
      pipeline = self.name().unwrap_or("anonymous"),
      num_strategies = self.strategies.len(),
    )
  )]
  pub async fn execute_with_context<F, Fut, E>(&self, callback: F, ctx: ResilienceContext) -> Outcome<T>
  where
    F: Fn(ResilienceContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    if ctx.is_cancelled() {
      event!(Level::DEBUG, "Cancelled before execution started.");
      return Outcome::Failure(ResilienceError::Cancelled);
    }

    let callback = FnCallback(callback);
    let outcome = Next::new(&self.strategies, &callback).run(ctx).await;

    match &outcome {
      Outcome::Success(_) => event!(Level::DEBUG, "Pipeline execution succeeded."),
      Outcome::Failure(err) => event!(Level::DEBUG, error = %err, kind = ?err.kind(), "Pipeline execution failed."),
    }
    outcome
  }
}
