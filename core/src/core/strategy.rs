// rampart/src/core/strategy.rs

//! Defines the `ResilienceStrategy<T>` trait implemented by every layer of a pipeline,
//! and `Next<'_, T>`, the handle a strategy uses to run everything nested inside it.

use crate::core::context::ResilienceContext;
use crate::core::outcome::Outcome;
use crate::error::ResilienceError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single fault-handling layer.
///
/// A strategy receives the execution context and a [`Next`] handle for the
/// inner part of the pipeline (remaining strategies plus the callback). It may
/// call `next.run(..)` zero times (rejection), once, or several times (retry),
/// and returns the `Outcome` the next outer layer will see.
#[async_trait]
pub trait ResilienceStrategy<T>: Send + Sync
where
  T: Send + 'static,
{
  /// Short name used in logs and configuration errors.
  fn name(&self) -> &'static str;

  async fn execute(&self, ctx: ResilienceContext, next: Next<'_, T>) -> Outcome<T>;
}

/// Type-erased user callback. The executor captures its `Result` into an `Outcome`.
///
/// An error returned after the callback's token was cancelled becomes `Cancelled`.
pub(crate) trait Callback<T>: Send + Sync {
  fn invoke(&self, ctx: ResilienceContext) -> BoxFuture<'_, Outcome<T>>;
}

pub(crate) struct FnCallback<F>(pub(crate) F);

impl<T, F, Fut, E> Callback<T> for FnCallback<F>
where
  T: Send + 'static,
  F: Fn(ResilienceContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  E: Into<anyhow::Error> + 'static,
{
  fn invoke(&self, ctx: ResilienceContext) -> BoxFuture<'_, Outcome<T>> {
    let cancellation = ctx.cancellation_token().clone();
    let fut = (self.0)(ctx);
    Box::pin(async move {
      match fut.await {
        Ok(value) => Outcome::Success(value),
        Err(_) if cancellation.is_cancelled() => Outcome::Failure(ResilienceError::Cancelled),
        Err(err) => Outcome::Failure(ResilienceError::from(err.into())),
      }
    })
  }
}

/// The inner part of a pipeline as seen from one strategy.
///
/// `Next` is `Copy`; a strategy may run it as many times as it needs.
pub struct Next<'a, T: Send + 'static> {
  strategies: &'a [Arc<dyn ResilienceStrategy<T>>],
  callback: &'a dyn Callback<T>,
}

impl<'a, T: Send + 'static> Clone for Next<'a, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<'a, T: Send + 'static> Copy for Next<'a, T> {}

impl<'a, T> Next<'a, T>
where
  T: Send + 'static,
{
  pub(crate) fn new(strategies: &'a [Arc<dyn ResilienceStrategy<T>>], callback: &'a dyn Callback<T>) -> Self {
    Self { strategies, callback }
  }

  /// Runs the remaining strategies (outermost first) and finally the callback.
  pub fn run(self, ctx: ResilienceContext) -> BoxFuture<'a, Outcome<T>> {
    match self.strategies.split_first() {
      Some((current, inner)) => current.execute(ctx, Next::new(inner, self.callback)),
      None => self.callback.invoke(ctx),
    }
  }

  /// Number of strategies still to run before the callback.
  pub fn depth(&self) -> usize {
    self.strategies.len()
  }
}
