// rampart/src/strategies/fallback.rs

//! Fallback strategy: substitutes a handled outcome with one produced by a fallback action.

use crate::core::context::ResilienceContext;
use crate::core::outcome::Outcome;
use crate::core::predicate::ShouldHandle;
use crate::core::strategy::{Next, ResilienceStrategy};
use crate::error::ErrorKind;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, Level};

/// Pure function from the triggering outcome to its substitute.
pub type FallbackAction<T> = Arc<dyn Fn(&Outcome<T>, &ResilienceContext) -> Outcome<T> + Send + Sync + 'static>;

pub type OnFallback<T> = Arc<dyn Fn(&Outcome<T>, &ResilienceContext) + Send + Sync + 'static>;

pub struct FallbackOptions<T> {
  pub should_handle: ShouldHandle<T>,
  pub fallback_action: FallbackAction<T>,
  pub on_fallback: Option<OnFallback<T>>,
}

impl<T: 'static> FallbackOptions<T> {
  pub fn new(action: impl Fn(&Outcome<T>, &ResilienceContext) -> Outcome<T> + Send + Sync + 'static) -> Self {
    Self {
      should_handle: ShouldHandle::failures_except(&[ErrorKind::Cancelled]),
      fallback_action: Arc::new(action),
      on_fallback: None,
    }
  }

  /// Falls back to a clone of `value` regardless of the failure.
  pub fn with_value(value: T) -> Self
  where
    T: Clone + Send + Sync,
  {
    Self::new(move |_, _| Outcome::Success(value.clone()))
  }

  pub fn with_should_handle(mut self, should_handle: impl Into<ShouldHandle<T>>) -> Self {
    self.should_handle = should_handle.into();
    self
  }

  pub fn on_fallback(mut self, observer: impl Fn(&Outcome<T>, &ResilienceContext) + Send + Sync + 'static) -> Self {
    self.on_fallback = Some(Arc::new(observer));
    self
  }
}

pub struct FallbackStrategy<T> {
  options: FallbackOptions<T>,
}

impl<T: Send + 'static> FallbackStrategy<T> {
  pub fn new(options: FallbackOptions<T>) -> Self {
    Self { options }
  }
}

#[async_trait]
impl<T: Send + 'static> ResilienceStrategy<T> for FallbackStrategy<T> {
  fn name(&self) -> &'static str {
    "fallback"
  }

  async fn execute(&self, ctx: ResilienceContext, next: Next<'_, T>) -> Outcome<T> {
    let outcome = next.run(ctx.clone()).await;
    if !self.options.should_handle.is_handled(&outcome) {
      return outcome;
    }

    event!(
      Level::INFO,
      error = outcome.error().map(tracing::field::display),
      "Handled outcome; applying fallback."
    );
    if let Some(observer) = &self.options.on_fallback {
      observer(&outcome, &ctx);
    }
    (self.options.fallback_action)(&outcome, &ctx)
  }
}
