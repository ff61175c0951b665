// rampart/src/core/context.rs

//! Defines `ResilienceContext`, the per-execution data threaded through every layer.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-execution context handed to each strategy and finally to the callback.
///
/// Cloning is cheap: the cancellation token and the operation key are shared.
/// A strategy that needs a tighter deadline (e.g. `Timeout`) derives a child
/// context with [`ResilienceContext::with_cancellation`] so the caller's own
/// token is never cancelled by the pipeline.
#[derive(Debug, Clone)]
pub struct ResilienceContext {
  cancellation: CancellationToken,
  operation_key: Option<Arc<str>>,
}

impl ResilienceContext {
  pub fn new(cancellation: CancellationToken) -> Self {
    Self {
      cancellation,
      operation_key: None,
    }
  }

  pub fn with_operation_key(mut self, key: impl Into<Arc<str>>) -> Self {
    self.operation_key = Some(key.into());
    self
  }

  /// Returns a copy of this context carrying a different cancellation token.
  pub fn with_cancellation(&self, cancellation: CancellationToken) -> Self {
    Self {
      cancellation,
      operation_key: self.operation_key.clone(),
    }
  }

  /// The token the callback must observe to stop work promptly.
  pub fn cancellation_token(&self) -> &CancellationToken {
    &self.cancellation
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancellation.is_cancelled()
  }

  pub fn operation_key(&self) -> Option<&str> {
    self.operation_key.as_deref()
  }
}

impl Default for ResilienceContext {
  fn default() -> Self {
    Self::new(CancellationToken::new())
  }
}
