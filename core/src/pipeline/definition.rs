// rampart/src/pipeline/definition.rs

//! Contains the `Pipeline<T>` struct definition.

use crate::core::strategy::ResilienceStrategy;
use crate::pipeline::builder::PipelineBuilder;
use std::sync::Arc;

/// An immutable, ordered composition of strategies around a callback.
///
/// Strategies are stored outermost first: a pipeline built from `[A, B, C]`
/// runs as `A(B(C(callback)))`. Cloning a pipeline is cheap and shares the
/// strategies, so a circuit breaker keeps one state across all clones.
pub struct Pipeline<T: Send + 'static> {
  pub(crate) name: Option<Arc<str>>,
  pub(crate) strategies: Arc<[Arc<dyn ResilienceStrategy<T>>]>,
}

impl<T: Send + 'static> Pipeline<T> {
  pub fn builder() -> PipelineBuilder<T> {
    PipelineBuilder::new()
  }

  /// A pipeline without strategies; executing it just runs the callback.
  pub fn empty() -> Self {
    Self {
      name: None,
      strategies: Arc::from(Vec::new()),
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Strategy names, outermost first.
  pub fn strategy_names(&self) -> Vec<&'static str> {
    self.strategies.iter().map(|strategy| strategy.name()).collect()
  }

  pub fn len(&self) -> usize {
    self.strategies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strategies.is_empty()
  }
}

impl<T: Send + 'static> Clone for Pipeline<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      strategies: Arc::clone(&self.strategies),
    }
  }
}

impl<T: Send + 'static> std::fmt::Debug for Pipeline<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("name", &self.name)
      .field("strategies", &self.strategy_names())
      .finish()
  }
}
