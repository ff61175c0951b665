// rampart/src/pipeline/builder.rs

//! Builds `Pipeline<T>` values from an ordered list of strategy configurations.
//! The first strategy added is the outermost layer.

use crate::core::strategy::ResilienceStrategy;
use crate::error::ResilienceResult;
use crate::pipeline::definition::Pipeline;
use crate::strategies::{
  CircuitBreakerOptions, CircuitBreakerStrategy, FallbackOptions, FallbackStrategy, RetryOptions, RetryStrategy,
  TimeoutOptions, TimeoutStrategy,
};
use std::sync::Arc;
use tracing::{event, Level};

/// Configuration for one layer of a pipeline.
pub enum StrategyConfig<T: Send + 'static> {
  Retry(RetryOptions<T>),
  CircuitBreaker(CircuitBreakerOptions<T>),
  Timeout(TimeoutOptions),
  Fallback(FallbackOptions<T>),
  /// A user-provided strategy. Adding the same `Arc` to several pipelines shares its state.
  Custom(Arc<dyn ResilienceStrategy<T>>),
}

impl<T: Send + 'static> StrategyConfig<T> {
  /// Breakers are pushed to `breakers` so their handles can be attached once every
  /// layer has validated.
  fn into_strategy(
    self,
    breakers: &mut Vec<Arc<CircuitBreakerStrategy<T>>>,
  ) -> ResilienceResult<Arc<dyn ResilienceStrategy<T>>> {
    let strategy: Arc<dyn ResilienceStrategy<T>> = match self {
      StrategyConfig::Retry(options) => Arc::new(RetryStrategy::new(options)?),
      StrategyConfig::CircuitBreaker(options) => {
        let breaker = Arc::new(CircuitBreakerStrategy::unbound(options)?);
        breakers.push(Arc::clone(&breaker));
        breaker
      }
      StrategyConfig::Timeout(options) => Arc::new(TimeoutStrategy::new(options)?),
      StrategyConfig::Fallback(options) => Arc::new(FallbackStrategy::new(options)),
      StrategyConfig::Custom(strategy) => strategy,
    };
    Ok(strategy)
  }
}

impl<T: Send + 'static> From<RetryOptions<T>> for StrategyConfig<T> {
  fn from(options: RetryOptions<T>) -> Self {
    StrategyConfig::Retry(options)
  }
}

impl<T: Send + 'static> From<CircuitBreakerOptions<T>> for StrategyConfig<T> {
  fn from(options: CircuitBreakerOptions<T>) -> Self {
    StrategyConfig::CircuitBreaker(options)
  }
}

impl<T: Send + 'static> From<TimeoutOptions> for StrategyConfig<T> {
  fn from(options: TimeoutOptions) -> Self {
    StrategyConfig::Timeout(options)
  }
}

impl<T: Send + 'static> From<FallbackOptions<T>> for StrategyConfig<T> {
  fn from(options: FallbackOptions<T>) -> Self {
    StrategyConfig::Fallback(options)
  }
}

pub struct PipelineBuilder<T: Send + 'static> {
  name: Option<String>,
  configs: Vec<StrategyConfig<T>>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
  pub fn new() -> Self {
    Self {
      name: None,
      configs: Vec::new(),
    }
  }

  /// Name used in log spans.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn add(mut self, config: impl Into<StrategyConfig<T>>) -> Self {
    self.configs.push(config.into());
    self
  }

  pub fn add_retry(self, options: RetryOptions<T>) -> Self {
    self.add(StrategyConfig::Retry(options))
  }

  pub fn add_circuit_breaker(self, options: CircuitBreakerOptions<T>) -> Self {
    self.add(StrategyConfig::CircuitBreaker(options))
  }

  pub fn add_timeout(self, options: impl Into<TimeoutOptions>) -> Self {
    self.add(StrategyConfig::Timeout(options.into()))
  }

  pub fn add_fallback(self, options: FallbackOptions<T>) -> Self {
    self.add(StrategyConfig::Fallback(options))
  }

  pub fn add_strategy(self, strategy: impl ResilienceStrategy<T> + 'static) -> Self {
    self.add(StrategyConfig::Custom(Arc::new(strategy)))
  }

  pub fn add_shared_strategy(self, strategy: Arc<dyn ResilienceStrategy<T>>) -> Self {
    self.add(StrategyConfig::Custom(strategy))
  }

  /// Validates every configuration and assembles the pipeline.
  pub fn build(self) -> ResilienceResult<Pipeline<T>> {
    let mut breakers = Vec::new();
    let strategies = self
      .configs
      .into_iter()
      .map(|config| config.into_strategy(&mut breakers))
      .collect::<ResilienceResult<Vec<_>>>()?;
    for breaker in &breakers {
      breaker.bind_handle()?;
    }

    let pipeline = Pipeline {
      name: self.name.map(Arc::from),
      strategies: Arc::from(strategies),
    };
    event!(
      Level::DEBUG,
      pipeline = pipeline.name().unwrap_or("anonymous"),
      strategies = ?pipeline.strategy_names(),
      "Pipeline built."
    );
    Ok(pipeline)
  }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// Builds a pipeline from configurations listed outermost first.
pub fn build_pipeline<T: Send + 'static>(
  configs: impl IntoIterator<Item = StrategyConfig<T>>,
) -> ResilienceResult<Pipeline<T>> {
  configs
    .into_iter()
    .fold(PipelineBuilder::new(), |builder, config| builder.add(config))
    .build()
}
