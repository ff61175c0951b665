// rampart/src/core/predicate.rs

//! Outcome classification. A strategy reacts only to outcomes its
//! `ShouldHandle<T>` reports as handled; everything else passes through.

use crate::core::outcome::Outcome;
use crate::error::{ErrorKind, ResilienceError};
use std::sync::Arc;

type Rule<T> = Arc<dyn Fn(&Outcome<T>) -> bool + Send + Sync + 'static>;

/// Fluent builder for an ordered set of rules. An outcome is handled if any rule matches.
///
/// ```ignore
/// let should_handle = PredicateBuilder::<User>::new()
///   .handle::<BackendUnavailable>()
///   .handle_result(|user| user.name.is_empty())
///   .build();
/// ```
pub struct PredicateBuilder<T> {
  rules: Vec<Rule<T>>,
}

impl<T: 'static> PredicateBuilder<T> {
  pub fn new() -> Self {
    Self { rules: Vec::new() }
  }

  /// Handles callback failures whose error is of type `E`, also when the
  /// failure arrives wrapped in `RetriesExhausted`.
  pub fn handle<E>(self) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    self.handle_error(|err| err.operation_error().map_or(false, |source| source.is::<E>()))
  }

  /// Handles callback failures of type `E` that also satisfy `filter`.
  pub fn handle_where<E>(self, filter: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    self.handle_error(move |err| {
      err
        .operation_error()
        .and_then(|source| source.downcast_ref::<E>())
        .map_or(false, |typed| filter(typed))
    })
  }

  pub fn handle_kind(self, kind: ErrorKind) -> Self {
    self.handle_error(move |err| err.kind() == kind || err.root_cause().kind() == kind)
  }

  pub fn handle_timeout(self) -> Self {
    self.handle_kind(ErrorKind::TimedOut)
  }

  pub fn handle_error(mut self, rule: impl Fn(&ResilienceError) -> bool + Send + Sync + 'static) -> Self {
    self.rules.push(Arc::new(move |outcome: &Outcome<T>| match outcome {
      Outcome::Failure(err) => rule(err),
      Outcome::Success(_) => false,
    }));
    self
  }

  /// Handles success values that should nevertheless trigger the strategy.
  pub fn handle_result(mut self, rule: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
    self.rules.push(Arc::new(move |outcome: &Outcome<T>| match outcome {
      Outcome::Success(value) => rule(value),
      Outcome::Failure(_) => false,
    }));
    self
  }

  pub fn handle_outcome(mut self, rule: impl Fn(&Outcome<T>) -> bool + Send + Sync + 'static) -> Self {
    self.rules.push(Arc::new(rule));
    self
  }

  /// Every failure except caller-initiated cancellation.
  pub fn handle_all_failures(self) -> Self {
    self.handle_error(|err| !err.is_cancelled())
  }

  pub fn build(self) -> ShouldHandle<T> {
    ShouldHandle {
      rules: self.rules.into(),
    }
  }
}

impl<T: 'static> Default for PredicateBuilder<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// A built, immutable predicate. Cheap to clone and safe to share across executions.
pub struct ShouldHandle<T> {
  rules: Arc<[Rule<T>]>,
}

impl<T: 'static> ShouldHandle<T> {
  pub fn is_handled(&self, outcome: &Outcome<T>) -> bool {
    self.rules.iter().any(|rule| rule(outcome))
  }

  /// Handles every failure whose kind is not in `excluded`. Used for strategy defaults.
  pub(crate) fn failures_except(excluded: &'static [ErrorKind]) -> Self {
    PredicateBuilder::new()
      .handle_error(move |err| !excluded.contains(&err.kind()))
      .build()
  }
}

impl<T> Clone for ShouldHandle<T> {
  fn clone(&self) -> Self {
    Self {
      rules: Arc::clone(&self.rules),
    }
  }
}

impl<T: 'static> From<PredicateBuilder<T>> for ShouldHandle<T> {
  fn from(builder: PredicateBuilder<T>) -> Self {
    builder.build()
  }
}

impl<T> std::fmt::Debug for ShouldHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ShouldHandle").field("rules", &self.rules.len()).finish()
  }
}
