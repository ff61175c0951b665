// rampart/src/registry.rs

//! Defines `PipelineRegistry`, a string-keyed registry of pipelines that may
//! produce different result types. Pipelines are registered once at startup and
//! resolved by key at call time.

use crate::core::context::ResilienceContext;
use crate::error::{ResilienceError, ResilienceResult};
use crate::pipeline::{Pipeline, PipelineBuilder};

use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

type Configure<T> = Box<dyn Fn(PipelineBuilder<T>) -> PipelineBuilder<T> + Send + Sync>;

/// Type-erased registry entry, so pipelines over different `T` share one map.
trait AnyRegistryEntry: Send + Sync {
  fn result_type(&self) -> TypeId;

  fn result_type_name(&self) -> &'static str;

  /// Returns a `Box` holding a `Pipeline<T>` for this entry's `T`.
  fn resolve_any(&self, key: &str) -> ResilienceResult<Box<dyn Any + Send>>;
}

/// Builds its pipeline on first resolution and hands out clones afterwards, so every
/// resolver of a key shares the same strategy instances (and breaker state).
struct RegistryEntry<T: Send + 'static> {
  configure: Option<Configure<T>>,
  built: Mutex<Option<Pipeline<T>>>,
}

impl<T: Send + 'static> AnyRegistryEntry for RegistryEntry<T> {
  fn result_type(&self) -> TypeId {
    TypeId::of::<T>()
  }

  fn result_type_name(&self) -> &'static str {
    std::any::type_name::<T>()
  }

  fn resolve_any(&self, key: &str) -> ResilienceResult<Box<dyn Any + Send>> {
    let mut built = self.built.lock();
    if let Some(pipeline) = built.as_ref() {
      return Ok(Box::new(pipeline.clone()));
    }

    let configure = self.configure.as_ref().ok_or_else(|| ResilienceError::NotFound {
      key: key.to_string(),
    })?;
    event!(Level::DEBUG, %key, "Building registered pipeline on first resolution.");
    let pipeline = configure(PipelineBuilder::new().with_name(key)).build()?;
    *built = Some(pipeline.clone());
    Ok(Box::new(pipeline))
  }
}

#[derive(Default)]
pub struct PipelineRegistry {
  entries: RwLock<HashMap<String, Arc<dyn AnyRegistryEntry>>>,
}

impl PipelineRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a pipeline recipe under `key`. `configure` receives a builder
  /// already named after the key and adds the strategies.
  pub fn register<T, F>(&self, key: impl Into<String>, configure: F) -> ResilienceResult<()>
  where
    T: Send + 'static,
    F: Fn(PipelineBuilder<T>) -> PipelineBuilder<T> + Send + Sync + 'static,
  {
    self.insert(
      key.into(),
      RegistryEntry::<T> {
        configure: Some(Box::new(configure)),
        built: Mutex::new(None),
      },
    )
  }

  /// Registers an already built pipeline under `key`.
  pub fn register_pipeline<T: Send + 'static>(&self, key: impl Into<String>, pipeline: Pipeline<T>) -> ResilienceResult<()> {
    self.insert(
      key.into(),
      RegistryEntry::<T> {
        configure: None,
        built: Mutex::new(Some(pipeline)),
      },
    )
  }

  fn insert<T: Send + 'static>(&self, key: String, entry: RegistryEntry<T>) -> ResilienceResult<()> {
    let mut entries = self.entries.write();
    if entries.contains_key(&key) {
      event!(Level::ERROR, %key, "Pipeline key registered twice.");
      return Err(ResilienceError::AlreadyRegistered { key });
    }
    event!(Level::DEBUG, %key, result_type = %std::any::type_name::<T>(), "Registering pipeline.");
    entries.insert(key, Arc::new(entry));
    Ok(())
  }

  /// Returns the pipeline registered under `key`.
  ///
  /// Fails with `NotFound` for an unknown key and `TypeMismatch` if the entry
  /// produces results of a type other than `T`.
  pub fn resolve<T: Send + 'static>(&self, key: &str) -> ResilienceResult<Pipeline<T>> {
    let entry = self.entries.read().get(key).cloned().ok_or_else(|| {
      event!(Level::ERROR, %key, "No pipeline registered for key.");
      ResilienceError::NotFound { key: key.to_string() }
    })?;

    if entry.result_type() != TypeId::of::<T>() {
      event!(
        Level::ERROR,
        %key,
        registered = entry.result_type_name(),
        requested = std::any::type_name::<T>(),
        "Pipeline result type mismatch."
      );
      return Err(ResilienceError::TypeMismatch {
        key: key.to_string(),
        expected: std::any::type_name::<T>().to_string(),
      });
    }

    let erased = entry.resolve_any(key)?;
    erased
      .downcast::<Pipeline<T>>()
      .map(|boxed| *boxed)
      .map_err(|_| ResilienceError::TypeMismatch {
        key: key.to_string(),
        expected: std::any::type_name::<T>().to_string(),
      })
  }

  /// Resolves `key` and executes `callback` through it.
  #[instrument(name = "PipelineRegistry::execute", skip(self, callback, cancellation), err(Display))]
  pub async fn execute<T, F, Fut, E>(
    &self,
    key: &str,
    callback: F,
    cancellation: CancellationToken,
  ) -> Result<T, ResilienceError>
  where
    T: Send + 'static,
    F: Fn(ResilienceContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let pipeline = self.resolve::<T>(key)?;
    pipeline.execute(callback, cancellation).await
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.read().contains_key(key)
  }

  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
    keys.sort();
    keys
  }
}

impl std::fmt::Debug for PipelineRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineRegistry").field("keys", &self.keys()).finish()
  }
}
