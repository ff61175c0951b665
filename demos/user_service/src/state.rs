// demos/user_service/src/state.rs
use crate::config::AppConfig;
use rampart::PipelineRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub registry: Arc<PipelineRegistry>,
  pub config: Arc<AppConfig>, // Share loaded config
}
