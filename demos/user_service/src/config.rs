// demos/user_service/src/config.rs

use crate::errors::{AppError, Result}; // Use AppError specific Result
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
  /// Which scenario to run: `all` or one of the names in `SCENARIOS` (see `main.rs`).
  pub scenario: String,
  pub log_json: bool,

  // Probability that the simulated backend fails, per scenario.
  pub retry_failure_probability: f64,
  pub fallback_failure_probability: f64,
  pub ioc_failure_probability: f64,
  pub exhausting_failure_probability: f64,

  // Timeout scenario
  pub timeout_slow_probability: f64,
  pub timeout: Duration,
  pub backend_delay: Duration,

  // Circuit breaker scenario
  pub breaker_failure_probability: f64,
  pub breaker_failure_ratio: f64,
  pub breaker_sampling: Duration,
  pub breaker_min_throughput: u32,
  pub breaker_break: Duration,
  pub breaker_calls: u32,

  // External API behind the standard resilience composition
  pub external_failure_probability: f64,
  pub standard_retry_delay: Duration,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let config = Self {
      scenario: env::var("SCENARIO").unwrap_or_else(|_| "all".to_string()),
      log_json: parse_or("LOG_JSON", false)?,
      retry_failure_probability: probability_or("RETRY_FAILURE_PROBABILITY", 0.7)?,
      fallback_failure_probability: probability_or("FALLBACK_FAILURE_PROBABILITY", 0.7)?,
      ioc_failure_probability: probability_or("IOC_FAILURE_PROBABILITY", 0.7)?,
      exhausting_failure_probability: probability_or("EXHAUSTING_FAILURE_PROBABILITY", 0.999)?,
      timeout_slow_probability: probability_or("TIMEOUT_SLOW_PROBABILITY", 0.5)?,
      timeout: Duration::from_millis(parse_or("TIMEOUT_MS", 1000)?),
      backend_delay: Duration::from_millis(parse_or("BACKEND_DELAY_MS", 3000)?),
      breaker_failure_probability: probability_or("BREAKER_FAILURE_PROBABILITY", 0.2)?,
      breaker_failure_ratio: probability_or("BREAKER_FAILURE_RATIO", 0.3)?,
      breaker_sampling: Duration::from_millis(parse_or("BREAKER_SAMPLING_MS", 1000)?),
      breaker_min_throughput: parse_or("BREAKER_MIN_THROUGHPUT", 3)?,
      breaker_break: Duration::from_secs(parse_or("BREAKER_BREAK_SECS", 30)?),
      breaker_calls: parse_or("BREAKER_CALLS", 10)?,
      external_failure_probability: probability_or("EXTERNAL_FAILURE_PROBABILITY", 0.6)?,
      standard_retry_delay: Duration::from_millis(parse_or("STANDARD_RETRY_DELAY_MS", 2000)?),
    };

    tracing::info!("Application configuration loaded successfully.");
    tracing::debug!(config = ?config, "Loaded config details");
    Ok(config)
  }
}

fn parse_or<T>(var_name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var_name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e))),
    Err(_) => Ok(default),
  }
}

fn probability_or(var_name: &str, default: f64) -> Result<f64> {
  let value = parse_or(var_name, default)?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(AppError::Config(format!("{} must be between 0 and 1, got {}", var_name, value)))
  }
}
