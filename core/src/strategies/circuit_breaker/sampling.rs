// rampart/src/strategies/circuit_breaker/sampling.rs

//! Time-bucketed failure counter backing the circuit breaker's ratio check.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const BUCKET_COUNT: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct Bucket {
  start: Instant,
  failures: u32,
  total: u32,
}

/// Handled failures and total calls currently inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthInfo {
  pub failures: u32,
  pub total: u32,
}

impl HealthInfo {
  pub fn failure_ratio(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      f64::from(self.failures) / f64::from(self.total)
    }
  }
}

/// Splits the sampling duration into `BUCKET_COUNT` buckets. A bucket is evicted once
/// its start lies a full sampling duration in the past.
#[derive(Debug)]
pub(crate) struct SamplingWindow {
  duration: Duration,
  bucket_width: Duration,
  buckets: VecDeque<Bucket>,
}

impl SamplingWindow {
  pub(crate) fn new(duration: Duration) -> Self {
    let bucket_width = (duration / BUCKET_COUNT).max(Duration::from_nanos(1));
    Self {
      duration,
      bucket_width,
      buckets: VecDeque::with_capacity(BUCKET_COUNT as usize + 1),
    }
  }

  pub(crate) fn record(&mut self, handled_failure: bool, now: Instant) {
    self.evict(now);
    let needs_bucket = self
      .buckets
      .back()
      .map_or(true, |current| now.duration_since(current.start) >= self.bucket_width);
    if needs_bucket {
      self.buckets.push_back(Bucket {
        start: now,
        failures: 0,
        total: 0,
      });
    }
    if let Some(bucket) = self.buckets.back_mut() {
      bucket.total += 1;
      if handled_failure {
        bucket.failures += 1;
      }
    }
  }

  pub(crate) fn health(&mut self, now: Instant) -> HealthInfo {
    self.evict(now);
    self.buckets.iter().fold(HealthInfo::default(), |acc, bucket| HealthInfo {
      failures: acc.failures + bucket.failures,
      total: acc.total + bucket.total,
    })
  }

  pub(crate) fn reset(&mut self) {
    self.buckets.clear();
  }

  fn evict(&mut self, now: Instant) {
    while let Some(oldest) = self.buckets.front() {
      if now.duration_since(oldest.start) >= self.duration {
        self.buckets.pop_front();
      } else {
        break;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_failures_and_totals_within_the_window() {
    let start = Instant::now();
    let mut window = SamplingWindow::new(Duration::from_secs(1));
    window.record(true, start);
    window.record(true, start + Duration::from_millis(50));
    window.record(false, start + Duration::from_millis(250));

    let health = window.health(start + Duration::from_millis(300));
    assert_eq!(health, HealthInfo { failures: 2, total: 3 });
    assert!((health.failure_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
  }

  #[test]
  fn evicts_buckets_older_than_the_sampling_duration() {
    let start = Instant::now();
    let mut window = SamplingWindow::new(Duration::from_secs(1));
    window.record(true, start);
    window.record(false, start + Duration::from_millis(600));

    let health = window.health(start + Duration::from_millis(1_100));
    assert_eq!(health, HealthInfo { failures: 0, total: 1 });

    let health = window.health(start + Duration::from_secs(3));
    assert_eq!(health, HealthInfo::default());
  }

  #[test]
  fn reset_clears_everything() {
    let now = Instant::now();
    let mut window = SamplingWindow::new(Duration::from_millis(500));
    window.record(true, now);
    window.reset();
    assert_eq!(window.health(now), HealthInfo::default());
    assert_eq!(HealthInfo::default().failure_ratio(), 0.0);
  }
}
