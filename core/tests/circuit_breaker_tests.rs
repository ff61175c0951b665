// tests/circuit_breaker_tests.rs
mod common;

use common::*;
use rampart::{
  CancellationToken, CircuitBreakerHandle, CircuitBreakerOptions, CircuitState, CircuitTransition, ErrorKind,
  HealthInfo, Pipeline, PredicateBuilder, ResilienceContext, ResilienceError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const BREAK: Duration = Duration::from_secs(5);

fn breaker_options(handle: &CircuitBreakerHandle) -> CircuitBreakerOptions<User> {
  CircuitBreakerOptions::new()
    .with_failure_ratio(0.5)
    .with_minimum_throughput(3)
    .with_sampling_duration(Duration::from_secs(1))
    .with_break_duration(BREAK)
    .with_handle(handle.clone())
}

/// Runs one call that fails or succeeds depending on `fail`.
async fn call(pipeline: &Pipeline<User>, counter: &Arc<std::sync::atomic::AtomicUsize>, fail: bool) -> Result<User, ResilienceError> {
  let counter = counter.clone();
  pipeline
    .execute(
      move |_ctx: ResilienceContext| {
        let counter = counter.clone();
        async move {
          counter.fetch_add(1, Ordering::SeqCst);
          if fail {
            Err(TestError::Transient("backend down".to_string()))
          } else {
            Ok(User::named("Perico"))
          }
        }
      },
      CancellationToken::new(),
    )
    .await
}

async fn trip(pipeline: &Pipeline<User>, counter: &Arc<std::sync::atomic::AtomicUsize>) {
  assert!(call(pipeline, counter, true).await.is_err());
  assert!(call(pipeline, counter, true).await.is_err());
  assert!(call(pipeline, counter, false).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_when_failure_ratio_reached() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let log = TransitionLog::default();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle).on_state_change(log.recorder()))
    .build()
    .unwrap();
  let counter = counter();

  assert_eq!(handle.state(), Some(CircuitState::Closed));
  trip(&pipeline, &counter).await;

  assert_eq!(handle.state(), Some(CircuitState::Open));
  assert_eq!(
    log.entries(),
    vec![CircuitTransition::Opened {
      break_duration: Some(BREAK),
      health: HealthInfo { failures: 2, total: 3 },
      manual: false,
    }]
  );
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_rejects_without_invoking_callback() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();
  let counter = counter();
  trip(&pipeline, &counter).await;
  assert_eq!(calls(&counter), 3);

  for _ in 0..5 {
    let err = call(&pipeline, &counter, false).await.unwrap_err();
    match err {
      ResilienceError::CircuitOpen { retry_after } => assert_eq!(retry_after, Some(BREAK)),
      other => panic!("Expected CircuitOpen, got {:?}", other),
    }
  }
  assert_eq!(calls(&counter), 3, "Rejected calls must not reach the callback");
}

#[tokio::test(start_paused = true)]
async fn test_breaker_half_opens_after_break_and_closes_on_success() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let log = TransitionLog::default();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle).on_state_change(log.recorder()))
    .build()
    .unwrap();
  let counter = counter();
  trip(&pipeline, &counter).await;

  tokio::time::advance(BREAK).await;
  let result = call(&pipeline, &counter, false).await;

  assert!(result.is_ok());
  assert_eq!(calls(&counter), 4);
  assert_eq!(handle.state(), Some(CircuitState::Closed));
  assert_eq!(handle.health(), Some(HealthInfo::default()), "Closing resets the window");
  let transitions = log.entries();
  assert_eq!(transitions.len(), 3);
  assert_eq!(transitions[1], CircuitTransition::HalfOpened);
  assert_eq!(transitions[2], CircuitTransition::Closed { manual: false });
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens_breaker() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();
  let counter = counter();
  trip(&pipeline, &counter).await;

  tokio::time::advance(BREAK).await;
  assert!(call(&pipeline, &counter, true).await.is_err());
  assert_eq!(handle.state(), Some(CircuitState::Open));
  assert_eq!(calls(&counter), 4);

  let err = call(&pipeline, &counter, false).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::CircuitOpen);
  assert_eq!(calls(&counter), 4);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_admits_a_single_probe() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();
  let counter = counter();
  trip(&pipeline, &counter).await;
  tokio::time::advance(BREAK).await;

  let probe_counter = counter.clone();
  let slow_probe = pipeline.execute(
    slow_callback(Duration::from_millis(100), probe_counter),
    CancellationToken::new(),
  );
  let concurrent = call(&pipeline, &counter, false);
  let (probe, rejected) = tokio::join!(slow_probe, concurrent);

  assert!(probe.is_ok());
  assert_eq!(rejected.unwrap_err().kind(), ErrorKind::CircuitOpen);
  assert_eq!(calls(&counter), 4, "Only the probe reaches the callback");
  assert_eq!(handle.state(), Some(CircuitState::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_stays_closed_below_minimum_throughput() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();
  let counter = counter();

  assert!(call(&pipeline, &counter, true).await.is_err());
  assert!(call(&pipeline, &counter, true).await.is_err());

  assert_eq!(handle.state(), Some(CircuitState::Closed));
  assert_eq!(handle.health(), Some(HealthInfo { failures: 2, total: 2 }));
}

#[tokio::test(start_paused = true)]
async fn test_outcomes_outside_sampling_window_are_forgotten() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();
  let counter = counter();

  assert!(call(&pipeline, &counter, true).await.is_err());
  assert!(call(&pipeline, &counter, true).await.is_err());
  tokio::time::advance(Duration::from_secs(2)).await;
  assert!(call(&pipeline, &counter, true).await.is_err());

  assert_eq!(handle.state(), Some(CircuitState::Closed));
  assert_eq!(handle.health(), Some(HealthInfo { failures: 1, total: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_unhandled_failures_count_as_successes() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let should_handle = PredicateBuilder::<User>::new()
    .handle_where::<TestError>(|err| matches!(err, TestError::Permanent(_)))
    .build();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle).with_should_handle(should_handle))
    .build()
    .unwrap();
  let counter = counter();

  for _ in 0..4 {
    assert!(call(&pipeline, &counter, true).await.is_err());
  }

  assert_eq!(handle.state(), Some(CircuitState::Closed));
  assert_eq!(handle.health(), Some(HealthInfo { failures: 0, total: 4 }));
}

#[tokio::test(start_paused = true)]
async fn test_manual_isolate_and_close() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let log = TransitionLog::default();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle).on_state_change(log.recorder()))
    .build()
    .unwrap();
  let counter = counter();

  handle.isolate().unwrap();
  assert_eq!(handle.state(), Some(CircuitState::Isolated));
  tokio::time::advance(BREAK * 10).await;
  let err = call(&pipeline, &counter, false).await.unwrap_err();
  assert!(matches!(err, ResilienceError::CircuitOpen { retry_after: None }));
  assert_eq!(calls(&counter), 0);

  handle.close().unwrap();
  assert!(call(&pipeline, &counter, false).await.is_ok());
  assert_eq!(calls(&counter), 1);
  assert_eq!(
    log.entries(),
    vec![
      CircuitTransition::Opened {
        break_duration: None,
        health: HealthInfo::default(),
        manual: true,
      },
      CircuitTransition::Closed { manual: true },
    ]
  );
}

#[tokio::test]
async fn test_cancelled_calls_are_not_sampled() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();

  for _ in 0..3 {
    let result = pipeline
      .execute(
        |_ctx: ResilienceContext| async { Err::<User, _>(ResilienceError::Cancelled) },
        CancellationToken::new(),
      )
      .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
  }

  assert_eq!(handle.state(), Some(CircuitState::Closed));
  assert_eq!(handle.health(), Some(HealthInfo::default()));
}

#[tokio::test]
async fn test_invalid_breaker_options_fail_to_build() {
  setup_tracing();
  let zero_ratio = Pipeline::<User>::builder()
    .add_circuit_breaker(CircuitBreakerOptions::new().with_failure_ratio(0.0))
    .build();
  assert_eq!(zero_ratio.unwrap_err().kind(), ErrorKind::Configuration);

  let zero_throughput = Pipeline::<User>::builder()
    .add_circuit_breaker(CircuitBreakerOptions::new().with_minimum_throughput(0))
    .build();
  assert_eq!(zero_throughput.unwrap_err().kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_handle_reports_nothing_before_attachment() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  assert_eq!(handle.state(), None);
  assert_eq!(handle.isolate().unwrap_err().kind(), ErrorKind::Configuration);

  let _pipeline = Pipeline::<User>::builder()
    .add_circuit_breaker(CircuitBreakerOptions::new().with_handle(handle.clone()))
    .build()
    .unwrap();
  let second = Pipeline::<User>::builder()
    .add_circuit_breaker(CircuitBreakerOptions::new().with_handle(handle.clone()))
    .build();
  assert_eq!(second.unwrap_err().kind(), ErrorKind::Configuration);
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_does_not_trip_breaker() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(breaker_options(&handle))
    .build()
    .unwrap();
  let counter = counter();

  for _ in 0..3 {
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(100)).await;
      canceller.cancel();
    });
    let err = pipeline
      .execute(slow_callback(Duration::from_secs(60), counter.clone()), token)
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
  }

  assert_eq!(calls(&counter), 3);
  assert_eq!(handle.state(), Some(CircuitState::Closed));
  assert_eq!(handle.health(), Some(HealthInfo::default()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_half_open_admits_one_probe_under_contention() {
  setup_tracing();
  const CALLERS: usize = 16;
  let handle = CircuitBreakerHandle::new();
  let log = TransitionLog::default();
  let pipeline = Pipeline::builder()
    .add_circuit_breaker(
      breaker_options(&handle)
        .with_break_duration(Duration::from_millis(200))
        .on_state_change(log.recorder()),
    )
    .build()
    .unwrap();
  let counter = counter();
  trip(&pipeline, &counter).await;
  assert_eq!(handle.state(), Some(CircuitState::Open));
  tokio::time::sleep(Duration::from_millis(250)).await;

  let probe_calls = common::counter();
  let barrier = Arc::new(tokio::sync::Barrier::new(CALLERS));
  let tasks: Vec<_> = (0..CALLERS)
    .map(|_| {
      let pipeline = pipeline.clone();
      let probe_calls = probe_calls.clone();
      let barrier = barrier.clone();
      tokio::spawn(async move {
        barrier.wait().await;
        pipeline
          .execute(slow_callback(Duration::from_millis(500), probe_calls), CancellationToken::new())
          .await
      })
    })
    .collect();

  let mut admitted = 0;
  let mut rejected = 0;
  for task in tasks {
    match task.await.unwrap() {
      Ok(_) => admitted += 1,
      Err(err) => {
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        rejected += 1;
      }
    }
  }

  assert_eq!(admitted, 1);
  assert_eq!(rejected, CALLERS - 1);
  assert_eq!(calls(&probe_calls), 1, "Only the probe reaches the callback");
  let entries = log.entries();
  let count = |pred: fn(&CircuitTransition) -> bool| entries.iter().filter(|t| pred(t)).count();
  assert_eq!(count(|t| matches!(t, CircuitTransition::Opened { .. })), 1);
  assert_eq!(count(|t| matches!(t, CircuitTransition::HalfOpened)), 1);
  assert_eq!(handle.state(), Some(CircuitState::Closed));
}

#[tokio::test]
async fn test_handle_stays_free_when_a_later_layer_is_invalid() {
  setup_tracing();
  let handle = CircuitBreakerHandle::new();

  let invalid = Pipeline::<User>::builder()
    .add_circuit_breaker(CircuitBreakerOptions::new().with_handle(handle.clone()))
    .add_timeout(Duration::ZERO)
    .build();
  let err = invalid.unwrap_err();
  assert!(matches!(err, ResilienceError::Configuration { strategy: "timeout", .. }));
  assert_eq!(handle.state(), None);

  let _pipeline = Pipeline::<User>::builder()
    .add_circuit_breaker(CircuitBreakerOptions::new().with_handle(handle.clone()))
    .add_timeout(Duration::from_secs(1))
    .build()
    .unwrap();
  assert_eq!(handle.state(), Some(CircuitState::Closed));
}
