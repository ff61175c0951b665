// rampart/examples/basic_pipeline.rs

use rampart::{
  CancellationToken, DelayBackoff, FallbackOptions, Pipeline, ResilienceContext, ResilienceError, RetryOptions,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// 1. Define the value the protected operation produces
#[derive(Clone, Debug)]
struct Quote {
  symbol: String,
  price_cents: u64,
}

// 2. Define the operation's own error type
#[derive(Debug, thiserror::Error)]
enum QuoteError {
  #[error("Quote service unavailable (attempt {0})")]
  Unavailable(u32),
}

#[tokio::main]
async fn main() -> Result<(), ResilienceError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 3. Build the pipeline, outermost strategy first:
  //    fallback( retry( timeout( callback ) ) )
  let pipeline = Pipeline::<Quote>::builder()
    .with_name("quote-service")
    .add_fallback(
      FallbackOptions::with_value(Quote {
        symbol: "ACME".to_string(),
        price_cents: 0,
      })
      .on_fallback(|outcome, _ctx| {
        info!(error = ?outcome.error().map(|e| e.to_string()), "Serving stale quote.");
      }),
    )
    .add_retry(
      RetryOptions::new()
        .with_max_retry_attempts(3)
        .with_backoff(DelayBackoff::Exponential)
        .with_delay(Duration::from_millis(50))
        .on_retry(|args| info!(attempt = args.attempt, delay = ?args.delay, "Retrying quote lookup.")),
    )
    .add_timeout(Duration::from_millis(500))
    .build()?;

  // 4. Execute a flaky operation through it
  let attempts = Arc::new(AtomicU32::new(0));
  let counter = attempts.clone();
  let quote = pipeline
    .execute(
      move |ctx: ResilienceContext| {
        let counter = counter.clone();
        async move {
          let attempt = counter.fetch_add(1, Ordering::SeqCst);
          if ctx.is_cancelled() {
            return Err(QuoteError::Unavailable(attempt));
          }
          if attempt < 2 {
            Err(QuoteError::Unavailable(attempt))
          } else {
            Ok(Quote {
              symbol: "ACME".to_string(),
              price_cents: 12_345,
            })
          }
        }
      },
      CancellationToken::new(),
    )
    .await?;

  // 5. Inspect the results
  info!(symbol = %quote.symbol, price_cents = quote.price_cents, "Got quote.");
  info!("Callback invocations: {}", attempts.load(Ordering::SeqCst));

  // Two failures then a success: three invocations, no fallback.
  assert_eq!(quote.price_cents, 12_345);
  assert_eq!(attempts.load(Ordering::SeqCst), 3);

  Ok(())
}
