pub mod context;
pub mod outcome;
pub mod predicate;
pub mod strategy;

// Re-export key types for easier access from other modules (and lib.rs)
pub use context::ResilienceContext;
pub use outcome::Outcome;
pub use predicate::{PredicateBuilder, ShouldHandle};
pub use strategy::{BoxFuture, Next, ResilienceStrategy};
