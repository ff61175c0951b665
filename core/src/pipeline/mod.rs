// rampart/src/pipeline/mod.rs

//! Defines the `Pipeline<T>` struct, its construction, and execution logic.

pub mod builder;
pub mod definition;
pub mod execution;

// Re-export the main Pipeline struct
pub use builder::{build_pipeline, PipelineBuilder, StrategyConfig};
pub use definition::Pipeline;
