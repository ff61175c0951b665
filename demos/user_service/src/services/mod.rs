// demos/user_service/src/services/mod.rs

pub mod external_backend;
pub mod user_backend;
pub mod user_resilience;
