// demos/user_service/src/models/mod.rs

//! Data returned by the user service.

pub mod user;

pub use user::UserResponse;
