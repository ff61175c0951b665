// demos/user_service/src/models/user.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
  pub id: Uuid,
  pub name: String,
}

impl UserResponse {
  /// Placeholder user served when the backend cannot be reached.
  pub fn placeholder(name: &str) -> Self {
    Self {
      id: Uuid::nil(),
      name: name.to_string(),
    }
  }
}
