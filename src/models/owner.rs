use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Bearer token for owner-facing endpoints. Returned once at
    /// registration, never listed afterwards.
    #[serde(skip_serializing)]
    pub api_token: String,
    pub created_at: NaiveDateTime,
}
