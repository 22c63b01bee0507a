use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An outstanding (not blacklisted) refresh token for the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub jti: String,
    #[serde(default)]
    pub current: bool,
}

impl ActiveSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|e| e <= Utc::now()).unwrap_or(false)
    }
}
