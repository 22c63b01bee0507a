use serde::{Deserialize, Serialize};

/// Role granted to users of the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Administrator,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
        }
    }
}

/// Profile of the signed-in user. Built once from the login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    pub fn administrator(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            role: Role::Administrator,
        }
    }
}
