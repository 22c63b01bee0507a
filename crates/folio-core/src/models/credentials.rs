use super::UserProfile;

/// Credentials persisted for the current device.
///
/// `refresh_token` and `user` may be missing from storage (partially cleared
/// or corrupt state); the session layer treats a missing refresh token as
/// "cannot recover".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
    pub device_id: String,
}

impl Credentials {
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}
