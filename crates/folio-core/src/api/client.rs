//! API client for the portfolio content API.
//!
//! This module provides the `ApiClient` struct for the JWT endpoints
//! (obtain, verify, refresh), the account endpoints used by the admin
//! panel (logout, logout-all, change-password, sessions) and the content
//! endpoints for projects, messages and site settings.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{ActiveSession, Message, Project, ProjectDraft, SiteSettings, ALL_CATEGORIES};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the content API when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const TOKEN_PATH: &str = "/token/";
const VERIFY_PATH: &str = "/token/verify/";
const REFRESH_PATH: &str = "/token/refresh/";
const LOGOUT_PATH: &str = "/logout/";
const LOGOUT_ALL_PATH: &str = "/logout-all/";
const CHANGE_PASSWORD_PATH: &str = "/change-password/";
const SESSIONS_PATH: &str = "/sessions/";
const PROJECTS_PATH: &str = "/projects/";
const MESSAGES_PATH: &str = "/messages/";
const SETTINGS_PATH: &str = "/settings/";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Serialize)]
struct RevokeSessionRequest {
    token_id: i64,
}

#[derive(Debug, Serialize)]
struct MarkReadRequest {
    is_read: bool,
}

/// Token pair returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// API client for the content API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for the given base URL (e.g. `http://host:8000/api`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json")
            .header(header::CACHE_CONTROL, "no-store");
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Check if response is successful, returning an error with body if not.
    ///
    /// Error bodies that are not JSON are reported as `MalformedBody` so callers
    /// can tell a broken server apart from a rejected request.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !body.trim().is_empty() && serde_json::from_str::<serde_json::Value>(&body).is_err() {
            return Err(ApiError::MalformedBody(format!(
                "status {} with non-JSON body",
                status
            )));
        }
        Err(ApiError::from_status(status, &body))
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::MalformedBody(e.to_string()))
    }

    async fn send_expect_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    /// Like `send_expect_json`, but an empty body reads as an empty list.
    async fn send_expect_list<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Vec<T>, ApiError> {
        let response = builder.send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| ApiError::MalformedBody(e.to_string()))
    }

    async fn send_expect_ok(builder: RequestBuilder) -> Result<(), ApiError> {
        let response = builder.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Token endpoints =====

    /// Exchange a username and password for an access/refresh token pair
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        debug!(username, "Sending authentication request");
        let builder = self
            .request(Method::POST, TOKEN_PATH, None)
            .json(&LoginRequest { username, password });
        Self::send_expect_json(builder).await
    }

    /// Ask the API whether an access token is still valid for this device
    pub async fn verify_token(&self, token: &str, device_id: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, VERIFY_PATH, None)
            .json(&VerifyRequest { token, device_id });
        Self::send_expect_ok(builder).await
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_token(&self, refresh: &str) -> Result<String, ApiError> {
        let builder = self
            .request(Method::POST, REFRESH_PATH, None)
            .json(&RefreshRequest { refresh });
        let parsed: RefreshResponse = Self::send_expect_json(builder).await?;
        Ok(parsed.access)
    }

    // ===== Account endpoints =====

    /// Blacklist a single refresh token
    pub async fn logout(&self, access: &str, refresh: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, LOGOUT_PATH, Some(access))
            .json(&RefreshRequest { refresh });
        Self::send_expect_ok(builder).await
    }

    /// Blacklist every outstanding refresh token of the account
    pub async fn logout_all(&self, access: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, LOGOUT_ALL_PATH, Some(access));
        Self::send_expect_ok(builder).await
    }

    pub async fn change_password(
        &self,
        access: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, CHANGE_PASSWORD_PATH, Some(access))
            .json(&ChangePasswordRequest {
                current_password,
                new_password,
            });
        Self::send_expect_ok(builder).await
    }

    /// List outstanding sessions of the account
    pub async fn list_sessions(&self, access: &str) -> Result<Vec<ActiveSession>, ApiError> {
        let builder = self.request(Method::GET, SESSIONS_PATH, Some(access));
        Self::send_expect_json(builder).await
    }

    /// Revoke one session by its outstanding-token id
    pub async fn revoke_session(&self, access: &str, token_id: i64) -> Result<(), ApiError> {
        let builder = self
            .request(Method::DELETE, SESSIONS_PATH, Some(access))
            .json(&RevokeSessionRequest { token_id });
        Self::send_expect_ok(builder).await
    }

    // ===== Project endpoints =====

    /// List projects, optionally filtered. A category of "All" means no filter.
    pub async fn list_projects(
        &self,
        access: &str,
        category: Option<&str>,
        featured: Option<bool>,
    ) -> Result<Vec<Project>, ApiError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(category) = category.filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORIES)) {
            query.push(("category", category.to_string()));
        }
        if let Some(featured) = featured {
            query.push(("featured", featured.to_string()));
        }
        debug!(?query, "Fetching projects");
        let mut builder = self.request(Method::GET, PROJECTS_PATH, Some(access));
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        Self::send_expect_list(builder).await
    }

    pub async fn get_project(&self, access: &str, id: i64) -> Result<Project, ApiError> {
        let builder = self.request(Method::GET, &project_path(id), Some(access));
        Self::send_expect_json(builder).await
    }

    pub async fn create_project(&self, access: &str, draft: &ProjectDraft) -> Result<Project, ApiError> {
        let builder = self
            .request(Method::POST, PROJECTS_PATH, Some(access))
            .form(&draft.form_fields());
        Self::send_expect_json(builder).await
    }

    /// Replace a project's editable fields. Images are left untouched.
    pub async fn update_project(
        &self,
        access: &str,
        id: i64,
        draft: &ProjectDraft,
    ) -> Result<Project, ApiError> {
        let builder = self
            .request(Method::PUT, &project_path(id), Some(access))
            .form(&draft.form_fields());
        Self::send_expect_json(builder).await
    }

    pub async fn delete_project(&self, access: &str, id: i64) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &project_path(id), Some(access));
        Self::send_expect_ok(builder).await
    }

    // ===== Message endpoints =====

    pub async fn list_messages(&self, access: &str) -> Result<Vec<Message>, ApiError> {
        let builder = self.request(Method::GET, MESSAGES_PATH, Some(access));
        Self::send_expect_list(builder).await
    }

    pub async fn set_message_read(&self, access: &str, id: i64, is_read: bool) -> Result<Message, ApiError> {
        let builder = self
            .request(Method::PATCH, &message_path(id), Some(access))
            .json(&MarkReadRequest { is_read });
        Self::send_expect_json(builder).await
    }

    pub async fn delete_message(&self, access: &str, id: i64) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &message_path(id), Some(access));
        Self::send_expect_ok(builder).await
    }

    // ===== Settings endpoints =====

    pub async fn get_settings(&self, access: &str) -> Result<SiteSettings, ApiError> {
        let builder = self.request(Method::GET, SETTINGS_PATH, Some(access));
        Self::send_expect_json(builder).await
    }

    pub async fn update_settings(&self, access: &str, settings: &SiteSettings) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, SETTINGS_PATH, Some(access))
            .json(settings);
        Self::send_expect_ok(builder).await
    }
}

fn project_path(id: i64) -> String {
    format!("{}{}/", PROJECTS_PATH, id)
}

fn message_path(id: i64) -> String {
    format!("{}{}/", MESSAGES_PATH, id)
}
