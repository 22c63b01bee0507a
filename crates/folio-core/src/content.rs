//! Portfolio content managed from the admin panel: projects, contact
//! messages and site settings.
//!
//! Every call uses the stored access token. Callers are expected to have
//! run the session check first so the token is fresh.

use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::auth::CredentialStore;
use crate::models::{Message, Project, ProjectDraft, SiteSettings};

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Not logged in. Run 'folio login' first.")]
    NotLoggedIn,

    #[error("The {0} field is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Rejected(String),

    #[error("Not found")]
    NotFound,

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error(transparent)]
    Api(ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<ApiError> for ContentError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => ContentError::SessionExpired,
            ApiError::NotFound(_) => ContentError::NotFound,
            ApiError::BadRequest(ref m) | ApiError::AccessDenied(ref m) if !m.is_empty() => {
                ContentError::Rejected(m.clone())
            }
            other => ContentError::Api(other),
        }
    }
}

/// Project list filter. `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    pub category: Option<String>,
    pub featured: Option<bool>,
}

pub struct ContentService {
    api: ApiClient,
    store: CredentialStore,
}

impl ContentService {
    pub fn new(api: ApiClient, store: CredentialStore) -> Self {
        Self { api, store }
    }

    fn access_token(&self) -> Result<String, ContentError> {
        self.store
            .load()?
            .map(|creds| creds.access_token)
            .ok_or(ContentError::NotLoggedIn)
    }

    // ===== Projects =====

    pub async fn projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, ContentError> {
        let token = self.access_token()?;
        Ok(self
            .api
            .list_projects(&token, filter.category.as_deref(), filter.featured)
            .await?)
    }

    pub async fn project(&self, id: i64) -> Result<Project, ContentError> {
        let token = self.access_token()?;
        Ok(self.api.get_project(&token, id).await?)
    }

    pub async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ContentError> {
        if let Some(field) = draft.missing_field() {
            return Err(ContentError::MissingField(field));
        }
        let token = self.access_token()?;
        let project = self.api.create_project(&token, draft).await?;
        info!(id = project.id, title = %project.title, "Project created");
        Ok(project)
    }

    /// Fetch a project, apply `edit` to its fields and save the result.
    pub async fn edit_project<F>(&self, id: i64, edit: F) -> Result<Project, ContentError>
    where
        F: FnOnce(&mut ProjectDraft),
    {
        let token = self.access_token()?;
        let mut draft = self.api.get_project(&token, id).await?.to_draft();
        edit(&mut draft);
        if let Some(field) = draft.missing_field() {
            return Err(ContentError::MissingField(field));
        }
        let project = self.api.update_project(&token, id, &draft).await?;
        info!(id, "Project updated");
        Ok(project)
    }

    pub async fn delete_project(&self, id: i64) -> Result<(), ContentError> {
        let token = self.access_token()?;
        self.api.delete_project(&token, id).await?;
        info!(id, "Project deleted");
        Ok(())
    }

    // ===== Messages =====

    /// Messages newest first, optionally only the unread ones.
    pub async fn messages(&self, unread_only: bool) -> Result<Vec<Message>, ContentError> {
        let token = self.access_token()?;
        let mut messages = self.api.list_messages(&token).await?;
        if unread_only {
            messages.retain(|m| !m.is_read);
        }
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    pub async fn mark_message(&self, id: i64, is_read: bool) -> Result<Message, ContentError> {
        let token = self.access_token()?;
        let message = self.api.set_message_read(&token, id, is_read).await?;
        info!(id, is_read, "Message updated");
        Ok(message)
    }

    pub async fn delete_message(&self, id: i64) -> Result<(), ContentError> {
        let token = self.access_token()?;
        self.api.delete_message(&token, id).await?;
        info!(id, "Message deleted");
        Ok(())
    }

    // ===== Settings =====

    pub async fn settings(&self) -> Result<SiteSettings, ContentError> {
        let token = self.access_token()?;
        Ok(self.api.get_settings(&token).await?)
    }

    /// Fetch the settings, apply `edit` and send them back whole.
    pub async fn update_settings<F>(&self, edit: F) -> Result<SiteSettings, ContentError>
    where
        F: FnOnce(&mut SiteSettings),
    {
        let token = self.access_token()?;
        let mut settings = self.api.get_settings(&token).await?;
        edit(&mut settings);
        self.api.update_settings(&token, &settings).await?;
        info!("Site settings updated");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> (ContentService, CredentialStore) {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        store
            .save_login("acc", "ref", &UserProfile::administrator(1, "admin"))
            .unwrap();
        let service = ContentService::new(ApiClient::new(server.uri()).unwrap(), store.clone());
        (service, store)
    }

    fn project_json(id: i64, title: &str, featured: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id, "title": title, "slug": "", "category": "Print",
            "description": "Six posters", "client": null, "date": "2023",
            "featured": featured, "images": [], "tags": ["print"]
        })
    }

    fn message_json(id: i64, created_at: &str, is_read: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id, "name": "Ada", "email": "ada@example.com", "subject": null,
            "message": "Hello", "created_at": created_at, "is_read": is_read
        })
    }

    #[tokio::test]
    async fn test_requires_login() {
        let server = MockServer::start().await;
        let (service, store) = service_for(&server);
        store.clear().unwrap();
        assert!(matches!(
            service.projects(&ProjectFilter::default()).await,
            Err(ContentError::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn test_create_project_validates_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        let (service, _) = service_for(&server);

        let draft = ProjectDraft {
            title: "Posters".to_string(),
            ..ProjectDraft::default()
        };
        assert!(matches!(
            service.create_project(&draft).await,
            Err(ContentError::MissingField("category"))
        ));
    }

    #[tokio::test]
    async fn test_edit_project_keeps_other_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/3/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_json(3, "Posters", false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/projects/3/"))
            .and(header("authorization", "Bearer acc"))
            .and(body_string_contains("title=Posters"))
            .and(body_string_contains("featured=true"))
            .and(body_string_contains("tags=print"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_json(3, "Posters", true)))
            .expect(1)
            .mount(&server)
            .await;
        let (service, _) = service_for(&server);

        let project = service.edit_project(3, |draft| draft.featured = true).await.unwrap();
        assert!(project.featured);
    }

    #[tokio::test]
    async fn test_delete_missing_project() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/projects/42/"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Not found."})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let (service, _) = service_for(&server);

        assert!(matches!(service.delete_project(42).await, Err(ContentError::NotFound)));
    }

    #[tokio::test]
    async fn test_messages_unread_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                message_json(1, "2026-10-01T08:00:00Z", false),
                message_json(2, "2026-10-02T08:00:00Z", true),
                message_json(3, "2026-10-03T08:00:00Z", false)
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let (service, _) = service_for(&server);

        let ids: Vec<i64> = service.messages(true).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_mark_message_unread() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/messages/2/"))
            .and(body_json(serde_json::json!({"is_read": false})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(message_json(2, "2026-10-02T08:00:00Z", false)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let (service, _) = service_for(&server);

        assert!(!service.mark_message(2, false).await.unwrap().is_read);
    }

    #[tokio::test]
    async fn test_expired_token_reported() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/messages/2/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                serde_json::json!({"detail": "Given token not valid for any token type"}),
            ))
            .mount(&server)
            .await;
        let (service, store) = service_for(&server);

        assert!(matches!(
            service.delete_message(2).await,
            Err(ContentError::SessionExpired)
        ));
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_settings_sends_merged_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/settings/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "site_title": "DesignSpace",
                "site_description": "Graphic design work",
                "contact_email": "old@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settings/"))
            .and(body_json(serde_json::json!({
                "site_title": "DesignSpace",
                "site_description": "Graphic design work",
                "contact_email": "new@example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"detail": "Settings updated successfully."}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        let (service, _) = service_for(&server);

        let settings = service
            .update_settings(|s| s.contact_email = "new@example.com".to_string())
            .await
            .unwrap();
        assert_eq!(settings.contact_email, "new@example.com");
    }
}
