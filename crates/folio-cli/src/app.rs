//! Command handlers for the terminal client.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use folio_core::auth::{AuthOutcome, LoginError, Navigator, SessionPhase};
use folio_core::content::ProjectFilter;
use folio_core::models::{ActiveSession, Credentials, Message, Project, ProjectDraft};
use folio_core::storage::StorageBackend;
use folio_core::utils::{format_countdown, format_datetime, format_relative, mask_token, truncate_string};
use folio_core::{Config, Services, ServicesBuilder};

use crate::prompt;
use crate::ProjectFields;

/// Width of the token id column in the session list
const JTI_DISPLAY_WIDTH: usize = 12;

/// Width of the title column in the project list
const TITLE_DISPLAY_WIDTH: usize = 32;

/// Width of the subject column in the message list
const SUBJECT_DISPLAY_WIDTH: usize = 40;

/// Stands in for page navigation: tells the user where to go next.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn to_login(&self) {
        eprintln!("Session ended. Run 'folio login' to sign in again.");
    }

    fn to_dashboard(&self) {
        println!("Login successful!");
    }
}

pub struct App {
    config: Config,
    services: Services,
}

impl App {
    pub fn new(config: Config, api_url: String, ephemeral: bool) -> Result<Self> {
        let backend = if ephemeral {
            StorageBackend::Memory
        } else {
            config.storage
        };
        let storage = config.open_backend(backend)?;
        debug!(api_url = %api_url, ?backend, "Opening services");

        let services = ServicesBuilder::new(api_url, storage, Arc::new(TerminalNavigator))
            .in_flight_policy(config.in_flight_policy)
            .build()?;

        Ok(Self { config, services })
    }

    /// Credentials of a verified session, refreshing if needed.
    async fn require_session(&self) -> Result<Credentials> {
        match self.services.sessions.ensure_authenticated().await {
            AuthOutcome::Authenticated(credentials) => Ok(credentials),
            AuthOutcome::Redirect => bail!("Not logged in"),
            AuthOutcome::InProgress | AuthOutcome::Cancelled => {
                bail!("Session check did not complete")
            }
        }
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let mut username = match username {
            Some(name) => prompt::clean_username(&name)?,
            None => prompt::username(self.config.last_username.as_deref())?,
        };

        loop {
            let password = prompt::password("Password")?;
            match self.services.login.submit(&username, &password).await {
                Ok(user) => {
                    println!("Signed in as {} ({})", user.username, user.role.display_name());
                    self.config.last_username = Some(user.username);
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                    return Ok(());
                }
                Err(e @ LoginError::InvalidCredentials(_)) | Err(e @ LoginError::MissingCredentials) => {
                    eprintln!("{}", e);
                    if username.is_empty() {
                        username = prompt::username(self.config.last_username.as_deref())?;
                    }
                }
                Err(LoginError::LockedOut { remaining_secs }) => {
                    bail!(
                        "Too many failed attempts. Please try again in {}.",
                        format_countdown(remaining_secs)
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn status(&self) -> Result<()> {
        let page = self.services.sessions.mount();
        let credentials = match page.ensure_authenticated().await {
            AuthOutcome::Authenticated(credentials) => credentials,
            _ => bail!("Not logged in"),
        };

        match credentials.user {
            Some(ref user) => {
                println!("User:         {} ({})", user.username, user.role.display_name());
                println!("User id:      {}", user.id);
            }
            None => println!("User:         unknown"),
        }
        println!("Device:       {}", credentials.device_id);
        println!("Access token: {}", mask_token(&credentials.access_token));
        println!(
            "Refresh:      {}",
            if credentials.refresh_token.is_some() { "stored" } else { "missing" }
        );
        println!("Verified:     {}", format_datetime(page.last_verified_at()));
        println!("API:          {}", self.services.api.base_url());
        Ok(())
    }

    /// Hold a session open, re-verifying it on the keep-alive schedule.
    pub async fn watch(&self) -> Result<()> {
        let page = self.services.sessions.mount();
        let credentials = match page.ensure_authenticated().await {
            AuthOutcome::Authenticated(credentials) => credentials,
            _ => bail!("Not logged in"),
        };
        println!(
            "Watching session for {} (Ctrl+C to stop)",
            credentials.username().unwrap_or("unknown user")
        );

        page.start_keep_alive();
        let sweeper = self.services.start_sweeper();
        let mut phases = page.subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted, stopping watch");
                    break;
                }
                changed = phases.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let phase = *phases.borrow_and_update();
                    match phase {
                        SessionPhase::CheckingAuth => println!("Re-verifying session..."),
                        SessionPhase::Refreshing => println!("Access token rejected, refreshing..."),
                        SessionPhase::Authenticated => {
                            println!("Session verified at {}", format_datetime(page.last_verified_at()))
                        }
                        SessionPhase::NoToken | SessionPhase::Redirecting => break,
                        SessionPhase::Idle => {}
                    }
                }
            }
        }

        page.unmount();
        sweeper.abort();
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.services.account.logout().await?;
        println!("Logged out.");
        Ok(())
    }

    pub async fn logout_all(&self) -> Result<()> {
        self.require_session().await?;
        if !prompt::confirm("Sign out every device, including this one?")? {
            return Ok(());
        }
        println!("Logging out from all devices...");
        self.services.account.logout_all().await?;
        Ok(())
    }

    pub async fn change_password(&self) -> Result<()> {
        self.require_session().await?;
        let current = prompt::password("Current password")?;
        let new = prompt::password("New password")?;
        let confirmation = prompt::password("Confirm new password")?;
        if new != confirmation {
            bail!("New passwords do not match");
        }

        self.services.account.change_password(&current, &new).await?;
        println!("Password changed. All sessions have been signed out.");
        Ok(())
    }

    pub async fn sessions(&self) -> Result<()> {
        self.require_session().await?;
        let sessions = self.services.account.sessions().await?;
        if sessions.is_empty() {
            println!("No active sessions.");
            return Ok(());
        }

        println!(
            "  {:<6} {:<JTI_DISPLAY_WIDTH$} {:<24} {}",
            "ID", "TOKEN", "CREATED", "EXPIRES"
        );
        let now = Utc::now();
        for session in &sessions {
            println!("{}", session_line(session, now));
        }
        Ok(())
    }

    pub async fn revoke(&self, token_id: i64) -> Result<()> {
        self.require_session().await?;
        self.services.account.revoke_session(token_id).await?;
        println!("Session {} revoked.", token_id);
        Ok(())
    }

    pub fn device_id(&self) -> Result<()> {
        println!("{}", self.services.store.device_id()?);
        Ok(())
    }

    // ===== Content =====

    pub async fn projects(&self, category: Option<String>, featured: Option<bool>) -> Result<()> {
        self.require_session().await?;
        let filter = ProjectFilter { category, featured };
        let projects = self.services.content.projects(&filter).await?;
        if projects.is_empty() {
            println!("No projects found.");
            return Ok(());
        }

        println!(
            "  {:<6} {:<TITLE_DISPLAY_WIDTH$} {:<16} {}",
            "ID", "TITLE", "CATEGORY", "DATE"
        );
        for project in &projects {
            println!("{}", project_line(project));
        }
        Ok(())
    }

    pub async fn project(&self, id: i64) -> Result<()> {
        self.require_session().await?;
        let project = self.services.content.project(id).await?;
        println!("Title:       {}", project.title);
        println!("Slug:        {}", project.slug);
        println!("Category:    {}", project.category);
        println!("Client:      {}", project.client.as_deref().unwrap_or("-"));
        println!("Date:        {}", project.date);
        println!("Featured:    {}", if project.featured { "yes" } else { "no" });
        println!("Tags:        {}", project.tags.join(", "));
        println!("Updated:     {}", format_datetime(project.updated_at));
        match project.main_image() {
            Some(image) => println!("Images:      {} (main: {})", project.images.len(), image.image),
            None => println!("Images:      none"),
        }
        println!();
        println!("{}", project.description);
        Ok(())
    }

    pub async fn project_add(&self, fields: ProjectFields) -> Result<()> {
        self.require_session().await?;
        let mut draft = ProjectDraft::default();
        apply_fields(fields, &mut draft);
        let project = self.services.content.create_project(&draft).await?;
        println!("Project {} created ({}).", project.id, project.slug);
        Ok(())
    }

    pub async fn project_edit(&self, id: i64, fields: ProjectFields) -> Result<()> {
        self.require_session().await?;
        let project = self
            .services
            .content
            .edit_project(id, |draft| apply_fields(fields, draft))
            .await?;
        println!("Project {} updated.", project.id);
        Ok(())
    }

    pub async fn project_delete(&self, id: i64, yes: bool) -> Result<()> {
        self.require_session().await?;
        if !yes && !prompt::confirm(&format!("Delete project {}?", id))? {
            return Ok(());
        }
        self.services.content.delete_project(id).await?;
        println!("Project {} deleted.", id);
        Ok(())
    }

    pub async fn messages(&self, unread_only: bool) -> Result<()> {
        self.require_session().await?;
        let messages = self.services.content.messages(unread_only).await?;
        if messages.is_empty() {
            println!("No messages.");
            return Ok(());
        }

        let now = Utc::now();
        for message in &messages {
            println!("{}", message_line(message, now));
        }
        Ok(())
    }

    pub async fn message_read(&self, id: i64, is_read: bool) -> Result<()> {
        self.require_session().await?;
        self.services.content.mark_message(id, is_read).await?;
        println!(
            "Message {} marked as {}.",
            id,
            if is_read { "read" } else { "unread" }
        );
        Ok(())
    }

    pub async fn message_delete(&self, id: i64, yes: bool) -> Result<()> {
        self.require_session().await?;
        if !yes && !prompt::confirm(&format!("Delete message {}?", id))? {
            return Ok(());
        }
        self.services.content.delete_message(id).await?;
        println!("Message {} deleted.", id);
        Ok(())
    }

    pub async fn settings(&self) -> Result<()> {
        self.require_session().await?;
        let settings = self.services.content.settings().await?;
        println!("Title:       {}", settings.site_title);
        println!("Description: {}", settings.site_description);
        println!("Email:       {}", settings.contact_email);
        Ok(())
    }

    pub async fn settings_set(
        &self,
        title: Option<String>,
        description: Option<String>,
        email: Option<String>,
    ) -> Result<()> {
        if title.is_none() && description.is_none() && email.is_none() {
            bail!("Nothing to change. Pass --title, --description or --email.");
        }
        self.require_session().await?;
        self.services
            .content
            .update_settings(|settings| {
                if let Some(title) = title {
                    settings.site_title = title;
                }
                if let Some(description) = description {
                    settings.site_description = description;
                }
                if let Some(email) = email {
                    settings.contact_email = email;
                }
            })
            .await?;
        println!("Settings saved.");
        Ok(())
    }
}

/// Overwrite the draft fields that were given on the command line.
fn apply_fields(fields: ProjectFields, draft: &mut ProjectDraft) {
    if let Some(title) = fields.title {
        draft.title = title;
    }
    if let Some(category) = fields.category {
        draft.category = category;
    }
    if let Some(description) = fields.description {
        draft.description = description;
    }
    if let Some(client) = fields.client {
        draft.client = Some(client).filter(|c| !c.trim().is_empty());
    }
    if let Some(date) = fields.date {
        draft.date = date;
    }
    if let Some(featured) = fields.featured {
        draft.featured = featured;
    }
    if let Some(tags) = fields.tags {
        draft.tags = tags;
    }
}

fn project_line(project: &Project) -> String {
    let marker = if project.featured { '*' } else { ' ' };
    format!(
        "{} {:<6} {:<TITLE_DISPLAY_WIDTH$} {:<16} {}",
        marker,
        project.id,
        truncate_string(&project.title, TITLE_DISPLAY_WIDTH),
        truncate_string(&project.category, 16),
        project.date
    )
}

fn message_line(message: &Message, now: chrono::DateTime<Utc>) -> String {
    let marker = if message.is_read { ' ' } else { '+' };
    let received = message
        .created_at
        .map(|at| format_relative(at, now))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {:<6} {:<SUBJECT_DISPLAY_WIDTH$} {} <{}>, {}",
        marker,
        message.id,
        truncate_string(message.subject_or_default(), SUBJECT_DISPLAY_WIDTH),
        message.name,
        message.email,
        received
    )
}

fn session_line(session: &ActiveSession, now: chrono::DateTime<Utc>) -> String {
    let marker = if session.current { '*' } else { ' ' };
    let created = session
        .created_at
        .map(|at| format_relative(at, now))
        .unwrap_or_else(|| "-".to_string());
    let mut expires = format_datetime(session.expires_at);
    if session.is_expired() {
        expires.push_str(" (expired)");
    }
    format!(
        "{} {:<6} {:<JTI_DISPLAY_WIDTH$} {:<24} {}",
        marker,
        session.id,
        truncate_string(&session.jti, JTI_DISPLAY_WIDTH),
        created,
        expires
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_session_line_marks_current() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let session = ActiveSession {
            id: 12,
            created_at: Some(now - Duration::hours(3)),
            expires_at: Some(Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap()),
            jti: "0123456789abcdef0123".to_string(),
            current: true,
        };
        let line = session_line(&session, now);
        assert!(line.starts_with("* 12"));
        assert!(line.contains("012345678..."));
        assert!(line.contains("3 h ago"));
        assert!(line.ends_with("Jan 01, 2099 00:00 UTC"));
    }

    #[test]
    fn test_session_line_expired() {
        let now = Utc::now();
        let session = ActiveSession {
            id: 3,
            created_at: None,
            expires_at: Some(now - Duration::days(1)),
            jti: "abc".to_string(),
            current: false,
        };
        let line = session_line(&session, now);
        assert!(line.starts_with("  3"));
        assert!(line.ends_with("(expired)"));
    }

    #[test]
    fn test_apply_fields_keeps_omitted_and_clears_client() {
        let mut draft = ProjectDraft {
            title: "Posters".to_string(),
            category: "Print".to_string(),
            description: "Six posters".to_string(),
            client: Some("Acme".to_string()),
            date: "2023".to_string(),
            featured: false,
            tags: vec!["print".to_string()],
        };
        let fields = ProjectFields {
            featured: Some(true),
            client: Some(String::new()),
            ..ProjectFields::default()
        };
        apply_fields(fields, &mut draft);
        assert!(draft.featured);
        assert_eq!(draft.client, None);
        assert_eq!(draft.title, "Posters");
        assert_eq!(draft.tags, vec!["print"]);
    }

    #[test]
    fn test_message_line_marks_unread() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let message = Message {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: None,
            message: "Hello".to_string(),
            created_at: Some(now - Duration::hours(2)),
            is_read: false,
        };
        let line = message_line(&message, now);
        assert!(line.starts_with("+ 7"));
        assert!(line.contains("No Subject"));
        assert!(line.contains("Ada <ada@example.com>"));
        assert!(line.ends_with("2 h ago"));
    }
}
