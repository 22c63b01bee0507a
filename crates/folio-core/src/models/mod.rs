//! Data models shared between the API client and the session layer.
//!
//! - `UserProfile`, `Role`: the signed-in administrator
//! - `Credentials`: everything persisted for a signed-in device
//! - `ActiveSession`: an outstanding refresh token as reported by the API
//! - `Project`, `Message`, `SiteSettings`: portfolio content managed by
//!   the administrator

pub mod credentials;
pub mod message;
pub mod project;
pub mod session;
pub mod settings;
pub mod user;

pub use credentials::Credentials;
pub use message::Message;
pub use project::{Project, ProjectDraft, ProjectImage, ALL_CATEGORIES};
pub use session::ActiveSession;
pub use settings::SiteSettings;
pub use user::{Role, UserProfile};
