//! Authentication module for the admin session lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: persisted tokens, profile and device id
//! - `VerificationRegistry`: per-token verification bookkeeping
//! - `TokenVerifier` / `TokenRefresher`: the verify and refresh calls
//! - `SessionManager` / `PageSession`: the check-refresh-redirect flow for
//!   protected screens, with keep-alive
//! - `LoginGate`: username/password login with a client-side lockout
//! - `AccountService`: logout, logout everywhere, password change, sessions

pub mod account;
pub mod credentials;
pub mod login;
pub mod refresher;
pub mod registry;
pub mod session;
pub mod throttle;
pub mod verifier;

pub use account::{AccountError, AccountService};
pub use credentials::{generate_device_id, CredentialStore};
pub use login::{LoginError, LoginGate};
pub use refresher::{RefreshOutcome, TokenRefresher};
pub use registry::{VerificationRegistry, VerificationState};
pub use session::{AuthOutcome, Navigator, PageSession, SessionManager, SessionPhase, SessionPolicy};
pub use throttle::{LoginAttemptState, LoginThrottle};
pub use verifier::{InFlightPolicy, TokenVerifier};
