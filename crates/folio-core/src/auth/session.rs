//! Session lifecycle for protected screens.
//!
//! A `SessionManager` is shared by everything that needs an authenticated
//! admin. Each protected screen (a CLI command, a long-running `watch`)
//! mounts a `PageSession`, which runs the check-verify-refresh-redirect
//! sequence, guards against overlapping checks and optionally keeps the
//! session alive on a timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::Credentials;

use super::credentials::CredentialStore;
use super::refresher::{RefreshOutcome, TokenRefresher};
use super::verifier::TokenVerifier;

// ============================================================================
// Constants
// ============================================================================

/// How often a mounted session wakes up to check its age.
const KEEP_ALIVE_INTERVAL_SECS: u64 = 30 * 60;

/// A session last verified longer ago than this is re-verified on the next tick.
const REVERIFY_AFTER_MINUTES: i64 = 25;

/// Pause before the forced logout that follows logout-all or a password change.
const FORCED_LOGOUT_DELAY_SECS: u64 = 2;

// ============================================================================
// Types
// ============================================================================

/// Where the session layer sends the user.
pub trait Navigator: Send + Sync {
    fn to_login(&self);
    fn to_dashboard(&self);
}

/// Timing knobs for mounted sessions and forced logouts.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub keep_alive_every: std::time::Duration,
    pub reverify_after: chrono::Duration,
    pub forced_logout_delay: std::time::Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            keep_alive_every: std::time::Duration::from_secs(KEEP_ALIVE_INTERVAL_SECS),
            reverify_after: chrono::Duration::minutes(REVERIFY_AFTER_MINUTES),
            forced_logout_delay: std::time::Duration::from_secs(FORCED_LOGOUT_DELAY_SECS),
        }
    }
}

/// Observable state of a mounted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    NoToken,
    CheckingAuth,
    Refreshing,
    Authenticated,
    Redirecting,
}

impl SessionPhase {
    /// Whether a loading indicator should be shown.
    pub fn is_loading(self) -> bool {
        matches!(self, SessionPhase::CheckingAuth | SessionPhase::Refreshing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Credentials),
    /// The user was sent to the login screen. Terminal for the mount.
    Redirect,
    /// Another check is already running on this mount.
    InProgress,
    /// The mount went away while the check was waiting on the network.
    Cancelled,
}

// ============================================================================
// Session manager
// ============================================================================

pub struct SessionManager {
    store: CredentialStore,
    verifier: TokenVerifier,
    refresher: TokenRefresher,
    navigator: Arc<dyn Navigator>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        store: CredentialStore,
        verifier: TokenVerifier,
        refresher: TokenRefresher,
        navigator: Arc<dyn Navigator>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            verifier,
            refresher,
            navigator,
            policy,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Start a protected screen.
    pub fn mount(self: &Arc<Self>) -> PageSession {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let (shutdown, _) = watch::channel(false);
        PageSession {
            state: Arc::new(PageState {
                manager: Arc::clone(self),
                mounted: AtomicBool::new(true),
                in_flight: AtomicBool::new(false),
                verified: AtomicBool::new(false),
                redirected: AtomicBool::new(false),
                last_verified: Mutex::new(None),
                phase,
            }),
            shutdown,
            keep_alive: Mutex::new(None),
        }
    }

    /// Mount, check once and unmount. For commands that need a session for
    /// a single request.
    pub async fn ensure_authenticated(self: &Arc<Self>) -> AuthOutcome {
        let page = self.mount();
        let outcome = page.ensure_authenticated().await;
        page.unmount();
        outcome
    }
}

// ============================================================================
// Page session
// ============================================================================

struct PageState {
    manager: Arc<SessionManager>,
    mounted: AtomicBool,
    in_flight: AtomicBool,
    verified: AtomicBool,
    redirected: AtomicBool,
    last_verified: Mutex<Option<DateTime<Utc>>>,
    phase: watch::Sender<SessionPhase>,
}

/// Held while a check runs on a mount.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PageState {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    fn last_verified(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_verified
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_stale(&self, after: chrono::Duration) -> bool {
        match *self.last_verified() {
            Some(at) => Utc::now() - at > after,
            None => true,
        }
    }

    async fn check(&self, force: bool) -> AuthOutcome {
        if !self.is_mounted() {
            return AuthOutcome::Cancelled;
        }
        if self.redirected.load(Ordering::Acquire) {
            return AuthOutcome::Redirect;
        }

        let manager = &self.manager;
        let mut credentials = match manager.store.load() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                debug!("No stored access token");
                self.set_phase(SessionPhase::NoToken);
                return self.send_to_login();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                self.set_phase(SessionPhase::NoToken);
                return self.send_to_login();
            }
        };

        if !force && self.verified.load(Ordering::Acquire) {
            return AuthOutcome::Authenticated(credentials);
        }

        let _guard = match InFlightGuard::acquire(&self.in_flight) {
            Some(guard) => guard,
            None => {
                debug!("Session check already running");
                return AuthOutcome::InProgress;
            }
        };

        self.set_phase(SessionPhase::CheckingAuth);
        let verified = if force {
            manager
                .verifier
                .verify_fresh(&credentials.access_token, &credentials.device_id)
                .await
        } else {
            manager
                .verifier
                .verify(&credentials.access_token, &credentials.device_id)
                .await
        };
        if !self.is_mounted() {
            debug!("Session unmounted during verification, discarding result");
            return AuthOutcome::Cancelled;
        }
        if verified {
            return self.authenticated(credentials);
        }

        self.set_phase(SessionPhase::Refreshing);
        let refresh_token = match credentials.refresh_token {
            Some(ref token) => token.clone(),
            None => {
                info!("Access token rejected and no refresh token stored");
                return self.clear_and_redirect();
            }
        };

        let refreshed = manager.refresher.try_refresh(&refresh_token).await;
        if !self.is_mounted() {
            debug!("Session unmounted during refresh, discarding result");
            return AuthOutcome::Cancelled;
        }

        match refreshed {
            RefreshOutcome::Refreshed(access) => {
                if let Err(e) = manager.store.save_access_token(&access) {
                    warn!(error = %e, "Failed to store refreshed access token");
                    return self.clear_and_redirect();
                }
                info!("Session restored with refreshed access token");
                credentials.access_token = access;
                self.authenticated(credentials)
            }
            RefreshOutcome::Rejected => {
                info!("Session could not be refreshed");
                self.clear_and_redirect()
            }
            RefreshOutcome::Unavailable => {
                // Credentials may still be good once the server is back
                warn!("Session could not be checked, keeping stored credentials");
                self.set_phase(SessionPhase::Redirecting);
                self.send_to_login()
            }
        }
    }

    fn authenticated(&self, credentials: Credentials) -> AuthOutcome {
        *self.last_verified() = Some(Utc::now());
        self.verified.store(true, Ordering::Release);
        self.set_phase(SessionPhase::Authenticated);
        AuthOutcome::Authenticated(credentials)
    }

    fn clear_and_redirect(&self) -> AuthOutcome {
        if let Err(e) = self.manager.store.clear() {
            warn!(error = %e, "Failed to clear credentials");
        }
        self.set_phase(SessionPhase::Redirecting);
        self.send_to_login()
    }

    /// Navigate to login at most once per mount.
    fn send_to_login(&self) -> AuthOutcome {
        self.verified.store(false, Ordering::Release);
        if !self.redirected.swap(true, Ordering::AcqRel) {
            self.manager.navigator.to_login();
        }
        AuthOutcome::Redirect
    }
}

/// One mounted protected screen. Dropping it unmounts.
pub struct PageSession {
    state: Arc<PageState>,
    shutdown: watch::Sender<bool>,
    keep_alive: Mutex<Option<JoinHandle<()>>>,
}

impl PageSession {
    /// Make sure the user is signed in, refreshing or redirecting as needed.
    pub async fn ensure_authenticated(&self) -> AuthOutcome {
        self.state.check(false).await
    }

    pub fn phase(&self) -> SessionPhase {
        *self.state.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.state.phase.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.verified.load(Ordering::Acquire)
    }

    pub fn is_mounted(&self) -> bool {
        self.state.is_mounted()
    }

    pub fn last_verified_at(&self) -> Option<DateTime<Utc>> {
        *self.state.last_verified()
    }

    /// Re-verify periodically while mounted. Calling it again is a no-op.
    pub fn start_keep_alive(&self) {
        let mut slot = self
            .keep_alive
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() || !self.is_mounted() {
            return;
        }

        let weak: Weak<PageState> = Arc::downgrade(&self.state);
        let mut shutdown = self.shutdown.subscribe();
        let policy = self.state.manager.policy.clone();
        let every = policy.keep_alive_every;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                let state = match weak.upgrade() {
                    Some(state) if state.is_mounted() => state,
                    _ => break,
                };
                if !state.is_stale(policy.reverify_after) {
                    continue;
                }
                debug!("Session verification is stale, re-verifying");
                state.verified.store(false, Ordering::Release);
                match state.check(true).await {
                    AuthOutcome::Redirect | AuthOutcome::Cancelled => break,
                    AuthOutcome::Authenticated(_) | AuthOutcome::InProgress => {}
                }
            }
            debug!("Keep-alive stopped");
        }));
    }

    /// Tear down the mount. A check that is already running finishes but its
    /// result is discarded.
    pub fn unmount(&self) {
        if self.state.mounted.swap(false, Ordering::AcqRel) {
            self.shutdown.send_replace(true);
            debug!("Session unmounted");
        }
    }

    #[cfg(test)]
    fn backdate_last_verified(&self, by: chrono::Duration) {
        let mut last = self.state.last_verified();
        if let Some(at) = last.as_mut() {
            *at -= by;
        }
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.unmount();
    }
}
