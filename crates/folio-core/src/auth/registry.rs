//! Per-token verification bookkeeping (`SessionVerificationState`).
//!
//! The registry remembers, for each access token, when it was last verified
//! successfully and whether a verification is currently running. It is an
//! explicit service instance shared through `Arc`, never a global, so tests
//! and separate sessions do not see each other's state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinHandle;
use tracing::debug;

/// A verification already recorded within this window is reused without a
/// network call.
const FRESH_VERIFICATION_MINUTES: i64 = 5;

/// Entries untouched for this long are dropped by `sweep`.
const ENTRY_TTL_MINUTES: i64 = 60;

/// A verification call other callers can await.
pub type PendingVerification = Shared<BoxFuture<'static, bool>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationState {
    pub last_verified_at: Option<DateTime<Utc>>,
    pub is_verifying: bool,
    /// Last time anything happened to this entry (drives the TTL sweep)
    pub touched_at: DateTime<Utc>,
}

impl VerificationState {
    fn new() -> Self {
        Self {
            last_verified_at: None,
            is_verifying: false,
            touched_at: Utc::now(),
        }
    }

    pub fn verified_within(&self, window: Duration) -> bool {
        self.last_verified_at
            .map(|at| Utc::now() - at < window)
            .unwrap_or(false)
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.touched_at).num_minutes()
    }
}

struct Entry {
    state: VerificationState,
    pending: Option<PendingVerification>,
}

/// Result of trying to start a verification for a token.
pub(crate) enum Claim {
    /// Verified recently, no call needed
    Fresh,
    /// Someone else is verifying this token right now
    InFlight(Option<PendingVerification>),
    /// Caller now owns the verification and must `finish` or `abandon` it
    Claimed,
}

pub struct VerificationRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    fresh_for: Duration,
    ttl: Duration,
}

impl Default for VerificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationRegistry {
    pub fn new() -> Self {
        Self::with_windows(
            Duration::minutes(FRESH_VERIFICATION_MINUTES),
            Duration::minutes(ENTRY_TTL_MINUTES),
        )
    }

    pub fn with_windows(fresh_for: Duration, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fresh_for,
            ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check freshness and in-flight status, claiming the token if neither.
    pub(crate) fn claim(&self, token: &str, pending: PendingVerification) -> Claim {
        let mut entries = self.entries();
        let entry = entries.entry(token.to_string()).or_insert_with(|| Entry {
            state: VerificationState::new(),
            pending: None,
        });
        if entry.state.verified_within(self.fresh_for) {
            return Claim::Fresh;
        }
        if entry.state.is_verifying {
            return Claim::InFlight(entry.pending.clone());
        }
        entry.state.is_verifying = true;
        entry.state.touched_at = Utc::now();
        entry.pending = Some(pending);
        Claim::Claimed
    }

    /// Record the outcome of a claimed verification.
    pub(crate) fn finish(&self, token: &str, verified: bool) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(token) {
            let now = Utc::now();
            entry.state.is_verifying = false;
            entry.state.touched_at = now;
            entry.state.last_verified_at = if verified { Some(now) } else { None };
            entry.pending = None;
        }
    }

    /// Release a claim whose verification never completed.
    pub(crate) fn abandon(&self, token: &str) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(token) {
            if entry.state.is_verifying {
                entry.state.is_verifying = false;
                entry.pending = None;
            }
        }
    }

    /// Mark a token as verified right now (e.g. freshly issued by a refresh).
    pub fn mark_verified(&self, token: &str) {
        let now = Utc::now();
        let mut entries = self.entries();
        let entry = entries.entry(token.to_string()).or_insert_with(|| Entry {
            state: VerificationState::new(),
            pending: None,
        });
        entry.state.last_verified_at = Some(now);
        entry.state.touched_at = now;
    }

    /// Drop what is known about a token so the next verification hits the network.
    /// An in-flight verification keeps its entry and only loses its verified mark.
    pub fn forget(&self, token: &str) {
        let mut entries = self.entries();
        let in_flight = match entries.get_mut(token) {
            Some(entry) if entry.state.is_verifying => {
                entry.state.last_verified_at = None;
                true
            }
            _ => false,
        };
        if !in_flight {
            entries.remove(token);
        }
    }

    pub fn state(&self, token: &str) -> Option<VerificationState> {
        self.entries().get(token).map(|e| e.state.clone())
    }

    pub fn is_recently_verified(&self, token: &str) -> bool {
        self.entries()
            .get(token)
            .map(|e| e.state.verified_within(self.fresh_for))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove entries untouched for longer than the TTL. In-flight entries are kept.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let ttl = self.ttl;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| e.state.is_verifying || now - e.state.touched_at <= ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept stale verification entries");
        }
        removed
    }

    /// Run `sweep` periodically until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(registry) => {
                        registry.sweep();
                    }
                    None => break,
                }
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, token: &str, by: Duration) {
        if let Some(entry) = self.entries().get_mut(token) {
            entry.state.touched_at -= by;
            if let Some(ref mut at) = entry.state.last_verified_at {
                *at -= by;
            }
        }
    }
}
