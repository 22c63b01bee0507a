use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};

use super::registry::{Claim, VerificationRegistry};

/// What to do when a verification for the same token is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Report the token as valid immediately. No duplicate request and no
    /// waiting, but a token that turns out invalid is briefly treated as good.
    #[default]
    Optimistic,
    /// Wait for the running call and share its result.
    Await,
}

/// Asks the content API whether an access token is still valid.
#[derive(Clone)]
pub struct TokenVerifier {
    api: ApiClient,
    registry: Arc<VerificationRegistry>,
    policy: InFlightPolicy,
}

/// Releases a claimed token if the verifying future is dropped early.
struct ClaimGuard<'a> {
    registry: &'a VerificationRegistry,
    token: &'a str,
    armed: bool,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.abandon(self.token);
        }
    }
}

impl TokenVerifier {
    pub fn new(api: ApiClient, registry: Arc<VerificationRegistry>, policy: InFlightPolicy) -> Self {
        Self {
            api,
            registry,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<VerificationRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> InFlightPolicy {
        self.policy
    }

    /// `true` only when the API accepted the token (or it was accepted within
    /// the last few minutes). Every failure is reported as `false`.
    pub async fn verify(&self, access_token: &str, device_id: &str) -> bool {
        self.run(access_token, device_id, self.policy).await
    }

    /// Verify over the network even if the token was verified recently.
    /// A verification already in flight is awaited whatever the policy.
    pub async fn verify_fresh(&self, access_token: &str, device_id: &str) -> bool {
        self.registry.forget(access_token);
        self.run(access_token, device_id, InFlightPolicy::Await).await
    }

    async fn run(&self, access_token: &str, device_id: &str, policy: InFlightPolicy) -> bool {
        let call = Self::call(
            self.api.clone(),
            self.registry.clone(),
            access_token.to_string(),
            device_id.to_string(),
        )
        .boxed()
        .shared();

        match self.registry.claim(access_token, call.clone()) {
            Claim::Fresh => {
                debug!("Token verified recently, skipping network call");
                true
            }
            Claim::InFlight(pending) => match (policy, pending) {
                (InFlightPolicy::Await, Some(pending)) => {
                    debug!("Waiting for in-flight verification");
                    pending.await
                }
                _ => {
                    debug!("Verification already in flight, assuming valid");
                    true
                }
            },
            Claim::Claimed => {
                let mut guard = ClaimGuard {
                    registry: &self.registry,
                    token: access_token,
                    armed: true,
                };
                let verified = call.await;
                guard.armed = false;
                verified
            }
        }
    }

    async fn call(
        api: ApiClient,
        registry: Arc<VerificationRegistry>,
        token: String,
        device_id: String,
    ) -> bool {
        let verified = match api.verify_token(&token, &device_id).await {
            Ok(()) => {
                debug!("Access token accepted");
                true
            }
            Err(ApiError::NetworkError(e)) => {
                warn!(error = %e, "Token verification request failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "Access token rejected");
                false
            }
        };
        registry.finish(&token, verified);
        verified
    }
}
