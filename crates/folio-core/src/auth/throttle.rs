use chrono::{DateTime, Duration, Utc};

/// Failed attempts before the login form locks.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long the login form stays locked.
pub const LOCKOUT_SECONDS: i64 = 60;

/// Failed-login bookkeeping for one login gate. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginAttemptState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Lockout policy applied to login submissions.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    state: LoginAttemptState,
    max_attempts: u32,
    lockout: Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(MAX_FAILED_ATTEMPTS, Duration::seconds(LOCKOUT_SECONDS))
    }
}

impl LoginThrottle {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            state: LoginAttemptState::default(),
            max_attempts,
            lockout,
        }
    }

    pub fn state(&self) -> &LoginAttemptState {
        &self.state
    }

    pub fn lockout_seconds(&self) -> i64 {
        self.lockout.num_seconds()
    }

    /// Whole seconds left on the lock (rounded up), or `None` if not locked.
    pub fn remaining_lock(&self) -> Option<i64> {
        let until = self.state.locked_until?;
        let remaining = until - Utc::now();
        if remaining <= Duration::zero() {
            return None;
        }
        let millis = remaining.num_milliseconds();
        Some((millis + 999) / 1000)
    }

    /// Count a failed attempt. Returns the lock length in seconds when this
    /// failure locks the form.
    ///
    /// The counter is not reset when a lock runs out, so any failure past
    /// the limit locks again straight away.
    pub fn record_failure(&mut self) -> Option<i64> {
        self.state.failed_attempts += 1;
        if self.state.failed_attempts >= self.max_attempts {
            self.state.locked_until = Some(Utc::now() + self.lockout);
            Some(self.lockout.num_seconds())
        } else {
            None
        }
    }

    pub fn record_success(&mut self) {
        self.state = LoginAttemptState::default();
    }

    #[cfg(test)]
    pub(crate) fn expire_lock(&mut self) {
        if let Some(ref mut until) = self.state.locked_until {
            *until = Utc::now() - Duration::seconds(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locks_on_fifth_failure() {
        let mut throttle = LoginThrottle::default();
        for _ in 0..4 {
            assert_eq!(throttle.record_failure(), None);
            assert!(throttle.remaining_lock().is_none());
        }
        assert_eq!(throttle.record_failure(), Some(60));
        let remaining = throttle.remaining_lock().unwrap();
        assert!(remaining > 55 && remaining <= 60);
    }

    #[test]
    fn test_success_resets() {
        let mut throttle = LoginThrottle::default();
        for _ in 0..5 {
            throttle.record_failure();
        }
        throttle.record_success();
        assert_eq!(throttle.state(), &LoginAttemptState::default());
        assert!(throttle.remaining_lock().is_none());
    }

    #[test]
    fn test_failure_after_expired_lock_relocks() {
        let mut throttle = LoginThrottle::default();
        for _ in 0..5 {
            throttle.record_failure();
        }
        throttle.expire_lock();
        assert!(throttle.remaining_lock().is_none());
        assert_eq!(throttle.record_failure(), Some(60));
        assert_eq!(throttle.state().failed_attempts, 6);
    }
}
