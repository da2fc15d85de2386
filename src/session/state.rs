use serde::Serialize;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No provider handle exists.
    #[default]
    Uninitialized,
    /// Waiting for the provider's session check.
    Initializing,
    /// A token is held and kept fresh in the background.
    Authenticated,
    /// The provider reported no session.
    Unauthenticated,
    /// The session check could not complete.
    ///
    /// Holds a provider handle, except after an invalid configuration where
    /// none could be built.
    Failed,
}

impl SessionStatus {
    /// `true` once the session check has finished, whatever its outcome.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Authenticated | Self::Unauthenticated | Self::Failed
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a session.
///
/// A token is present if and only if the status is
/// [`Authenticated`](SessionStatus::Authenticated).
///
/// Serializes without the token, for handing to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    status: SessionStatus,
    #[serde(skip)]
    raw_token: Option<String>,
    consecutive_failures: u32,
    degraded: bool,
    last_error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Raw access token; `Some` only while authenticated.
    #[must_use]
    pub fn raw_token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    /// Background refreshes that failed in a row since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// `true` while background refresh keeps failing; the held token may be stale.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Most recent initialization or refresh failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn initializing() -> Self {
        Self {
            status: SessionStatus::Initializing,
            ..Self::default()
        }
    }

    pub(crate) fn authenticated(token: String) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            raw_token: Some(token),
            ..Self::default()
        }
    }

    pub(crate) fn unauthenticated(reason: Option<String>) -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            last_error: reason,
            ..Self::default()
        }
    }

    pub(crate) fn failed(reason: String) -> Self {
        Self {
            status: SessionStatus::Failed,
            last_error: Some(reason),
            ..Self::default()
        }
    }

    /// Record a successful refresh. Ignored unless authenticated.
    pub(crate) fn refreshed(&mut self, token: Option<String>) {
        if self.status != SessionStatus::Authenticated {
            return;
        }
        if let Some(token) = token {
            self.raw_token = Some(token);
        }
        self.consecutive_failures = 0;
        self.degraded = false;
        self.last_error = None;
    }

    /// Record a failed background refresh; returns the new failure streak.
    pub(crate) fn refresh_failed(&mut self, reason: String, degraded_after: u32) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.degraded = self.consecutive_failures >= degraded_after;
        self.last_error = Some(reason);
        self.consecutive_failures
    }
}
