//! Route guarding for protected views.
//!
//! [`decide`] is a pure function of session state. [`AccessGate`] wraps it
//! for a single guarded view and performs the login redirect at most once
//! per entry into an unauthenticated state, however often it is re-evaluated.

use crate::provider::ProviderFactory;
use crate::session::{SessionManager, SessionStatus};

/// What a guarded view should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateDecision {
    /// Session check pending; show a placeholder, not the guarded content.
    Loading,
    /// Not authenticated; show the caller's fallback.
    Fallback,
    /// Not authenticated and no fallback; a login redirect is due.
    Redirect,
    /// Authenticated; show the guarded content.
    Content,
}

impl GateDecision {
    /// Interim text for decisions that render neither content nor fallback.
    #[must_use]
    pub fn placeholder(self) -> Option<&'static str> {
        match self {
            Self::Loading => Some("Loading..."),
            Self::Redirect => Some("Redirecting to login..."),
            Self::Fallback | Self::Content => None,
        }
    }
}

/// Decide what a guarded view shows for `status`.
#[must_use]
pub fn decide(status: SessionStatus, has_fallback: bool) -> GateDecision {
    match status {
        SessionStatus::Uninitialized | SessionStatus::Initializing => GateDecision::Loading,
        SessionStatus::Unauthenticated | SessionStatus::Failed if has_fallback => {
            GateDecision::Fallback
        }
        SessionStatus::Unauthenticated | SessionStatus::Failed => GateDecision::Redirect,
        SessionStatus::Authenticated => GateDecision::Content,
    }
}

/// Edge-triggered executor of [`GateDecision::Redirect`].
///
/// Keep one per guarded view for as long as the view lives.
#[derive(Debug, Default)]
pub struct AccessGate {
    redirected: bool,
}

impl AccessGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide for `status` and run `login` if this is the first redirect
    /// since the session last left the unauthenticated states.
    pub fn evaluate(
        &mut self,
        status: SessionStatus,
        has_fallback: bool,
        login: impl FnOnce(),
    ) -> GateDecision {
        if !matches!(
            status,
            SessionStatus::Unauthenticated | SessionStatus::Failed
        ) {
            self.redirected = false;
        }

        let decision = decide(status, has_fallback);
        if decision == GateDecision::Redirect && !self.redirected {
            self.redirected = true;
            tracing::info!(%status, "Redirecting to login");
            login();
        }
        decision
    }

    /// [`evaluate`](Self::evaluate) against a live session, redirecting via
    /// [`SessionManager::login`].
    pub fn guard<F: ProviderFactory>(
        &mut self,
        session: &SessionManager<F>,
        has_fallback: bool,
    ) -> GateDecision {
        self.evaluate(session.status(), has_fallback, || session.login())
    }
}
