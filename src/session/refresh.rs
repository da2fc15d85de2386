use std::ops::ControlFlow;
use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::manager::Shared;
use super::state::Session;
use crate::error::Error;
use crate::provider::ProviderFactory;
use crate::token;

/// Recurring background refresh bound to one session generation.
///
/// Aborted on [`cancel`](RefreshTask::cancel) or drop.
pub(super) struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub(super) fn spawn<F: ProviderFactory>(
        shared: Weak<Shared<F>>,
        generation: u64,
        period: Duration,
    ) -> Self {
        // tokio intervals reject a zero period.
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if shared.refresh_tick(generation).await.is_break() {
                    break;
                }
            }
            tracing::debug!(generation, "Refresh task stopped");
        });

        Self { handle }
    }

    pub(super) fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<F: ProviderFactory> Shared<F> {
    /// One background refresh. Breaks when the task should stop.
    async fn refresh_tick(&self, generation: u64) -> ControlFlow<()> {
        if !self.is_current(generation) {
            return ControlFlow::Break(());
        }

        // A refresh already in flight guarantees the same validity; skip.
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            tracing::debug!(generation, "Refresh in flight, skipping tick");
            return ControlFlow::Continue(());
        };

        let handle = self.slot.lock().handle.clone();
        let Some(provider) = handle else {
            return ControlFlow::Break(());
        };

        match self
            .refresh_with(generation, &provider, self.settings.background_min_validity)
            .await
        {
            Ok(refreshed) => {
                tracing::debug!(generation, refreshed, "Background token refresh");
                ControlFlow::Continue(())
            }
            Err(e) => self.refresh_failed(generation, &e),
        }
    }

    fn refresh_failed(&self, generation: u64, error: &Error) -> ControlFlow<()> {
        let _slot = self.slot.lock();
        if !self.is_current(generation) {
            return ControlFlow::Break(());
        }

        let degraded_after = self.settings.degraded_after_failures;
        let mut failures = 0;
        let mut degraded = false;
        let mut expired = false;
        self.state.send_modify(|session| {
            let was_degraded = session.is_degraded();
            failures = session.refresh_failed(error.to_string(), degraded_after);
            degraded = session.is_degraded() && !was_degraded;
            expired = session.raw_token().is_none_or(token::is_expired);
        });

        tracing::warn!(generation, failures, error = %error, "Background token refresh failed");
        if degraded {
            tracing::warn!(generation, failures, "Session degraded, token may be stale");
        }

        match self.settings.expire_after_failures {
            Some(limit) if failures >= limit && expired => {
                tracing::info!(
                    generation,
                    failures,
                    "Token expired after repeated refresh failures, ending session"
                );
                self.state.send_replace(Session::unauthenticated(Some(format!(
                    "token expired after {failures} failed refreshes: {error}"
                ))));
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        }
    }
}
