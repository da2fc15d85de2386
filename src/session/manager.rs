use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::refresh::RefreshTask;
use super::state::{Session, SessionStatus};
use crate::config::{ProviderConfig, SessionSettings};
use crate::error::Error;
use crate::provider::{IdentityProvider, InitOptions, ProviderFactory};
use crate::token::{self, Claims};

/// Owns the provider handle and the refresh task of one session.
///
/// Cloning is cheap and every clone drives the same session.
pub struct SessionManager<F: ProviderFactory> {
    shared: Arc<Shared<F>>,
}

// Manual Clone: avoid derive adding an `F: Clone` bound.
impl<F: ProviderFactory> Clone for SessionManager<F> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

pub(super) struct Shared<F: ProviderFactory> {
    factory: F,
    pub(super) settings: SessionSettings,
    pub(super) state: watch::Sender<Session>,
    pub(super) slot: Mutex<Slot<F::Provider>>,
    generation: AtomicU64,
    /// Serializes `update_token` calls on the provider handle.
    pub(super) refresh_lock: tokio::sync::Mutex<()>,
}

pub(super) struct Slot<P> {
    pub(super) handle: Option<Arc<P>>,
    config: Option<ProviderConfig>,
    refresh_task: Option<RefreshTask>,
}

impl<F: ProviderFactory> SessionManager<F> {
    /// Create an uninitialized session with default settings.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::with_settings(factory, SessionSettings::default())
    }

    #[must_use]
    pub fn with_settings(factory: F, settings: SessionSettings) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            shared: Arc::new(Shared {
                factory,
                settings,
                state,
                slot: Mutex::new(Slot {
                    handle: None,
                    config: None,
                    refresh_task: None,
                }),
                generation: AtomicU64::new(0),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Start a session cycle: build the provider handle and check for an
    /// existing session without an interactive redirect.
    ///
    /// Any previous cycle is torn down first, so at most one refresh task
    /// exists. Provider failures settle the session as
    /// [`Failed`](SessionStatus::Failed) and are not returned. If another
    /// `initialize` or [`teardown`](Self::teardown) supersedes this call
    /// while the provider is answering, the late answer is discarded and the
    /// status at that point is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid; the session
    /// is left [`Failed`](SessionStatus::Failed) without a provider handle.
    pub async fn initialize(&self, config: ProviderConfig) -> Result<SessionStatus, Error> {
        let shared = &self.shared;

        let (generation, provider) = {
            let mut slot = shared.slot.lock();
            let generation = shared.reset(&mut slot);

            if let Err(e) = config.validate() {
                tracing::error!(error = %e, "Invalid identity provider configuration");
                shared.state.send_replace(Session::failed(e.to_string()));
                return Err(e);
            }

            let provider = Arc::new(shared.factory.connect(&config));
            tracing::info!(
                url = %config.url(),
                realm = %config.realm(),
                client_id = %config.client_id(),
                generation,
                "Initializing session"
            );
            slot.handle = Some(provider.clone());
            slot.config = Some(config);
            shared.state.send_replace(Session::initializing());
            (generation, provider)
        };

        let outcome = shared
            .call("init", provider.init(InitOptions::check_sso()))
            .await;

        let mut slot = shared.slot.lock();
        if !shared.is_current(generation) {
            tracing::debug!(generation, "Discarding init result of a superseded session");
            return Ok(shared.state.borrow().status());
        }

        let session = match outcome {
            Ok(true) => match provider.token() {
                Some(token) => Session::authenticated(token),
                None => {
                    tracing::warn!("Provider restored a session without a token");
                    Session::unauthenticated(Some("provider returned no token".into()))
                }
            },
            Ok(false) => Session::unauthenticated(None),
            Err(e) => {
                tracing::error!(error = %e, "Session initialization failed");
                Session::failed(e.to_string())
            }
        };

        let status = session.status();
        if status == SessionStatus::Authenticated {
            slot.refresh_task = Some(RefreshTask::spawn(
                Arc::downgrade(shared),
                generation,
                shared.settings.refresh_interval,
            ));
        }
        shared.state.send_replace(session);
        tracing::info!(%status, generation, "Session initialized");

        Ok(status)
    }

    /// Cancel background refresh, release the provider handle and return to
    /// [`Uninitialized`](SessionStatus::Uninitialized). Safe to call any
    /// number of times, including while `initialize` is pending.
    pub fn teardown(&self) {
        let mut slot = self.shared.slot.lock();
        let had_handle = slot.handle.is_some();
        self.shared.reset(&mut slot);
        self.shared.state.send_if_modified(|session| {
            if *session == Session::default() {
                return false;
            }
            *session = Session::default();
            true
        });
        if had_handle {
            tracing::info!("Session torn down");
        }
    }

    /// Start the provider's login redirect. Fire-and-forget.
    pub fn login(&self) {
        self.dispatch("login", |provider| provider.login());
    }

    /// End the provider session. Fire-and-forget; the local status changes
    /// only through a later `initialize`.
    pub fn logout(&self) {
        self.dispatch("logout", |provider| provider.logout());
    }

    /// Start the provider's registration redirect. Fire-and-forget.
    pub fn register(&self) {
        self.dispatch("register", |provider| provider.register());
    }

    /// Refresh now if the token expires within `min_validity` seconds.
    ///
    /// Waits for any refresh already in flight. Resolves to `true` if the
    /// provider issued a new token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a provider handle, or the
    /// provider's refresh error.
    pub async fn force_refresh(&self, min_validity: u64) -> Result<bool, Error> {
        let (generation, provider) = self.current().ok_or(Error::Unauthenticated)?;
        let _guard = self.shared.refresh_lock.lock().await;
        self.shared
            .refresh_with(generation, &provider, min_validity)
            .await
    }

    /// Session token guaranteed valid for the request threshold, or `None`
    /// unless the session is authenticated.
    ///
    /// The provider handle survives an expired session so that `login` still
    /// works, but it never hands out credentials past that point.
    pub(crate) async fn fresh_token(&self) -> Result<Option<String>, Error> {
        let Some((generation, provider)) = self.current() else {
            return Ok(None);
        };
        if self.token().is_none() {
            return Ok(None);
        }

        let _guard = self.shared.refresh_lock.lock().await;
        self.shared
            .refresh_with(
                generation,
                &provider,
                self.shared.settings.request_min_validity,
            )
            .await?;

        // Torn down or reinitialized while the provider was refreshing.
        if !self.shared.is_current(generation) {
            return Ok(None);
        }
        Ok(self.token())
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.shared.state.borrow().status()
    }

    /// Clone of the current session state.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.shared.state.borrow().clone()
    }

    /// Watch every session transition, including the degraded flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.state.subscribe()
    }

    /// Raw token while authenticated.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.shared.state.borrow().raw_token().map(str::to_owned)
    }

    /// Claims decoded from the current token.
    #[must_use]
    pub fn claims(&self) -> Option<Claims> {
        self.token().as_deref().and_then(token::decode)
    }

    /// Realm roles of the current token; empty when unauthenticated.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        self.token().as_deref().map(token::roles).unwrap_or_default()
    }

    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.roles().contains(role)
    }

    /// `true` once initialized with a restored session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// `true` until the session check has settled.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.status().is_settled()
    }

    /// Configuration of the running cycle.
    #[must_use]
    pub fn config(&self) -> Option<ProviderConfig> {
        self.shared.slot.lock().config.clone()
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    fn current(&self) -> Option<(u64, Arc<F::Provider>)> {
        let slot = self.shared.slot.lock();
        let provider = slot.handle.clone()?;
        Some((self.shared.generation(), provider))
    }

    #[cfg(test)]
    pub(crate) fn has_refresh_task(&self) -> bool {
        self.shared.slot.lock().refresh_task.is_some()
    }

    fn dispatch(
        &self,
        operation: &'static str,
        action: impl FnOnce(&F::Provider) -> Result<(), Error>,
    ) {
        let Some((_, provider)) = self.current() else {
            tracing::warn!(operation, "No identity provider handle, ignoring action");
            return;
        };
        if let Err(e) = action(&provider) {
            tracing::warn!(operation, error = %e, "Identity provider action failed");
        }
    }
}

impl<F: ProviderFactory> Shared<F> {
    pub(super) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// End the running cycle. Caller holds the slot lock.
    fn reset(&self, slot: &mut Slot<F::Provider>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(task) = slot.refresh_task.take() {
            task.cancel();
        }
        slot.handle = None;
        slot.config = None;
        generation
    }

    /// Run a provider call under the configured timeout, if any.
    pub(super) async fn call<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match self.settings.provider_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| Error::Timeout { operation })?,
            None => request.await,
        }
    }

    /// Refresh through `provider` and publish the resulting token.
    /// Caller holds `refresh_lock`.
    pub(super) async fn refresh_with(
        &self,
        generation: u64,
        provider: &F::Provider,
        min_validity: u64,
    ) -> Result<bool, Error> {
        let refreshed = self
            .call("update_token", provider.update_token(min_validity))
            .await?;
        let token = provider.token();

        let _slot = self.slot.lock();
        if self.is_current(generation) {
            self.state.send_if_modified(|session| {
                let before = session.clone();
                session.refreshed(token);
                *session != before
            });
        }
        Ok(refreshed)
    }
}
