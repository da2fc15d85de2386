use std::future::Future;

use crate::config::ProviderConfig;
use crate::error::Error;

/// What the provider should do when a session is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OnLoad {
    /// Restore an existing provider session without forcing a login redirect.
    CheckSso,
    /// Redirect to the login page when no session exists.
    LoginRequired,
}

/// Options passed to [`IdentityProvider::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct InitOptions {
    pub on_load: OnLoad,
    /// Poll the provider for session changes in the background.
    pub check_login_iframe: bool,
}

impl InitOptions {
    /// Non-interactive session check, no background polling.
    #[must_use]
    pub fn check_sso() -> Self {
        Self {
            on_load: OnLoad::CheckSso,
            check_login_iframe: false,
        }
    }
}

/// Client for the external identity provider.
///
/// Implementations own redirects, token issuance and refresh. The session
/// manager never calls [`update_token`](IdentityProvider::update_token)
/// concurrently on one instance.
///
/// # Example
///
/// ```rust,ignore
/// impl IdentityProvider for KeycloakJs {
///     async fn init(&self, options: InitOptions) -> Result<bool, Error> {
///         self.bridge.init(options).await.map_err(|e| Error::provider("init", e.to_string()))
///     }
///
///     async fn update_token(&self, min_validity: u64) -> Result<bool, Error> {
///         self.bridge.update_token(min_validity).await
///             .map_err(|e| Error::provider("update_token", e.to_string()))
///     }
///
///     fn login(&self) -> Result<(), Error> { self.bridge.login() }
///     fn logout(&self) -> Result<(), Error> { self.bridge.logout() }
///     fn register(&self) -> Result<(), Error> { self.bridge.register() }
///     fn token(&self) -> Option<String> { self.bridge.token() }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Check for an existing session. Resolves to `true` if one was restored.
    fn init(&self, options: InitOptions) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Refresh the token if it expires within `min_validity` seconds.
    ///
    /// Resolves to `true` if a new token was issued.
    fn update_token(&self, min_validity: u64) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Start an interactive login redirect.
    fn login(&self) -> Result<(), Error>;

    /// End the provider session.
    fn logout(&self) -> Result<(), Error>;

    /// Start the account registration redirect.
    fn register(&self) -> Result<(), Error>;

    /// Current access token, if the provider holds one.
    fn token(&self) -> Option<String>;
}

/// Builds an [`IdentityProvider`] for a configuration.
///
/// Construction performs no I/O; talking to the provider starts with
/// [`IdentityProvider::init`]. Any `Fn(&ProviderConfig) -> P` is a factory.
pub trait ProviderFactory: Send + Sync + 'static {
    type Provider: IdentityProvider;

    fn connect(&self, config: &ProviderConfig) -> Self::Provider;
}

impl<F, P> ProviderFactory for F
where
    F: Fn(&ProviderConfig) -> P + Send + Sync + 'static,
    P: IdentityProvider,
{
    type Provider = P;

    fn connect(&self, config: &ProviderConfig) -> P {
        self(config)
    }
}
