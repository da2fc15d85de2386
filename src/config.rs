use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Identity provider connection parameters.
///
/// ```rust,ignore
/// use sso_session::ProviderConfig;
///
/// let config = ProviderConfig::new("https://sso.example.com", "acme", "web-portal");
/// config.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderConfig {
    url: String,
    realm: String,
    client_id: String,
}

impl ProviderConfig {
    /// Create a provider configuration.
    ///
    /// Fields are checked by [`validate`](ProviderConfig::validate), which
    /// [`SessionManager::initialize`](crate::SessionManager::initialize) runs.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `SSO_URL`: identity provider base URL
    /// - `SSO_REALM`: realm (tenant) name
    /// - `SSO_CLIENT_ID`: registered client identifier
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is missing or the result fails
    /// [`validate`](ProviderConfig::validate).
    pub fn from_env() -> Result<Self, Error> {
        let url = std::env::var("SSO_URL")
            .map_err(|_| Error::Config("SSO_URL is required".into()))?;
        let realm = std::env::var("SSO_REALM")
            .map_err(|_| Error::Config("SSO_REALM is required".into()))?;
        let client_id = std::env::var("SSO_CLIENT_ID")
            .map_err(|_| Error::Config("SSO_CLIENT_ID is required".into()))?;

        let config = Self::new(url, realm, client_id);
        config.validate()?;
        Ok(config)
    }

    /// Reject empty fields and an unparseable provider URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("url is required".into()));
        }
        if self.realm.trim().is_empty() {
            return Err(Error::Config("realm is required".into()));
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client_id is required".into()));
        }
        self.url
            .parse::<Url>()
            .map_err(|e| Error::Config(format!("url: {e}")))?;
        Ok(())
    }

    /// Identity provider base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Realm (tenant) identifier.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Registered client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Timing and failure-policy knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub(crate) refresh_interval: Duration,
    pub(crate) background_min_validity: u64,
    pub(crate) request_min_validity: u64,
    pub(crate) degraded_after_failures: u32,
    pub(crate) expire_after_failures: Option<u32>,
    pub(crate) provider_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            background_min_validity: 70,
            request_min_validity: 30,
            degraded_after_failures: 3,
            expire_after_failures: Some(5),
            provider_timeout: None,
        }
    }
}

impl SessionSettings {
    /// Defaults overridden by environment variables.
    ///
    /// # Optional env vars
    /// - `SSO_REFRESH_INTERVAL_SECS`: background refresh period
    /// - `SSO_MIN_VALIDITY_SECS`: validity guaranteed by background refresh
    /// - `SSO_REQUEST_MIN_VALIDITY_SECS`: validity guaranteed before a request
    /// - `SSO_PROVIDER_TIMEOUT_SECS`: timeout on every provider call
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but not a number.
    pub fn from_env() -> Result<Self, Error> {
        let mut settings = Self::default();

        if let Some(secs) = env_secs("SSO_REFRESH_INTERVAL_SECS")? {
            settings = settings.with_refresh_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = env_secs("SSO_MIN_VALIDITY_SECS")? {
            settings = settings.with_background_min_validity(secs);
        }
        if let Some(secs) = env_secs("SSO_REQUEST_MIN_VALIDITY_SECS")? {
            settings = settings.with_request_min_validity(secs);
        }
        if let Some(secs) = env_secs("SSO_PROVIDER_TIMEOUT_SECS")? {
            settings = settings.with_provider_timeout(Some(Duration::from_secs(secs)));
        }

        Ok(settings)
    }

    /// Period of the background refresh task (default: 60s).
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Seconds of validity each background refresh guarantees (default: 70).
    #[must_use]
    pub fn with_background_min_validity(mut self, secs: u64) -> Self {
        self.background_min_validity = secs;
        self
    }

    /// Seconds of validity guaranteed before a credential is handed out (default: 30).
    #[must_use]
    pub fn with_request_min_validity(mut self, secs: u64) -> Self {
        self.request_min_validity = secs;
        self
    }

    /// Consecutive background failures before the session reports degraded (default: 3).
    #[must_use]
    pub fn with_degraded_after_failures(mut self, failures: u32) -> Self {
        self.degraded_after_failures = failures;
        self
    }

    /// Consecutive background failures after which an expired token ends the
    /// session (default: 5). `None` keeps the session authenticated forever.
    #[must_use]
    pub fn with_expire_after_failures(mut self, failures: Option<u32>) -> Self {
        self.expire_after_failures = failures;
        self
    }

    /// Upper bound on every identity provider call (default: none).
    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.provider_timeout = timeout;
        self
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    #[must_use]
    pub fn background_min_validity(&self) -> u64 {
        self.background_min_validity
    }

    #[must_use]
    pub fn request_min_validity(&self) -> u64 {
        self.request_min_validity
    }
}

fn env_secs(key: &str) -> Result<Option<u64>, Error> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}
