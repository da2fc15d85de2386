use crate::error::Error;
use crate::provider::ProviderFactory;
use crate::session::SessionManager;

#[cfg(feature = "http")]
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
#[cfg(feature = "http")]
use reqwest::{IntoUrl, Method, Request, Response};

/// Hands out bearer credentials that are fresh enough to use right away.
///
/// Every call first asks the provider to guarantee the request validity
/// threshold (30s by default), which may cost a token endpoint round-trip.
pub struct CredentialSupplier<F: ProviderFactory> {
    session: SessionManager<F>,
    #[cfg(feature = "http")]
    http: reqwest::Client,
}

impl<F: ProviderFactory> CredentialSupplier<F> {
    #[must_use]
    pub fn new(session: SessionManager<F>) -> Self {
        Self {
            session,
            #[cfg(feature = "http")]
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[cfg(feature = "http")]
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// `Bearer <token>` after a refresh check, or `None` when there is no
    /// session to draw a credential from.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the refresh check fails.
    pub async fn authorization_header(&self) -> Result<Option<String>, Error> {
        let token = self.session.fresh_token().await?;
        Ok(token.map(|token| format!("Bearer {token}")))
    }

    /// Send a request carrying the session's bearer credential.
    ///
    /// Only the `Authorization` header is set; every other caller header is
    /// sent as given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] before any network call when there
    /// is no session, the provider's error if the refresh check fails, or
    /// [`Error::Http`] if the request cannot be built or sent.
    #[cfg(feature = "http")]
    pub async fn fetch_with_credential(
        &self,
        url: impl IntoUrl,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let credential = self.require_credential().await?;

        let mut builder = self
            .http
            .request(options.method, url)
            .headers(options.headers);
        if let Some(body) = options.body {
            builder = builder.body(body);
        }
        let mut request = builder.build()?;
        request.headers_mut().insert(AUTHORIZATION, credential);

        self.http.execute(request).await.map_err(Into::into)
    }

    /// Like [`fetch_with_credential`](Self::fetch_with_credential) for a
    /// request built elsewhere.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_with_credential`](Self::fetch_with_credential).
    #[cfg(feature = "http")]
    pub async fn execute(&self, mut request: Request) -> Result<Response, Error> {
        let credential = self.require_credential().await?;
        request.headers_mut().insert(AUTHORIZATION, credential);
        self.http.execute(request).await.map_err(Into::into)
    }

    #[cfg(feature = "http")]
    async fn require_credential(&self) -> Result<HeaderValue, Error> {
        let header = self
            .authorization_header()
            .await?
            .ok_or(Error::Unauthenticated)?;
        let mut value = HeaderValue::try_from(header)
            .map_err(|_| Error::provider("token", "token is not a valid header value"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Method, headers and body for [`CredentialSupplier::fetch_with_credential`].
#[cfg(feature = "http")]
#[derive(Debug, Default)]
pub struct RequestOptions {
    method: Method,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

#[cfg(feature = "http")]
impl RequestOptions {
    /// `GET` with no headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}
