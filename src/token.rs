//! Inspection of compact `header.payload.signature` access tokens.
//!
//! Nothing here verifies signatures: the identity provider is trusted to hand
//! out well-formed tokens, and these helpers only read the payload segment.
//! Every function re-decodes its input; callers must not assume caching.

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value as JsonValue;

/// Claims decoded from a token payload.
///
/// Always backed by a JSON object. Standard OIDC fields have typed accessors;
/// anything else is reachable through [`get_claim`](Claims::get_claim).
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    inner: JsonValue,
}

impl Claims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// Gets the inner JSON value.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner
    }

    /// Subject identifier (`sub`).
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    #[must_use]
    pub fn preferred_username(&self) -> Option<&str> {
        self.str_claim("preferred_username")
    }

    #[must_use]
    pub fn given_name(&self) -> Option<&str> {
        self.str_claim("given_name")
    }

    #[must_use]
    pub fn family_name(&self) -> Option<&str> {
        self.str_claim("family_name")
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_claim("name")
    }

    /// Best label for the user: `name`, then `preferred_username`, `email`, `sub`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name()
            .or(self.preferred_username())
            .or(self.email())
            .or(self.subject())
    }

    /// Expiry (`exp`) in seconds since the Unix epoch.
    ///
    /// Fractional values are truncated. A non-numeric `exp` counts as absent.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        let exp = self.inner.get("exp")?;
        exp.as_i64()
            .or_else(|| exp.as_f64().map(|secs| secs.trunc() as i64))
    }

    /// Roles listed under `realm_access.roles`. Non-string entries are skipped.
    #[must_use]
    pub fn realm_roles(&self) -> BTreeSet<String> {
        self.inner
            .get("realm_access")
            .and_then(|access| access.get("roles"))
            .and_then(JsonValue::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn str_claim(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(JsonValue::as_str)
    }
}

/// Decodes the payload segment of a token.
///
/// Returns `None` if the token does not have exactly three segments, the
/// payload is not base64url, or it does not hold a JSON object. Failures are
/// logged and never raised.
#[must_use]
pub fn decode(token: &str) -> Option<Claims> {
    match decode_payload(token) {
        Ok(claims) => Some(claims),
        Err(reason) => {
            tracing::warn!(reason, "Failed to decode token payload");
            None
        }
    }
}

fn decode_payload(token: &str) -> Result<Claims, &'static str> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err("expected three dot-separated segments");
    };

    // Some issuers keep base64 padding on the payload.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| "payload is not base64url")?;

    let inner: JsonValue =
        serde_json::from_slice(&bytes).map_err(|_| "payload is not valid JSON")?;
    if !inner.is_object() {
        return Err("payload is not a JSON object");
    }

    Ok(Claims { inner })
}

/// Returns `true` if the token is expired, undecodable, or has no `exp`.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_unix())
}

/// Same as [`is_expired`] against an explicit clock. `exp == now` is expired.
#[must_use]
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match expiration_time(token) {
        Some(exp) => exp <= now,
        None => true,
    }
}

/// Returns `true` if the token expires within `seconds` from now, or is
/// undecodable, or has no `exp`.
#[must_use]
pub fn expires_within(token: &str, seconds: u64) -> bool {
    expires_within_at(token, seconds, now_unix())
}

/// Same as [`expires_within`] against an explicit clock. Expiring exactly at
/// `now + seconds` counts as within.
#[must_use]
pub fn expires_within_at(token: &str, seconds: u64, now: i64) -> bool {
    let horizon = now.saturating_add(i64::try_from(seconds).unwrap_or(i64::MAX));
    match expiration_time(token) {
        Some(exp) => exp <= horizon,
        None => true,
    }
}

/// Expiry claim in seconds since the epoch, or `None` if undecodable or absent.
#[must_use]
pub fn expiration_time(token: &str) -> Option<i64> {
    decode(token)?.expires_at()
}

/// Realm roles carried by the token; empty when absent or undecodable.
#[must_use]
pub fn roles(token: &str) -> BTreeSet<String> {
    decode(token)
        .map(|claims| claims.realm_roles())
        .unwrap_or_default()
}

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
pub(crate) fn token_with_payload(payload: &str) -> String {
    format!("header.{}.sig", URL_SAFE_NO_PAD.encode(payload))
}
