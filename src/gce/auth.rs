//! OAuth2 access tokens for the Compute Engine API.
//!
//! Service accounts use the JWT bearer grant with an RS256 assertion signed
//! by the key's private key. Authorised users exchange their refresh token.
//! Tokens are cached until shortly before they expire.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::GceError;
use super::types::TokenResponse;
use crate::credentials::{AuthorizedUser, Credentials, ServiceAccountKey};

/// OAuth scope granting read/write access to Compute Engine.
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Clone)]
enum Grant {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    Fixed(String),
}

struct CachedToken {
    value: String,
    refresh_after: Instant,
}

impl CachedToken {
    fn new(value: String, expires_in: Duration) -> Self {
        Self {
            value,
            refresh_after: Instant::now() + expires_in.saturating_sub(REFRESH_MARGIN),
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_after
    }
}

/// Mints and caches access tokens for one set of credentials.
pub struct TokenSource {
    grant: Grant,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.grant {
            Grant::ServiceAccount(_) => "service_account",
            Grant::AuthorizedUser(_) => "authorized_user",
            Grant::Fixed(_) => "fixed",
        };
        f.debug_struct("TokenSource")
            .field("grant", &kind)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Builds a token source for parsed credentials.
    #[must_use]
    pub fn new(credentials: Credentials, http: reqwest::Client) -> Self {
        let grant = match credentials {
            Credentials::ServiceAccount(key) => Grant::ServiceAccount(key),
            Credentials::AuthorizedUser(user) => Grant::AuthorizedUser(user),
        };
        Self {
            grant,
            http,
            cache: Mutex::new(None),
        }
    }

    /// Builds a token source that always returns `token`.
    #[must_use]
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            grant: Grant::Fixed(token.into()),
            http: reqwest::Client::new(),
            cache: Mutex::new(None),
        }
    }

    /// Returns a valid access token, minting a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns [`GceError::Auth`] when signing the assertion or exchanging it
    /// at the token endpoint fails.
    pub async fn access_token(&self) -> Result<String, GceError> {
        if let Grant::Fixed(token) = &self.grant {
            return Ok(token.clone());
        }

        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.value.clone());
        }

        let minted = match &self.grant {
            Grant::ServiceAccount(key) => self.exchange_assertion(key).await?,
            Grant::AuthorizedUser(user) => self.exchange_refresh_token(user).await?,
            Grant::Fixed(token) => return Ok(token.clone()),
        };
        debug!(expires_in = minted.expires_in, "minted access token");
        let value = minted.access_token.clone();
        *cache = Some(CachedToken::new(
            minted.access_token,
            Duration::from_secs(minted.expires_in),
        ));
        Ok(value)
    }

    async fn exchange_assertion(&self, key: &ServiceAccountKey) -> Result<TokenResponse, GceError> {
        let assertion = sign_assertion(key, unix_now()?)?;
        let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
        self.post_token_request(&key.token_uri, &form).await
    }

    async fn exchange_refresh_token(
        &self,
        user: &AuthorizedUser,
    ) -> Result<TokenResponse, GceError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", user.refresh_token.as_str()),
        ];
        self.post_token_request(&user.token_uri, &form).await
    }

    async fn post_token_request(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, GceError> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|err| auth_error(&err))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| auth_error(&err))?;
        if !status.is_success() {
            return Err(GceError::Auth {
                message: format!(
                    "token endpoint returned {status}: {}",
                    String::from_utf8_lossy(&body)
                ),
            });
        }

        serde_json::from_slice(&body).map_err(|err| auth_error(&err))
    }
}

fn auth_error(err: &impl fmt::Display) -> GceError {
    GceError::Auth {
        message: err.to_string(),
    }
}

fn unix_now() -> Result<u64, GceError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|err| auth_error(&err))
}

/// Signs the JWT bearer assertion for a service account.
pub(super) fn sign_assertion(key: &ServiceAccountKey, issued_at: u64) -> Result<String, GceError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&key.private_key_id);

    let claims = Claims {
        iss: &key.client_email,
        scope: COMPUTE_SCOPE,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at.saturating_add(ASSERTION_LIFETIME.as_secs()),
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|err| GceError::Auth {
            message: format!("invalid private key for {}: {err}", key.client_email),
        })?;

    jsonwebtoken::encode(&header, &claims, &signing_key).map_err(|err| auth_error(&err))
}
