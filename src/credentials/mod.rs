//! Locating and parsing Google credentials files.
//!
//! The credentials path comes from `GOOGLE_APPLICATION_CREDENTIALS` unless
//! configuration names one explicitly. Two file shapes are understood:
//! service account keys and `gcloud` authorised-user files.

use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the credentials file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// OAuth2 token endpoint used when the file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Errors raised while locating or parsing credentials.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CredentialsError {
    /// Raised when no credentials path is configured.
    #[error("{env_var} is not set; point it at a service account key or authorised user file")]
    NotConfigured {
        /// Environment variable that was consulted.
        env_var: String,
    },
    /// Raised when the credentials file cannot be read.
    #[error("failed to read credentials from {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the credentials file is not valid JSON of a known type.
    #[error("failed to parse credentials in {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Service account key downloaded from the cloud console.
#[derive(Clone, Deserialize, Eq, PartialEq)]
pub struct ServiceAccountKey {
    /// Service account e-mail used as the JWT issuer.
    pub client_email: String,
    /// PEM encoded RSA private key.
    pub private_key: String,
    /// Identifier of the private key, sent as the JWT `kid`.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Project that owns the service account.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Authorised-user credentials written by `gcloud auth application-default login`.
#[derive(Clone, Deserialize, Eq, PartialEq)]
pub struct AuthorizedUser {
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Project used for quota, when recorded.
    #[serde(default)]
    pub quota_project_id: Option<String>,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("quota_project_id", &self.quota_project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

/// Parsed credentials file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Service account key (`"type": "service_account"`).
    ServiceAccount(ServiceAccountKey),
    /// Authorised-user file (`"type": "authorized_user"`).
    AuthorizedUser(AuthorizedUser),
}

impl Credentials {
    /// Reads and parses the credentials file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Io`] when the file cannot be read and
    /// [`CredentialsError::Parse`] when its contents are not recognised.
    pub fn load(path: &Utf8Path) -> Result<Self, CredentialsError> {
        let contents = read_file(path)?;
        Self::from_json(path, &contents)
    }

    /// Parses credentials JSON; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Parse`] when the JSON is invalid or of an
    /// unsupported type.
    pub fn from_json(path: &Utf8Path, contents: &str) -> Result<Self, CredentialsError> {
        serde_json::from_str(contents).map_err(|err| CredentialsError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Project recorded in the credentials, used when none is configured.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::ServiceAccount(key) => key.project_id.as_deref(),
            Self::AuthorizedUser(user) => user.quota_project_id.as_deref(),
        }
        .filter(|value| !value.trim().is_empty())
    }
}

/// Resolves the credentials path from an explicit override or the process
/// environment.
///
/// # Errors
///
/// Returns [`CredentialsError::NotConfigured`] when neither source names a
/// path.
pub fn locate(explicit: Option<&str>) -> Result<Utf8PathBuf, CredentialsError> {
    locate_with(explicit, |key| std::env::var(key).ok())
}

/// Resolves the credentials path using a custom environment lookup.
///
/// Blank values are treated as unset.
///
/// # Errors
///
/// Returns [`CredentialsError::NotConfigured`] when neither source names a
/// path.
pub fn locate_with<F>(explicit: Option<&str>, lookup: F) -> Result<Utf8PathBuf, CredentialsError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |value: &str| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    };
    explicit
        .and_then(non_blank)
        .or_else(|| lookup(CREDENTIALS_ENV).as_deref().and_then(non_blank))
        .map(Utf8PathBuf::from)
        .ok_or_else(|| CredentialsError::NotConfigured {
            env_var: CREDENTIALS_ENV.to_owned(),
        })
}

fn read_file(path: &Utf8Path) -> Result<String, CredentialsError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| CredentialsError::Io {
        path: path.to_path_buf(),
        message: String::from("credentials path is missing a filename"),
    })?;

    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(path, &err))?;
    dir.read_to_string(file_name)
        .map_err(|err| io_error(path, &err))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> CredentialsError {
    CredentialsError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
