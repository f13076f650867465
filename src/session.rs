//! Turns configuration into a ready-to-use controller.
//!
//! Credentials are located and parsed before any provider client exists, so
//! a missing `GOOGLE_APPLICATION_CREDENTIALS` fails fast with a typed error.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::compute::{InstanceRef, TargetError, ZoneScope};
use crate::config::{ComputeConfig, ConfigError};
use crate::control::InstanceController;
use crate::credentials::{self, Credentials, CredentialsError};
use crate::gce::{GceClient, GceError};

/// Errors raised while building a [`Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Credentials could not be located or parsed.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    /// The Compute Engine client could not be constructed.
    #[error("failed to create compute client: {0}")]
    Client(#[from] GceError),
    /// An instance identifier was rejected.
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Controller bound to the configured project and zone.
#[derive(Debug)]
pub struct Session {
    controller: InstanceController<GceClient>,
    scope: ZoneScope,
}

impl Session {
    /// Opens a session using the process environment to find credentials.
    ///
    /// # Errors
    ///
    /// See [`Self::open_with`].
    pub fn open(config: &ComputeConfig, cancel: CancellationToken) -> Result<Self, SessionError> {
        Self::open_with(config, |key| std::env::var(key).ok(), cancel)
    }

    /// Opens a session using `lookup` to read environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] when configuration is invalid or no
    /// project can be determined, [`SessionError::Credentials`] when the
    /// credentials file is not configured or unreadable, and
    /// [`SessionError::Client`] when the HTTP client cannot be built.
    pub fn open_with<F>(
        config: &ComputeConfig,
        lookup: F,
        cancel: CancellationToken,
    ) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;
        let path = credentials::locate_with(config.credentials_file.as_deref(), lookup)?;
        let credentials = Credentials::load(&path)?;
        let scope = config.scope(credentials.project_id())?;
        debug!(%path, %scope, "loaded credentials");

        let client = GceClient::new(credentials, &config.api_base, config.request_timeout())?;
        let controller =
            InstanceController::new(client, config.wait_policy()).with_cancellation(cancel);
        Ok(Self { controller, scope })
    }

    /// Project and zone every call is scoped to.
    #[must_use]
    pub const fn scope(&self) -> &ZoneScope {
        &self.scope
    }

    /// Controller that performs lifecycle operations.
    #[must_use]
    pub const fn controller(&self) -> &InstanceController<GceClient> {
        &self.controller
    }

    /// Addresses `instance` within the session's scope.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Target`] when the identifier is blank or
    /// contains `/`.
    pub fn target(&self, instance: &str) -> Result<InstanceRef, SessionError> {
        Ok(self.scope.instance(instance)?)
    }
}
