//! Wire types for the Compute Engine REST API.
//!
//! Only the fields `vmctl` reads are modelled; everything else is ignored.

use serde::Deserialize;

use crate::compute::{Instance, InstanceStatus, Operation, OperationErrorEntry, OperationStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct InstanceResource {
    #[serde(default)]
    id: String,
    name: String,
    status: String,
    #[serde(default)]
    status_message: Option<String>,
}

impl From<InstanceResource> for Instance {
    fn from(value: InstanceResource) -> Self {
        Self {
            id: value.id,
            name: value.name,
            status: InstanceStatus::from(value.status.as_str()),
            status_message: value.status_message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct InstanceList {
    #[serde(default)]
    pub(super) items: Vec<InstanceResource>,
    #[serde(default)]
    pub(super) next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationErrorEntryResource {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct OperationErrorResource {
    #[serde(default)]
    errors: Vec<OperationErrorEntryResource>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationWarningResource {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationResource {
    name: String,
    status: String,
    #[serde(default)]
    error: Option<OperationErrorResource>,
    #[serde(default)]
    warnings: Vec<OperationWarningResource>,
}

impl From<OperationResource> for Operation {
    fn from(value: OperationResource) -> Self {
        Self {
            name: value.name,
            status: OperationStatus::from(value.status.as_str()),
            errors: value
                .error
                .unwrap_or_default()
                .errors
                .into_iter()
                .map(|entry| OperationErrorEntry {
                    code: entry.code,
                    message: entry.message,
                    location: entry.location,
                })
                .collect(),
            warnings: value
                .warnings
                .into_iter()
                .map(|warning| format!("{}: {}", warning.code, warning.message))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub(super) error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub(super) message: String,
    #[serde(default)]
    pub(super) errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorDetail {
    #[serde(default)]
    pub(super) reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub(super) access_token: String,
    #[serde(default = "default_expires_in")]
    pub(super) expires_in: u64,
}

const fn default_expires_in() -> u64 {
    3600
}
