//! Console rendering for command results.

use serde::Serialize;
use thiserror::Error;

use crate::compute::{Instance, ZoneScope};
use crate::control::Transition;

/// Output style for command results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// One human-readable line per result.
    #[default]
    Text,
    /// A single JSON document per command.
    Json,
}

/// Errors raised while rendering results.
#[derive(Debug, Error)]
pub enum ReportError {
    /// JSON serialisation failed.
    #[error("failed to render JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct InstanceView<'a> {
    id: &'a str,
    name: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_message: Option<&'a str>,
}

impl<'a> From<&'a Instance> for InstanceView<'a> {
    fn from(instance: &'a Instance) -> Self {
        Self {
            id: &instance.id,
            name: &instance.name,
            status: instance.status.as_str(),
            status_message: instance.status_message.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ListView<'a> {
    project: &'a str,
    zone: &'a str,
    instances: Vec<InstanceView<'a>>,
}

#[derive(Serialize)]
struct TransitionView<'a> {
    instance: &'a str,
    action: &'a str,
    operation: &'a str,
}

/// Renders the instances found in `scope`.
///
/// # Errors
///
/// Returns [`ReportError::Json`] when JSON serialisation fails.
pub fn render_list(
    format: OutputFormat,
    scope: &ZoneScope,
    instances: &[Instance],
) -> Result<String, ReportError> {
    match format {
        OutputFormat::Text if instances.is_empty() => {
            Ok(format!("No instances found in zone {}.", scope.zone))
        }
        OutputFormat::Text => Ok(instances
            .iter()
            .map(|instance| {
                format!(
                    "Instance Name: {} with status {}",
                    instance.name, instance.status
                )
            })
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => to_json(&ListView {
            project: &scope.project_id,
            zone: &scope.zone,
            instances: instances.iter().map(InstanceView::from).collect(),
        }),
    }
}

/// Renders a single instance fetched as `requested`.
///
/// # Errors
///
/// Returns [`ReportError::Json`] when JSON serialisation fails.
pub fn render_instance(
    format: OutputFormat,
    requested: &str,
    instance: &Instance,
) -> Result<String, ReportError> {
    match format {
        OutputFormat::Text => Ok(format!(
            "Instance {requested} retrieved successfully. Status: {}",
            instance.status
        )),
        OutputFormat::Json => to_json(&InstanceView::from(instance)),
    }
}

/// Renders a completed transition.
///
/// # Errors
///
/// Returns [`ReportError::Json`] when JSON serialisation fails.
pub fn render_transition(
    format: OutputFormat,
    transition: &Transition,
) -> Result<String, ReportError> {
    match format {
        OutputFormat::Text => Ok(format!(
            "Instance {} {} successfully.",
            transition.instance,
            transition.action.past_tense()
        )),
        OutputFormat::Json => to_json(&TransitionView {
            instance: &transition.instance,
            action: transition.action.as_str(),
            operation: &transition.operation,
        }),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(value)?)
}
