//! Plugin result signaling
//!
//! Every stage of every plugin returns a [`Status`]. Success is an explicit
//! variant; only the `Error` variant can carry an underlying error.

use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Status code, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Code {
    Success,
    /// The plugin opts out of the current stage for this cycle
    Skip,
    /// The cluster fails a hard constraint
    ClusterUnschedulable,
    /// Unexpected failure; aborts the cycle
    Error,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Code::Success => "Success",
            Code::Skip => "Skip",
            Code::ClusterUnschedulable => "ClusterUnschedulable",
            Code::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Outcome of a plugin stage
#[derive(Debug, Clone)]
pub enum Status {
    Success,
    Skip {
        plugin: String,
        reasons: Vec<String>,
    },
    ClusterUnschedulable {
        plugin: String,
        reasons: Vec<String>,
    },
    Error {
        plugin: String,
        err: Arc<SchedulerError>,
    },
}

impl Status {
    pub fn success() -> Self {
        Status::Success
    }

    /// Build a non-error status
    ///
    /// `Code::Success` yields `Status::Success`. `Code::Error` is not a
    /// valid non-error code and yields an error status describing the misuse.
    pub fn new(code: Code, plugin: impl Into<String>, reasons: Vec<String>) -> Self {
        let plugin = plugin.into();
        match code {
            Code::Success => Status::Success,
            Code::Skip => Status::Skip { plugin, reasons },
            Code::ClusterUnschedulable => Status::ClusterUnschedulable { plugin, reasons },
            Code::Error => Status::Error {
                err: Arc::new(SchedulerError::internal_error(format!(
                    "plugin {} built an error status without an error: {}",
                    plugin,
                    reasons.join(", ")
                ))),
                plugin,
            },
        }
    }

    pub fn skip(plugin: impl Into<String>) -> Self {
        Status::Skip {
            plugin: plugin.into(),
            reasons: Vec::new(),
        }
    }

    pub fn unschedulable(plugin: impl Into<String>, reasons: Vec<String>) -> Self {
        Status::ClusterUnschedulable {
            plugin: plugin.into(),
            reasons,
        }
    }

    /// Wrap an error; the code is always `Error`
    pub fn from_error(err: impl Into<SchedulerError>, plugin: impl Into<String>) -> Self {
        Status::Error {
            plugin: plugin.into(),
            err: Arc::new(err.into()),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            Status::Success => Code::Success,
            Status::Skip { .. } => Code::Skip,
            Status::ClusterUnschedulable { .. } => Code::ClusterUnschedulable,
            Status::Error { .. } => Code::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Status::Skip { .. })
    }

    pub fn is_unschedulable(&self) -> bool {
        matches!(self, Status::ClusterUnschedulable { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }

    /// Name of the plugin that produced the status; empty for success
    pub fn plugin(&self) -> &str {
        match self {
            Status::Success => "",
            Status::Skip { plugin, .. }
            | Status::ClusterUnschedulable { plugin, .. }
            | Status::Error { plugin, .. } => plugin,
        }
    }

    /// Human-readable reasons; an error status reports its error message
    pub fn reasons(&self) -> Vec<String> {
        match self {
            Status::Success => Vec::new(),
            Status::Skip { reasons, .. } | Status::ClusterUnschedulable { reasons, .. } => {
                reasons.clone()
            }
            Status::Error { err, .. } => vec![err.to_string()],
        }
    }

    pub fn error(&self) -> Option<&Arc<SchedulerError>> {
        match self {
            Status::Error { err, .. } => Some(err),
            _ => None,
        }
    }

    /// The more severe of two statuses; on a tie the first one wins
    pub fn most_severe(self, other: Status) -> Status {
        if other.code() > self.code() {
            other
        } else {
            self
        }
    }

    /// Convert an error status into an error naming its plugin
    pub fn into_result(self) -> crate::Result<Status> {
        match self {
            Status::Error { plugin, err } => Err(SchedulerError::plugin_failed(plugin, err)),
            other => Ok(other),
        }
    }
}

/// Statuses are equal when code and plugin agree; reasons and errors are
/// diagnostic detail and do not take part in the comparison
impl PartialEq for Status {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code() && self.plugin() == other.plugin()
    }
}

impl Eq for Status {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "Success"),
            Status::Error { plugin, err } => write!(f, "Error from {}: {}", plugin, err),
            other => {
                write!(f, "{} from {}", other.code(), other.plugin())?;
                let reasons = other.reasons();
                if !reasons.is_empty() {
                    write!(f, ": {}", reasons.join(", "))?;
                }
                Ok(())
            }
        }
    }
}
