// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// Cycle state is missing or holds the wrong type for a plugin
    #[error("invalid state: {message}")]
    #[diagnostic(
        code(scheduler::invalid_state),
        help("PreFilter/PreScore must run before Filter/Score in the same cycle. This is likely a bug")
    )]
    InvalidState { message: String },

    /// A plugin reported an error status
    #[error("plugin {plugin} failed: {source}")]
    #[diagnostic(
        code(scheduler::plugin_failed),
        help("The cycle was aborted; the caller decides whether to retry")
    )]
    PluginFailed {
        plugin: String,
        #[source]
        source: Arc<SchedulerError>,
    },

    /// Two plugins registered under the same name
    #[error("plugin {name} is already registered")]
    #[diagnostic(
        code(scheduler::duplicate_plugin),
        help("Plugin names key the cycle state and must be unique within a profile")
    )]
    DuplicatePlugin { name: String },

    /// The cycle was cancelled or ran past its deadline
    #[error("scheduling cycle cancelled: {reason}")]
    #[diagnostic(
        code(scheduler::cancelled),
        help("No partial result is reported for a cancelled cycle")
    )]
    Cancelled { reason: String },

    /// Core error
    #[error("Core error: {0}")]
    #[diagnostic(
        code(scheduler::core_error),
        help("Check the placement policy and cluster documents")
    )]
    CoreError(#[from] flotilla_core::FlotillaError),

    /// Binding sink rejected a decision
    #[error("Binding failed for {policy_name}: {message}")]
    #[diagnostic(
        code(scheduler::binding_failed),
        help("Check the binding sink; the decision was not recorded")
    )]
    BindingFailed {
        policy_name: String,
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError { message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a PluginFailed error
    pub fn plugin_failed(plugin: impl Into<String>, source: Arc<SchedulerError>) -> Self {
        Self::PluginFailed {
            plugin: plugin.into(),
            source,
        }
    }

    /// Create a DuplicatePlugin error
    pub fn duplicate_plugin(name: impl Into<String>) -> Self {
        Self::DuplicatePlugin { name: name.into() }
    }

    /// Create a Cancelled error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a BindingFailed error
    pub fn binding_failed(policy_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BindingFailed {
            policy_name: policy_name.into(),
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Whether the error came from cancellation, possibly wrapped by a plugin
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::PluginFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
