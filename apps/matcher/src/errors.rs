use thiserror::Error;

use crate::transport::TransportError;

/// Workflow-level error type.
/// Every failure is converted into one of these at the boundary of the step
/// that raised it, so pages can render a single human-readable message.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected before any network call; workflow state is unchanged.
    #[error("{0}")]
    Validation(String),

    /// A page could not load the data it needs.
    #[error("{what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: TransportError,
    },

    /// An action step (upload, confirm, start, poll) failed on the wire.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered, but the answer cannot advance the workflow.
    #[error("{0}")]
    Workflow(String),

    #[error("The run was superseded before it finished")]
    Superseded,

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn fetch(what: &'static str, source: TransportError) -> Self {
        AppError::Fetch { what, source }
    }
}
