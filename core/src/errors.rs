//! Errors surfaced to the host by dispatch and job runs

use thiserror::Error;

use crate::executor::ExecError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no endpoint matches {method} {path}")]
    EndpointNotFound { method: String, path: String },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("unknown job '{0}'")]
    UnknownJob(String),
}
