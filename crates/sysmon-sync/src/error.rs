use sysmon_core::FetchError;
use thiserror::Error;

/// Rejected locally, before anything is sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("process {process} has no executable path")]
    MissingExecutablePath { process: String },
    #[error("an application with path {path} is already monitored")]
    DuplicateApplication { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("an action is already running for {target}")]
    TargetBusy { target: String },
    #[error("action #{0} is unknown or already finished")]
    UnknownAction(u64),
    #[error("action #{0} is not awaiting confirmation")]
    NotConfirming(u64),
    #[error("action #{0} is not executing")]
    NotExecuting(u64),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] FetchError),
}
