use thiserror::Error;

use crate::source::SourceKind;

use super::model::SessionId;

/// Errors surfaced synchronously from `start`. In-session failures are
/// reported through status only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("replay {0} is already running")]
    AlreadyActive(SessionId),
    #[error("{kind} source not found: {id}")]
    SourceNotFound { kind: SourceKind, id: String },
    #[error("selected {kind} sources have no content: {id}")]
    EmptySource { kind: SourceKind, id: String },
    #[error("invalid replay config: {0}")]
    InvalidConfig(String),
}
