use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppStateError {
    #[error("no sync key registered for key id {0}")]
    MissingSyncKey(String),
    #[error("mutation value MAC verification failed")]
    ValueMacMismatch,
    #[error("patch MAC verification failed for collection {0}")]
    PatchMacMismatch(String),
    #[error("snapshot MAC verification failed for collection {0}")]
    SnapshotMacMismatch(String),
    #[error("mutation referenced an index with no recorded prior value")]
    UnknownIndex,
    #[error("malformed mutation payload: {0}")]
    Malformed(&'static str),
    #[error("collection {0} is irrecoverable after repeated resync failures")]
    Irrecoverable(String),
    #[error("server reported collection {0} does not exist (404)")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AppStateError>;
