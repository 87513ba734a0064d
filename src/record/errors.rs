use thiserror::Error;

/// Errors that can arise while recording or querying raid history.
///
/// None of these are allowed to take the host process down: every handler
/// boundary catches them and degrades to "this raid's accounting is
/// incomplete".
#[derive(Debug, Error)]
pub enum RecordError {
    /// Profile or inventory lookup failed; the current operation is aborted
    /// with no state mutated.
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A per-player record file failed to parse. The file is quarantined and
    /// the player continues with empty history.
    #[error("corrupt record file {path}: {detail}")]
    PersistenceCorruption { path: String, detail: String },

    /// Wrapper around IO errors (directory creation, file locks, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A chat/CLI selector (raid id or index) did not resolve.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// A chat command parameter (paging limit, page number) failed to parse.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Player id unusable as a storage key.
    #[error("invalid player id: {0}")]
    InvalidPlayerId(String),
}
