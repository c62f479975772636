//! Error taxonomy for the dispatch core.
//!
//! Every failure that crosses a component boundary is one of these variants, so
//! callers (and tests) can match on the kind instead of reading log output.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input, rejected before anything is persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("completion provider failure: {0}")]
    Completion(#[from] CompletionError),

    #[error("not configured: {0}")]
    Configuration(String),

    /// The detached send-and-record task panicked or was cancelled.
    #[error("dispatch task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("conversation {0} does not exist")]
    UnknownConversation(i64),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("blocking database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
#[error("failed to send to chat {chat_id}: {reason}")]
pub struct TransportError {
    pub chat_id: i64,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("OPENAI_API_KEY is not configured")]
    NotConfigured,

    #[error("completion timed out after {0} seconds")]
    Timeout(u64),

    #[error("completion API error: {0}")]
    Api(#[from] async_openai::error::OpenAIError),

    #[error("completion returned no choices")]
    EmptyChoices,

    #[error("completion returned an empty message")]
    EmptyContent,
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Persistence(PersistenceError::Sqlite(e))
    }
}
