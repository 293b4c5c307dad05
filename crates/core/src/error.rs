//! Error types shared across the core.

use std::io;
use std::path::PathBuf;

use shopkeeper_model::ErrorKind;

/// A durable record is missing a mandatory field or holds an invalid value.
#[derive(Debug, thiserror::Error)]
#[error("malformed record: {reason}")]
pub struct MalformedRecordError {
    reason: String,
}

impl MalformedRecordError {
    pub(crate) fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns why the record was rejected.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<serde_json::Error> for MalformedRecordError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors raised by the conversation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// A conversation could not be encoded.
    #[error("failed to encode conversation {id}: {source}")]
    Encode {
        /// The conversation id.
        id: String,
        /// The underlying error.
        source: serde_json::Error,
    },
    /// A persisted conversation could not be decoded.
    #[error("conversation {id} is unreadable: {source}")]
    Malformed {
        /// The conversation id.
        id: String,
        /// What is wrong with the record.
        source: MalformedRecordError,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by an agent run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model provider failed.
    #[error("{kind}: {message}")]
    Model {
        /// The provider's classification of the failure.
        kind: ErrorKind,
        /// The provider's message.
        message: String,
    },
    /// The model kept asking for tools past the allowed number of rounds.
    #[error("gave up after {0} rounds of tool calls")]
    ToolRoundsExceeded(usize),
    /// Any other failure of a custom runner.
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Creates an [`AgentError::Other`] from any message.
    #[inline]
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}
