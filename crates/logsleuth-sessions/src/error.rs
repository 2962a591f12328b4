use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session id {0:?}: ids are alphanumeric")]
    InvalidId(String),

    #[error("could not allocate a unique session id after {attempts} attempts")]
    ExhaustedIdSpace { attempts: u32 },

    #[error("corrupt session record {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("session {session_id} is locked by another writer")]
    Locked { session_id: String },

    #[error("could not determine data directory")]
    NoDataDir,

    #[error("session store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize session record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SessionError::Io {
            path: path.into(),
            source,
        }
    }
}
