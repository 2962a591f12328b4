//! # logsleuth-sessions
//!
//! Registry of debug sessions. A session gives one debugging task a short id
//! and a log prefix (`[DEBUG-<id>]`) so its output can be filtered out of the
//! shared log stream later.
//!
//! Records live one per file under the sessions directory, keyed by id.

mod error;
mod id;
mod store;
mod types;

pub use error::SessionError;
pub use id::{is_valid_id, HashedIdSource, SessionIdSource};
pub use store::{SessionRegistry, MAX_ID_ATTEMPTS};
pub use types::{
    base_prefix, Category, CorruptRecord, DebugSession, Module, SessionListing, SessionStatus,
    RECORD_VERSION,
};
