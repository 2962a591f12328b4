use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time;

use chrono::{DateTime, Duration, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::id::{is_valid_id, HashedIdSource, SessionIdSource};
use crate::types::{
    Category, CorruptRecord, DebugSession, Module, SessionListing, SessionStatus,
};

/// Attempts made by [`SessionRegistry::create_session`] before giving up.
pub const MAX_ID_ATTEMPTS: u32 = 5;

const RECORD_EXT: &str = "json";
const LOCK_EXT: &str = "lock";

const LOCK_RETRY_INTERVAL: time::Duration = time::Duration::from_millis(10);
const LOCK_ATTEMPTS: u32 = 500;
/// A lock file older than this was left behind by a crashed writer.
const STALE_LOCK_AGE: time::Duration = time::Duration::from_secs(30);

/// Durable store of debug sessions, one JSON file per session.
///
/// Creating a record reserves `<id>.json` with an exclusive create. Updates
/// and deletes hold `<id>.lock` for the read-modify-write and publish through
/// a uniquely named temp file plus rename, so a registry may be shared across
/// threads and processes.
pub struct SessionRegistry {
    sessions_dir: PathBuf,
    id_source: Box<dyn SessionIdSource>,
}

impl SessionRegistry {
    /// Registry under the default data directory.
    pub fn new() -> Result<Self, SessionError> {
        let data_dir = dirs::data_dir().ok_or(SessionError::NoDataDir)?;
        Ok(Self::with_dir(data_dir.join("logsleuth").join("sessions")))
    }

    /// Registry rooted at a custom directory.
    pub fn with_dir(sessions_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            id_source: Box::new(HashedIdSource),
        }
    }

    /// Replace the id generator.
    pub fn with_id_source(mut self, source: impl SessionIdSource + 'static) -> Self {
        self.id_source = Box::new(source);
        self
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Create and persist a new session.
    pub fn create_session(&self, label: &str) -> Result<DebugSession, SessionError> {
        self.create_session_at(label, Utc::now())
    }

    pub fn create_session_at(
        &self,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<DebugSession, SessionError> {
        fs::create_dir_all(&self.sessions_dir)
            .map_err(|e| SessionError::io(&self.sessions_dir, e))?;

        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = self.id_source.generate(label, now, attempt);
            if !is_valid_id(&id) {
                return Err(SessionError::InvalidId(id));
            }

            let path = self.record_path(&id);
            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(session_id = %id, attempt, "Session id collision, retrying");
                    continue;
                }
                Err(e) => return Err(SessionError::io(&path, e)),
            };

            let session = DebugSession::new(id, label.to_string(), now);
            let json = serde_json::to_vec_pretty(&session)?;
            if let Err(e) = write_and_sync(&file, &json) {
                let _ = fs::remove_file(&path);
                return Err(SessionError::io(&path, e));
            }

            info!(session_id = %session.session_id, label, "Created debug session");
            return Ok(session);
        }

        Err(SessionError::ExhaustedIdSpace {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Look up a session by id.
    pub fn resolve(&self, session_id: &str) -> Result<DebugSession, SessionError> {
        let path = self.checked_path(session_id)?;
        match read_record(&path)? {
            Some(session) => Ok(session),
            None => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    /// Sessions newest first, optionally limited to those created within
    /// `max_age_days`. Unreadable records are logged and skipped.
    pub fn list_sessions(
        &self,
        max_age_days: Option<u32>,
    ) -> Result<Vec<DebugSession>, SessionError> {
        Ok(self.list_report(max_age_days)?.sessions)
    }

    /// Like [`list_sessions`](Self::list_sessions) but also returns the
    /// records that were skipped.
    pub fn list_report(&self, max_age_days: Option<u32>) -> Result<SessionListing, SessionError> {
        self.list_report_at(max_age_days, Utc::now())
    }

    pub fn list_report_at(
        &self,
        max_age_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<SessionListing, SessionError> {
        let cutoff = max_age_days.map(|days| now - Duration::days(i64::from(days)));
        let mut listing = self.scan()?;

        if let Some(cutoff) = cutoff {
            listing.sessions.retain(|s| s.created_at >= cutoff);
        }
        // Newest first; ties broken by id for a stable order.
        listing.sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });

        Ok(listing)
    }

    /// Remove a session. Missing sessions are not an error; returns whether
    /// a record was removed.
    pub fn delete_session(&self, session_id: &str) -> Result<bool, SessionError> {
        let path = self.checked_path(session_id)?;
        let removed = self.remove_record(session_id, &path)?;
        if removed {
            info!(session_id, "Deleted debug session");
        } else {
            debug!(session_id, "Session already absent");
        }
        Ok(removed)
    }

    /// Sessions that [`cleanup_older_than_at`](Self::cleanup_older_than_at)
    /// would delete for the same `days` and `now`.
    pub fn expired_sessions_at(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DebugSession>, SessionError> {
        let cutoff = now - Duration::days(i64::from(days));
        let mut expired = self.scan()?.sessions;
        expired.retain(|s| s.created_at < cutoff);
        Ok(expired)
    }

    /// Delete every session created more than `days` days ago.
    pub fn cleanup_older_than(&self, days: u32) -> Result<usize, SessionError> {
        self.cleanup_older_than_at(days, Utc::now())
    }

    pub fn cleanup_older_than_at(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, SessionError> {
        let mut deleted = 0;
        for session in self.expired_sessions_at(days, now)? {
            let path = self.record_path(&session.session_id);
            // A concurrent cleanup may already have removed it.
            if self.remove_record(&session.session_id, &path)? {
                deleted += 1;
            }
        }

        info!(days, deleted, "Cleaned up old debug sessions");
        Ok(deleted)
    }

    /// Mark a session closed. Closing twice keeps the first close time.
    pub fn close_session(&self, session_id: &str) -> Result<DebugSession, SessionError> {
        self.update(session_id, |session| {
            if session.status != SessionStatus::Closed {
                session.status = SessionStatus::Closed;
                session.closed_at = Some(Utc::now());
            }
        })
    }

    /// Hand out a sub-scoped prefix and remember it on the session record.
    pub fn scoped_prefix(
        &self,
        session_id: &str,
        module: Module,
        category: Category,
    ) -> Result<String, SessionError> {
        let mut prefix = String::new();
        self.update(session_id, |session| {
            prefix = session.scoped(module, category);
            if !session.scoped_prefixes.contains(&prefix) {
                session.scoped_prefixes.push(prefix.clone());
            }
        })?;
        Ok(prefix)
    }

    fn update<F>(&self, session_id: &str, apply: F) -> Result<DebugSession, SessionError>
    where
        F: FnOnce(&mut DebugSession),
    {
        let path = self.checked_path(session_id)?;
        let _lock = RecordLock::acquire(self.lock_path(session_id), session_id)?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let mut session =
            read_record(&path)?.ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        apply(&mut session);

        let json = serde_json::to_vec_pretty(&session)?;
        let tmp = NamedTempFile::new_in(&self.sessions_dir)
            .map_err(|e| SessionError::io(&self.sessions_dir, e))?;
        write_and_sync(tmp.as_file(), &json).map_err(|e| SessionError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| SessionError::io(&path, e.error))?;

        debug!(session_id, "Updated debug session");
        Ok(session)
    }

    /// Remove a record under its lock. `Ok(false)` when it was already gone.
    fn remove_record(&self, session_id: &str, path: &Path) -> Result<bool, SessionError> {
        let Some(_lock) = RecordLock::acquire(self.lock_path(session_id), session_id)? else {
            return Ok(false);
        };
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::io(path, e)),
        }
    }

    fn scan(&self) -> Result<SessionListing, SessionError> {
        let mut listing = SessionListing::default();
        if !self.sessions_dir.exists() {
            return Ok(listing);
        }

        let entries = fs::read_dir(&self.sessions_dir)
            .map_err(|e| SessionError::io(&self.sessions_dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| SessionError::io(&self.sessions_dir, e))?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some(RECORD_EXT) {
                continue;
            }

            match read_record(&path) {
                Ok(Some(session)) => listing.sessions.push(session),
                // Deleted between read_dir and open.
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping unreadable session record {:?}: {}", path, e);
                    listing.corrupt.push(CorruptRecord {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(listing)
    }

    fn checked_path(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        if !is_valid_id(session_id) {
            return Err(SessionError::InvalidId(session_id.to_string()));
        }
        Ok(self.record_path(session_id))
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir
            .join(format!("{}.{}", session_id, RECORD_EXT))
    }

    fn lock_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir
            .join(format!("{}.{}", session_id, LOCK_EXT))
    }
}

/// Exclusive hold on one record, released on drop.
struct RecordLock {
    path: PathBuf,
}

impl RecordLock {
    /// `Ok(None)` when the sessions directory does not exist.
    fn acquire(path: PathBuf, session_id: &str) -> Result<Option<Self>, SessionError> {
        for _ in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Some(Self { path })),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        warn!(session_id, "Removing stale session lock");
                        let _ = fs::remove_file(&path);
                    } else {
                        thread::sleep(LOCK_RETRY_INTERVAL);
                    }
                }
                Err(e) => return Err(SessionError::io(&path, e)),
            }
        }

        Err(SessionError::Locked {
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

fn write_and_sync(mut file: &fs::File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.write_all(b"\n")?;
    file.sync_all()
}

/// `Ok(None)` when the file does not exist.
fn read_record(path: &Path) -> Result<Option<DebugSession>, SessionError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SessionError::io(path, e)),
    };

    let session: DebugSession =
        serde_json::from_str(&content).map_err(|e| SessionError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if session.session_id != stem {
        return Err(SessionError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("record id {:?} does not match file name", session.session_id),
        });
    }

    Ok(Some(session))
}
