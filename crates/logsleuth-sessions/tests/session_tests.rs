use std::collections::HashSet;
use std::fs;

use chrono::{DateTime, Duration, TimeZone, Utc};
use logsleuth_sessions::{
    Category, DebugSession, Module, SessionError, SessionIdSource, SessionRegistry,
    SessionStatus, MAX_ID_ATTEMPTS,
};
use tempfile::TempDir;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap()
}

/// Helper: write a session record file directly, bypassing the registry.
fn write_record(dir: &TempDir, id: &str, label: &str, created_at: DateTime<Utc>) {
    let session = DebugSession::new(id.to_string(), label.to_string(), created_at);
    fs::write(
        dir.path().join(format!("{}.json", id)),
        serde_json::to_string_pretty(&session).unwrap(),
    )
    .unwrap();
}

/// Always proposes the same id.
struct FixedIdSource(&'static str);

impl SessionIdSource for FixedIdSource {
    fn generate(&self, _label: &str, _now: DateTime<Utc>, _attempt: u32) -> String {
        self.0.to_string()
    }
}

/// Collides on the first attempt, then succeeds.
struct SecondTryIdSource;

impl SessionIdSource for SecondTryIdSource {
    fn generate(&self, _label: &str, _now: DateTime<Utc>, attempt: u32) -> String {
        if attempt == 0 {
            "TAKEN01".to_string()
        } else {
            format!("FRESH0{}", attempt)
        }
    }
}

// ============================================================
// Create / resolve
// ============================================================

#[test]
fn test_create_then_resolve_returns_base_prefix() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let created = registry.create_session("auth-issue").unwrap();
    let resolved = registry.resolve(&created.session_id).unwrap();

    assert_eq!(resolved.prefix, format!("[DEBUG-{}]", created.session_id));
    assert_eq!(resolved.label, "auth-issue");
    assert!(resolved.session_id.starts_with("AUTH"));
    assert_eq!(resolved.status, SessionStatus::Open);
    assert_eq!(resolved, created);
}

#[test]
fn test_create_is_written_through() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let created = registry.create_session("payment flow").unwrap();

    let path = dir.path().join(format!("{}.json", created.session_id));
    let on_disk: DebugSession =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(on_disk.session_id, created.session_id);
    assert_eq!(on_disk.version, 1);
}

#[test]
fn test_create_in_missing_directory() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().join("nested").join("sessions"));

    let created = registry.create_session("x").unwrap();

    assert!(registry.resolve(&created.session_id).is_ok());
}

#[test]
fn test_resolve_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let err = registry.resolve("NOPE1234").unwrap_err();
    assert!(matches!(err, SessionError::NotFound(ref id) if id == "NOPE1234"));
}

#[test]
fn test_resolve_rejects_path_like_ids() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let err = registry.resolve("../secrets").unwrap_err();
    assert!(matches!(err, SessionError::InvalidId(_)));
}

// ============================================================
// Id uniqueness
// ============================================================

#[test]
fn test_sequential_creates_yield_distinct_ids() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let ids: HashSet<String> = (0..50)
        .map(|_| registry.create_session("same label").unwrap().session_id)
        .collect();

    assert_eq!(ids.len(), 50);
    assert_eq!(registry.list_sessions(None).unwrap().len(), 50);
}

#[test]
fn test_concurrent_creates_never_duplicate_or_corrupt() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let ids: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    (0..10)
                        .map(|_| registry.create_session("race").unwrap().session_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 80);

    let listing = registry.list_report(None).unwrap();
    assert_eq!(listing.sessions.len(), 80);
    assert!(listing.corrupt.is_empty());
}

#[test]
fn test_collision_is_retried() {
    let dir = TempDir::new().unwrap();
    write_record(&dir, "TAKEN01", "existing", fixed_now());
    let registry =
        SessionRegistry::with_dir(dir.path().to_path_buf()).with_id_source(SecondTryIdSource);

    let created = registry.create_session("new").unwrap();

    assert_eq!(created.session_id, "FRESH01");
    assert_eq!(registry.resolve("TAKEN01").unwrap().label, "existing");
}

#[test]
fn test_exhausted_id_space_is_a_defined_failure() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf())
        .with_id_source(FixedIdSource("FIXED01"));

    registry.create_session("first").unwrap();
    let err = registry.create_session("second").unwrap_err();

    assert!(matches!(
        err,
        SessionError::ExhaustedIdSpace { attempts } if attempts == MAX_ID_ATTEMPTS
    ));
    assert_eq!(registry.resolve("FIXED01").unwrap().label, "first");
}

// ============================================================
// List
// ============================================================

#[test]
fn test_list_is_newest_first() {
    let dir = TempDir::new().unwrap();
    let now = fixed_now();
    write_record(&dir, "OLD0001", "old", now - Duration::days(5));
    write_record(&dir, "NEW0001", "new", now - Duration::hours(1));
    write_record(&dir, "MID0001", "mid", now - Duration::days(2));
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let ids: Vec<String> = registry
        .list_report_at(None, now)
        .unwrap()
        .sessions
        .into_iter()
        .map(|s| s.session_id)
        .collect();

    assert_eq!(ids, vec!["NEW0001", "MID0001", "OLD0001"]);
}

#[test]
fn test_list_max_age_filter() {
    let dir = TempDir::new().unwrap();
    let now = fixed_now();
    write_record(&dir, "OLD0001", "old", now - Duration::days(10));
    write_record(&dir, "NEW0001", "new", now - Duration::days(2));
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let listing = registry.list_report_at(Some(7), now).unwrap();

    assert_eq!(listing.sessions.len(), 1);
    assert_eq!(listing.sessions[0].session_id, "NEW0001");
}

#[test]
fn test_list_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().join("does-not-exist"));

    assert!(registry.list_sessions(None).unwrap().is_empty());
}

#[test]
fn test_corrupt_record_is_skipped_and_reported() {
    let dir = TempDir::new().unwrap();
    write_record(&dir, "GOOD0001", "fine", fixed_now());
    fs::write(dir.path().join("BAD00001.json"), "{ not json").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let listing = registry.list_report(None).unwrap();

    assert_eq!(listing.sessions.len(), 1);
    assert_eq!(listing.sessions[0].session_id, "GOOD0001");
    assert_eq!(listing.corrupt.len(), 1);
    assert!(listing.corrupt[0].path.ends_with("BAD00001.json"));

    // The good record stays reachable; the bad one reports corruption.
    assert!(registry.resolve("GOOD0001").is_ok());
    assert!(matches!(
        registry.resolve("BAD00001").unwrap_err(),
        SessionError::Corrupt { .. }
    ));
}

#[test]
fn test_record_with_mismatched_id_is_corrupt() {
    let dir = TempDir::new().unwrap();
    write_record(&dir, "REAL0001", "x", fixed_now());
    fs::rename(
        dir.path().join("REAL0001.json"),
        dir.path().join("FAKE0001.json"),
    )
    .unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let listing = registry.list_report(None).unwrap();
    assert!(listing.sessions.is_empty());
    assert_eq!(listing.corrupt.len(), 1);
}

// ============================================================
// Delete / cleanup
// ============================================================

#[test]
fn test_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    assert!(!registry.delete_session("GHOST001").unwrap());
    assert!(!registry.delete_session("GHOST001").unwrap());

    let created = registry.create_session("temp").unwrap();
    assert!(registry.delete_session(&created.session_id).unwrap());
    assert!(!registry.delete_session(&created.session_id).unwrap());
    assert!(matches!(
        registry.resolve(&created.session_id).unwrap_err(),
        SessionError::NotFound(_)
    ));
}

#[test]
fn test_cleanup_older_than_removes_only_old_sessions() {
    let dir = TempDir::new().unwrap();
    let now = fixed_now();
    write_record(&dir, "AGED0010", "ten days", now - Duration::days(10));
    write_record(&dir, "AGED0002", "two days", now - Duration::days(2));
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let deleted = registry.cleanup_older_than_at(7, now).unwrap();

    assert_eq!(deleted, 1);
    assert!(registry.resolve("AGED0010").is_err());
    assert!(registry.resolve("AGED0002").is_ok());
}

#[test]
fn test_expired_sessions_match_cleanup_cutoff() {
    let dir = TempDir::new().unwrap();
    let now = fixed_now();
    write_record(&dir, "HALF0007", "seven and a half", now - Duration::hours(7 * 24 + 12));
    write_record(&dir, "HALF0006", "six and a half", now - Duration::hours(6 * 24 + 12));
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    let expired: Vec<String> = registry
        .expired_sessions_at(7, now)
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(expired, vec!["HALF0007".to_string()]);

    assert_eq!(registry.cleanup_older_than_at(7, now).unwrap(), 1);
    assert!(registry.resolve("HALF0007").is_err());
    assert!(registry.resolve("HALF0006").is_ok());
}

#[test]
fn test_cleanup_leaves_corrupt_records_alone() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("BAD00001.json"), "").unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    assert_eq!(registry.cleanup_older_than_at(0, fixed_now()).unwrap(), 0);
    assert!(dir.path().join("BAD00001.json").exists());
}

// ============================================================
// Close / scoped prefixes
// ============================================================

#[test]
fn test_close_session() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());
    let created = registry.create_session("close me").unwrap();

    let closed = registry.close_session(&created.session_id).unwrap();
    assert_eq!(closed.status, SessionStatus::Closed);
    let first_close = closed.closed_at.unwrap();

    let again = registry.close_session(&created.session_id).unwrap();
    assert_eq!(again.closed_at, Some(first_close));
    assert_eq!(registry.resolve(&created.session_id).unwrap(), again);

    // No temp files left behind.
    let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_close_unknown_session_is_not_found() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());

    assert!(matches!(
        registry.close_session("MISSING1").unwrap_err(),
        SessionError::NotFound(_)
    ));
}

#[test]
fn test_scoped_prefixes_are_recorded_once() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());
    let created = registry.create_session("auth").unwrap();
    let id = created.session_id.clone();

    let ui = registry
        .scoped_prefix(&id, Module::Ui, Category::Flow)
        .unwrap();
    let api = registry
        .scoped_prefix(&id, Module::parse("api"), Category::parse("error"))
        .unwrap();
    registry
        .scoped_prefix(&id, Module::Ui, Category::Flow)
        .unwrap();

    assert_eq!(ui, format!("[DEBUG-{}-UI-FLOW]", id));
    assert_eq!(api, format!("[DEBUG-{}-API-ERROR]", id));
    assert_eq!(registry.resolve(&id).unwrap().scoped_prefixes, vec![ui, api]);
}

#[test]
fn test_concurrent_updates_keep_record_readable() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::with_dir(dir.path().to_path_buf());
    let modules = [
        Module::Ui,
        Module::Api,
        Module::Db,
        Module::Lambda,
        Module::Auth,
        Module::Misc,
    ];

    for round in 0..20 {
        let created = registry.create_session(&format!("race {}", round)).unwrap();
        let id = created.session_id.as_str();

        std::thread::scope(|scope| {
            for module in modules {
                let registry = &registry;
                scope.spawn(move || {
                    registry
                        .scoped_prefix(id, module, Category::Timing)
                        .unwrap();
                });
            }
        });

        let session = registry.resolve(id).unwrap();
        let recorded: HashSet<&String> = session.scoped_prefixes.iter().collect();
        assert_eq!(session.scoped_prefixes.len(), modules.len());
        assert_eq!(recorded.len(), modules.len());
    }

    let stray: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) != Some("json"))
        .collect();
    assert!(stray.is_empty(), "leftover files: {:?}", stray);
}
