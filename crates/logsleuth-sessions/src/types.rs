use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Current on-disk record schema.
pub const RECORD_VERSION: u32 = 1;

/// A named scope that isolates one debugging task's log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSession {
    pub version: u32,
    pub session_id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub prefix: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Sub-scoped prefixes handed out for this session, in issue order.
    #[serde(default)]
    pub scoped_prefixes: Vec<String>,
}

impl DebugSession {
    pub fn new(session_id: String, label: String, created_at: DateTime<Utc>) -> Self {
        let prefix = base_prefix(&session_id);
        Self {
            version: RECORD_VERSION,
            session_id,
            label,
            created_at,
            prefix,
            status: SessionStatus::Open,
            closed_at: None,
            scoped_prefixes: Vec::new(),
        }
    }

    /// `[DEBUG-<id>-<MODULE>-<CATEGORY>]`
    pub fn scoped(&self, module: Module, category: Category) -> String {
        format!("[DEBUG-{}-{}-{}]", self.session_id, module, category)
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Whole days elapsed between creation and `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// `[DEBUG-<id>]`
pub fn base_prefix(session_id: &str) -> String {
    format!("[DEBUG-{}]", session_id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Open => write!(f, "open"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Application area a sub-scoped prefix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Ui,
    Api,
    Db,
    Lambda,
    Auth,
    Misc,
}

impl Module {
    /// Lenient parse: anything unrecognised becomes [`Module::Misc`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "UI" => Module::Ui,
            "API" => Module::Api,
            "DB" => Module::Db,
            "LAMBDA" => Module::Lambda,
            "AUTH" => Module::Auth,
            _ => Module::Misc,
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Module::Ui => "UI",
            Module::Api => "API",
            Module::Db => "DB",
            Module::Lambda => "LAMBDA",
            Module::Auth => "AUTH",
            Module::Misc => "MISC",
        };
        f.write_str(s)
    }
}

/// Kind of information a sub-scoped prefix tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    State,
    #[default]
    Flow,
    Error,
    Timing,
    Data,
    Validate,
}

impl Category {
    /// Lenient parse: anything unrecognised becomes [`Category::Flow`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "STATE" => Category::State,
            "ERROR" => Category::Error,
            "TIMING" => Category::Timing,
            "DATA" => Category::Data,
            "VALIDATE" => Category::Validate,
            _ => Category::Flow,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::State => "STATE",
            Category::Flow => "FLOW",
            Category::Error => "ERROR",
            Category::Timing => "TIMING",
            Category::Data => "DATA",
            Category::Validate => "VALIDATE",
        };
        f.write_str(s)
    }
}

/// A record file that could not be parsed.
#[derive(Debug, Clone)]
pub struct CorruptRecord {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of listing the registry: readable sessions plus skipped records.
#[derive(Debug, Clone, Default)]
pub struct SessionListing {
    /// Newest first.
    pub sessions: Vec<DebugSession>,
    pub corrupt: Vec<CorruptRecord>,
}
