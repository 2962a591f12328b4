use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Produces candidate session ids. The registry retries on collision, so an
/// implementation only has to vary its output across `attempt` values.
pub trait SessionIdSource: Send + Sync {
    fn generate(&self, label: &str, now: DateTime<Utc>, attempt: u32) -> String;
}

/// Default id scheme: a readable tag taken from the label, padded to eight
/// characters with hex digits of a salted hash, e.g. `AUTH3F9A`, `DB07C21E`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashedIdSource;

const TAG_LEN: usize = 4;
const ID_LEN: usize = 8;

impl SessionIdSource for HashedIdSource {
    fn generate(&self, label: &str, now: DateTime<Utc>, attempt: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(attempt.to_le_bytes());
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let hash = hex::encode_upper(hasher.finalize());

        let tag = label_tag(label);
        let hash_len = ID_LEN - tag.len();
        format!("{}{}", tag, &hash[..hash_len])
    }
}

/// Up to four leading alphanumerics of the label, uppercased; `DBG` if none.
fn label_tag(label: &str) -> String {
    let tag: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(TAG_LEN)
        .collect::<String>()
        .to_uppercase();

    if tag.is_empty() {
        "DBG".to_string()
    } else {
        tag
    }
}

/// Ids are plain ASCII alphanumerics; anything else could escape the
/// sessions directory.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 32 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_tag() {
        assert_eq!(label_tag("auth-issue"), "AUTH");
        assert_eq!(label_tag("db"), "DB");
        assert_eq!(label_tag("  --  "), "DBG");
        assert_eq!(label_tag(""), "DBG");
        assert_eq!(label_tag("a-b-c-d-e"), "ABCD");
    }

    #[test]
    fn test_hashed_ids_are_short_and_alphanumeric() {
        let source = HashedIdSource;
        let now = Utc::now();
        for label in ["auth-issue", "", "x", "!!!"] {
            let id = source.generate(label, now, 0);
            assert_eq!(id.len(), 8, "bad length: {}", id);
            assert!(is_valid_id(&id));
            assert_eq!(id, id.to_uppercase());
        }
    }

    #[test]
    fn test_attempts_vary_output() {
        let source = HashedIdSource;
        let now = Utc::now();
        let ids: std::collections::HashSet<String> =
            (0..5).map(|a| source.generate("auth", now, a)).collect();
        assert!(ids.len() > 1);
    }

    #[test]
    fn test_is_valid_id_rejects_paths() {
        assert!(is_valid_id("AUTH3F9A"));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("A B"));
    }
}
