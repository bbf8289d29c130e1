//! Data models for pastes and edits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Passphrase naming a shared paste; the only access key for a room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Passphrase(String);

impl Passphrase {
    /// Generate a random 16 character hex passphrase (64 random bits).
    ///
    /// The version and variant bits of a v4 UUID sit in different halves, so
    /// folding the halves together leaves every bit random.
    pub fn generate() -> Self {
        let bits = Uuid::new_v4().as_u128();
        let folded = (bits >> 64) as u64 ^ bits as u64;
        Self(format!("{:016x}", folded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Passphrase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("Passphrase must not be empty".to_string());
        }
        Ok(Passphrase(s.to_string()))
    }
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Passphrase {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Authoritative state of a room at one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub version: u64,
    pub content: Arc<str>,
}

/// A client's proposed full replacement of a room's content
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Edit {
    /// Version the client believed was current
    pub base_version: u64,
    pub new_content: String,
}

/// Room summary served by the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub passphrase: Passphrase,
    pub version: u64,
    pub content: Arc<str>,
    pub members: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Process-wide counters served by the HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub rooms: usize,
    pub connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_from_str() {
        let p: Passphrase = "abc".parse().unwrap();
        assert_eq!(p.as_str(), "abc");
        assert_eq!(p.to_string(), "abc");
    }

    #[test]
    fn test_passphrase_rejects_empty() {
        assert!("".parse::<Passphrase>().is_err());
    }

    #[test]
    fn test_passphrase_is_case_sensitive() {
        let lower: Passphrase = "abc".parse().unwrap();
        let upper: Passphrase = "ABC".parse().unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_passphrase_generate() {
        let a = Passphrase::generate();
        let b = Passphrase::generate();
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_passphrase_generate_has_no_fixed_digits() {
        let generated: Vec<Passphrase> = (0..64).map(|_| Passphrase::generate()).collect();
        for index in 0..16 {
            let digits: std::collections::HashSet<u8> = generated
                .iter()
                .map(|p| p.as_str().as_bytes()[index])
                .collect();
            assert!(digits.len() > 1, "digit {} never varies", index);
        }
    }

    #[test]
    fn test_passphrase_serializes_as_string() {
        let p: Passphrase = "secret".parse().unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"secret\"");
    }

    #[test]
    fn test_edit_deserialize() {
        let edit: Edit =
            serde_json::from_str(r#"{"base_version": 3, "new_content": "hi"}"#).unwrap();
        assert_eq!(edit.base_version, 3);
        assert_eq!(edit.new_content, "hi");
    }

    #[test]
    fn test_edit_rejects_negative_version() {
        let result = serde_json::from_str::<Edit>(r#"{"base_version": -1, "new_content": ""}"#);
        assert!(result.is_err());
    }
}
