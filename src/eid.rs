use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Number of digest bytes kept in an id (16 hex chars).
const ID_BYTES: usize = 8;

/// Bookmark identifier derived from its URL.
///
/// The same URL always maps to the same id, so re-ingesting a bookmark
/// lands on the existing record instead of creating a new one.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct Eid(String);

impl Display for Eid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Eid {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Eid(s.to_string()))
    }
}

impl Deref for Eid {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Eid {
    fn from(fr: &str) -> Self {
        Eid(fr.to_string())
    }
}

impl From<String> for Eid {
    fn from(fr: String) -> Self {
        Eid(fr)
    }
}

impl From<Eid> for String {
    fn from(fr: Eid) -> Self {
        fr.0
    }
}

impl Eid {
    /// Derive the id for a URL: truncated SHA-256 of the canonical form.
    pub fn from_url(url: &str) -> Eid {
        let digest = Sha256::digest(canonical_url(url).as_bytes());
        let hex = digest[..ID_BYTES]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        Eid(hex)
    }

    /// Whether a user-supplied string looks like an id rather than a URL.
    pub fn looks_like_id(s: &str) -> bool {
        s.len() == ID_BYTES * 2 && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}

/// Canonical form of a URL used both as the unique key and as id input.
pub fn canonical_url(url: &str) -> &str {
    url.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_pure_function_of_url() {
        let a = Eid::from_url("https://example.com");
        let b = Eid::from_url("https://example.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_id_differs_per_url() {
        let a = Eid::from_url("https://example.com/a");
        let b = Eid::from_url("https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(
            Eid::from_url("  https://example.com\n"),
            Eid::from_url("https://example.com")
        );
    }

    #[test]
    fn test_looks_like_id() {
        let id = Eid::from_url("https://example.com");
        assert!(Eid::looks_like_id(&id));
        assert!(!Eid::looks_like_id("https://example.com"));
    }
}
