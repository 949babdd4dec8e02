use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of the exact chunk text that was sent for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hash: String) -> Result<Self, String> {
        if hash.len() != 64 {
            return Err("Hash must be 64 characters long (SHA-256)".to_string());
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("Hash must contain only hexadecimal characters".to_string());
        }

        Ok(Self(hash.to_lowercase()))
    }

    pub fn of_text(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = ContentHash::of_text("Senior engineer at Acme");
        let b = ContentHash::of_text("Senior engineer at Acme");
        let c = ContentHash::of_text("Senior engineer at Acme.");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_rejects_malformed_hash() {
        assert!(ContentHash::new("abc".to_string()).is_err());
        assert!(ContentHash::new("z".repeat(64)).is_err());
        let upper = "A".repeat(64);
        assert_eq!(ContentHash::new(upper).unwrap().as_str(), "a".repeat(64));
    }
}
