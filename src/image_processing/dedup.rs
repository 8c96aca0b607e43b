use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// Fixed-length content digest of a crop's raw pixel bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    /// First 8 hex characters, enough to tell crops apart in logs
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Digests of the crops accepted so far in one category run.
/// Never shared between categories and never persisted.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<ContentDigest>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, digest: &ContentDigest) -> bool {
        self.seen.contains(digest)
    }

    /// Record a digest; returns `false` when it was already present
    pub fn insert(&mut self, digest: ContentDigest) -> bool {
        self.seen.insert(digest)
    }

    /// Drop a digest whose face never made it to disk
    pub fn forget(&mut self, digest: &ContentDigest) -> bool {
        self.seen.remove(digest)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = ContentDigest::of(b"face pixels");
        let b = ContentDigest::of(b"face pixels");
        let c = ContentDigest::of(b"other pixels");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string().len(), 64);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_ledger_insert_and_forget() {
        let mut ledger = DedupLedger::new();
        let digest = ContentDigest::of(&[1, 2, 3]);

        assert!(ledger.is_empty());
        assert!(ledger.insert(digest));
        assert!(ledger.contains(&digest));
        assert!(!ledger.insert(digest));
        assert_eq!(ledger.len(), 1);

        assert!(ledger.forget(&digest));
        assert!(!ledger.contains(&digest));
        assert!(!ledger.forget(&digest));
    }
}
