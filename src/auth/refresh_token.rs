/// Refresh Token Slot Fingerprints
///
/// The directory never stores a refresh token in plaintext. Each principal's single
/// refresh slot holds the SHA-256 digest of the token that was last issued, so
/// comparing digests is comparing the presented token byte-for-byte with the issued
/// one.

use sha2::{Digest, Sha256};

/// Hash a refresh token using SHA-256 (lowercase hex)
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether `token` is the one recorded in `slot`.
pub fn matches_slot(token: &str, slot: Option<&str>) -> bool {
    match slot {
        Some(stored) => fingerprint(token) == stored,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hashing() {
        let hash1 = fingerprint("some.refresh.token");
        let hash2 = fingerprint("some.refresh.token");

        assert_eq!(hash1, hash2);
        assert_ne!("some.refresh.token", hash1);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        assert_ne!(fingerprint("token-a"), fingerprint("token-b"));
    }

    #[test]
    fn test_empty_slot_never_matches() {
        assert!(!matches_slot("token-a", None));
    }

    #[test]
    fn test_slot_matching() {
        let slot = fingerprint("token-a");
        assert!(matches_slot("token-a", Some(&slot)));
        assert!(!matches_slot("token-b", Some(&slot)));
    }
}
