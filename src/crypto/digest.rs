//! SHA-256 helpers for key fingerprints.

use sha2::{Digest, Sha256};

/// Number of hex characters kept in a key fingerprint (64 bits).
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// SHA-256 of `data`, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Short, stable identifier for key material.
///
/// The first 64 bits of the SHA-256 digest; reveals nothing about the key.
pub fn fingerprint(data: &[u8]) -> String {
    let mut digest = sha256_hex(data);
    digest.truncate(FINGERPRINT_HEX_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hello_world() {
        assert_eq!(
            sha256_hex(b"Hello, World!"),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_fingerprint_is_prefix_of_digest() {
        let fp = fingerprint(b"");
        assert_eq!(fp, "e3b0c44298fc1c14");
        assert_eq!(fp.len(), FINGERPRINT_HEX_LEN);
    }

    #[test]
    fn test_fingerprint_differs_per_input() {
        assert_ne!(fingerprint(b"key-a"), fingerprint(b"key-b"));
    }
}
