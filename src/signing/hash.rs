//! Digest helpers used by request signing.

use super::SigningError;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Hex encoded SHA256 hash.
pub fn hex_sha256(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content).as_slice())
}

/// HMAC with SHA256 hash.
pub fn hmac_sha256(key: &[u8], content: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut h = Hmac::<Sha256>::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    h.update(content);

    Ok(h.finalize().into_bytes().to_vec())
}

/// Hex encoded HMAC with SHA256 hash.
pub fn hex_hmac_sha256(key: &[u8], content: &[u8]) -> Result<String, SigningError> {
    hmac_sha256(key, content).map(hex::encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_digest() {
        assert_eq!(
            hex_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case_2() {
        let mac = hex_hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
