//! Hybrid RSA-OAEP + AES-256-GCM encryption of license envelopes.
//!
//! Wire format (the entire `.lic` file):
//! ```text
//! base64(RSA-OAEP(aes_key)) ":" base64(iv[12] || tag[16] || ciphertext)
//! ```
//! OAEP uses SHA-256 for both the label hash and MGF1. Base64 is the standard
//! padded alphabet.

use crate::LicvaultError;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

/// AES-256 key length in bytes.
pub const AES_KEY_LEN: usize = 32;

/// GCM nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Separator between the wrapped key and the sealed payload.
pub const WIRE_SEPARATOR: char = ':';

/// Encrypt `plaintext` for the holder of `recipient`'s private key.
///
/// # Errors
/// `KeyMaterial` when `recipient` is too small to wrap an AES-256 key with
/// OAEP-SHA256, or the cipher cannot be set up.
pub fn hybrid_encrypt(plaintext: &str, recipient: &RsaPublicKey) -> Result<String, LicvaultError> {
    let mut rng = rand::thread_rng();

    let mut aes_key = Zeroizing::new([0u8; AES_KEY_LEN]);
    rng.fill_bytes(&mut aes_key[..]);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(&aes_key[..])
        .map_err(|e| LicvaultError::KeyMaterial(format!("AES key setup failed: {}", e)))?;

    let mut sealed = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut sealed)
        .map_err(|_| LicvaultError::KeyMaterial("AES-GCM encryption failed".to_string()))?;

    let wrapped_key = recipient
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &aes_key[..])
        .map_err(|e| LicvaultError::KeyMaterial(format!("RSA-OAEP wrap failed: {}", e)))?;

    let mut payload = Vec::with_capacity(IV_LEN + TAG_LEN + sealed.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(tag.as_slice());
    payload.extend_from_slice(&sealed);

    Ok(format!(
        "{}{}{}",
        STANDARD.encode(wrapped_key),
        WIRE_SEPARATOR,
        STANDARD.encode(payload)
    ))
}

/// Decrypt a wire string with the recipient's private key.
///
/// # Errors
/// `DecryptionError` when the separator is missing, either half is not valid
/// base64, the payload is shorter than IV + tag, the key unwrap fails, the
/// unwrapped key has the wrong length, GCM authentication fails, or the
/// plaintext is not UTF-8.
pub fn hybrid_decrypt(wire: &str, recipient: &RsaPrivateKey) -> Result<String, LicvaultError> {
    let (key_b64, payload_b64) = wire.trim().split_once(WIRE_SEPARATOR).ok_or_else(|| {
        LicvaultError::DecryptionError("Invalid hybrid encrypted data format".to_string())
    })?;

    let wrapped_key = STANDARD
        .decode(key_b64)
        .map_err(|e| LicvaultError::DecryptionError(format!("Invalid wrapped key base64: {}", e)))?;
    let payload = STANDARD
        .decode(payload_b64)
        .map_err(|e| LicvaultError::DecryptionError(format!("Invalid payload base64: {}", e)))?;

    if payload.len() < IV_LEN + TAG_LEN {
        return Err(LicvaultError::DecryptionError(format!(
            "Payload too short: {} bytes",
            payload.len()
        )));
    }

    let aes_key = Zeroizing::new(
        recipient
            .decrypt(Oaep::new::<Sha256>(), &wrapped_key)
            .map_err(|_| LicvaultError::DecryptionError("RSA-OAEP unwrap failed".to_string()))?,
    );
    if aes_key.len() != AES_KEY_LEN {
        return Err(LicvaultError::DecryptionError(format!(
            "Unwrapped key has {} bytes, expected {}",
            aes_key.len(),
            AES_KEY_LEN
        )));
    }

    let (iv, rest) = payload.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let cipher = Aes256Gcm::new_from_slice(&aes_key)
        .map_err(|e| LicvaultError::DecryptionError(format!("AES key setup failed: {}", e)))?;
    let mut plaintext = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut plaintext, Tag::from_slice(tag))
        .map_err(|_| {
            LicvaultError::DecryptionError("AES-GCM authentication failed".to_string())
        })?;

    String::from_utf8(plaintext)
        .map_err(|e| LicvaultError::DecryptionError(format!("Plaintext is not UTF-8: {}", e)))
}
