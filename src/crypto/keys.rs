//! RSA key material: generation, base64-DER encoding and decoding, masking.
//!
//! Public keys travel as base64 of DER `SubjectPublicKeyInfo`, private keys as
//! base64 of unencrypted DER PKCS#8. Both forms are what the issuing backend
//! stores and what generated validators embed.

use crate::crypto::digest::fingerprint;
use crate::LicvaultError;
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::OnceCell;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::sync::RwLock;
use zeroize::Zeroizing;

/// Modulus size for freshly generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest modulus accepted for generation.
pub const MIN_KEY_BITS: usize = 2048;

/// Base64 characters of a PKCS#8 private key shown by [`mask_private_key`].
///
/// Covers only the outer DER SEQUENCE header and version field.
const MASK_HEADER_CHARS: usize = 8;

/// Generate a new RSA private key with the given modulus size.
pub fn generate_rsa_key(bits: usize) -> Result<RsaPrivateKey, LicvaultError> {
    if bits < MIN_KEY_BITS {
        return Err(LicvaultError::KeyMaterial(format!(
            "RSA modulus must be at least {} bits, got {}",
            MIN_KEY_BITS, bits
        )));
    }
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| LicvaultError::KeyMaterial(format!("RSA key generation failed: {}", e)))
}

/// Encode a public key as base64 DER (SubjectPublicKeyInfo).
pub fn encode_public_key(key: &RsaPublicKey) -> Result<String, LicvaultError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| LicvaultError::KeyMaterial(format!("Failed to encode public key: {}", e)))?;
    Ok(STANDARD.encode(der.as_bytes()))
}

/// Encode a private key as base64 DER (PKCS#8).
pub fn encode_private_key(key: &RsaPrivateKey) -> Result<String, LicvaultError> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| LicvaultError::KeyMaterial(format!("Failed to encode private key: {}", e)))?;
    Ok(STANDARD.encode(der.as_bytes()))
}

/// Most recently decoded public key and its base64 form.
type KeySlot = RwLock<Option<(String, RsaPublicKey)>>;

/// One slot. Decoding a different key evicts the previous one.
static PUBLIC_KEY_CACHE: OnceCell<KeySlot> = OnceCell::new();

fn cached_key(slot: &KeySlot, b64: &str) -> Option<RsaPublicKey> {
    let guard = slot.read().ok()?;
    match guard.as_ref() {
        Some((cached, key)) if cached == b64 => Some(key.clone()),
        _ => None,
    }
}

fn remember_key(slot: &KeySlot, b64: &str, key: &RsaPublicKey) {
    if let Ok(mut guard) = slot.write() {
        *guard = Some((b64.to_string(), key.clone()));
    }
}

/// Decode a base64 DER public key.
///
/// The last decoded key is cached; private keys never are.
pub fn decode_public_key(b64: &str) -> Result<RsaPublicKey, LicvaultError> {
    let b64 = b64.trim();
    let slot = PUBLIC_KEY_CACHE.get_or_init(|| RwLock::new(None));
    if let Some(key) = cached_key(slot, b64) {
        return Ok(key);
    }

    let der = STANDARD
        .decode(b64)
        .map_err(|e| LicvaultError::KeyMaterial(format!("Invalid public key base64: {}", e)))?;
    let key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| LicvaultError::KeyMaterial(format!("Invalid RSA public key: {}", e)))?;

    remember_key(slot, b64, &key);
    Ok(key)
}

/// Decode a base64 DER (PKCS#8) private key.
pub fn decode_private_key(b64: &str) -> Result<RsaPrivateKey, LicvaultError> {
    let der = Zeroizing::new(
        STANDARD
            .decode(b64.trim())
            .map_err(|e| LicvaultError::KeyMaterial(format!("Invalid private key base64: {}", e)))?,
    );
    RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| LicvaultError::KeyMaterial(format!("Invalid RSA private key: {}", e)))
}

/// Decode both halves and check that they belong together.
pub fn check_key_pair(
    public_b64: &str,
    private_b64: &str,
) -> Result<(RsaPublicKey, RsaPrivateKey), LicvaultError> {
    let public = decode_public_key(public_b64)?;
    let private = decode_private_key(private_b64)?;
    if private.to_public_key() != public {
        return Err(LicvaultError::KeyMaterial(
            "Public and private keys do not form a pair".to_string(),
        ));
    }
    Ok((public, private))
}

/// Display form of a private key.
///
/// Shows the DER header, the decoded length and a SHA-256 fingerprint:
/// `MIIEvQIB...[1217 bytes, sha256:1f2e3d4c5b6a7980]`.
pub fn mask_private_key(private_b64: &str) -> String {
    let trimmed = private_b64.trim();
    if trimmed.is_empty() {
        return "Not generated".to_string();
    }

    let (len, fp) = match STANDARD.decode(trimmed) {
        Ok(der) => {
            let der = Zeroizing::new(der);
            (der.len(), fingerprint(&der))
        }
        Err(_) => (trimmed.len(), fingerprint(trimmed.as_bytes())),
    };

    let header: String = if trimmed.len() > MASK_HEADER_CHARS * 4 {
        trimmed.chars().take(MASK_HEADER_CHARS).collect()
    } else {
        "********".to_string()
    };

    format!("{}...[{} bytes, sha256:{}]", header, len, fp)
}

/// Per-license key pair.
///
/// The public half is what a client sets as `LICENSE_KEY`; the private half
/// stays with the issuer and signs that license.
#[derive(Clone)]
pub struct LicenseKeyPair {
    /// Base64 DER public key, handed to the client.
    pub public_key: String,

    /// Base64 DER private key, kept by the issuer to sign that license.
    pub private_key: String,
}

impl LicenseKeyPair {
    /// Generate a fresh 2048-bit pair.
    pub fn generate() -> Result<Self, LicvaultError> {
        Self::from_private_key(&generate_rsa_key(DEFAULT_KEY_BITS)?)
    }

    /// Build the encoded pair from an existing private key.
    pub fn from_private_key(key: &RsaPrivateKey) -> Result<Self, LicvaultError> {
        Ok(Self {
            public_key: encode_public_key(&key.to_public_key())?,
            private_key: encode_private_key(key)?,
        })
    }

    /// Decode the signing half.
    pub fn signing_key(&self) -> Result<RsaPrivateKey, LicvaultError> {
        decode_private_key(&self.private_key)
    }
}

impl fmt::Debug for LicenseKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseKeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &mask_private_key(&self.private_key))
            .finish()
    }
}
