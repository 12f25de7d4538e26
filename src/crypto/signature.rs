//! Canonical serialization and RSA-PSS signatures over license content.
//!
//! The signing input is the canonical JSON of the `license` object:
//! compact, with object keys sorted by code point at every depth and
//! serde_json string escaping. Signatures are RSA-PSS with SHA-256, MGF1-SHA-256
//! and a 32-byte salt, base64-encoded.

use crate::protocol::models::License;
use crate::LicvaultError;
use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// PSS salt length in bytes (the SHA-256 digest size).
pub const PSS_SALT_LEN: usize = 32;

/// Serialize `value` canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        // Scalars have a single compact rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn pss() -> Pss {
    Pss::new_with_salt::<Sha256>(PSS_SALT_LEN)
}

/// Sign an arbitrary JSON value's canonical form.
pub fn sign_value(value: &Value, private_key: &RsaPrivateKey) -> Result<String, LicvaultError> {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    let signature = private_key
        .sign_with_rng(&mut rand::thread_rng(), pss(), &digest)
        .map_err(|e| LicvaultError::KeyMaterial(format!("Signing failed: {}", e)))?;
    Ok(STANDARD.encode(signature))
}

/// Sign a license.
pub fn sign_license(license: &License, private_key: &RsaPrivateKey) -> Result<String, LicvaultError> {
    sign_value(&license.to_value()?, private_key)
}

/// Check a signature over a license's JSON form.
///
/// Returns `false` for any mismatch, including an undecodable signature.
pub fn verify_license(license: &Value, signature_b64: &str, public_key: &RsaPublicKey) -> bool {
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let digest = Sha256::digest(canonical_json(license).as_bytes());
    public_key.verify(pss(), &digest, &signature).is_ok()
}

/// [`verify_license`] as a `Result`, for `?` pipelines.
pub fn require_valid_signature(
    license: &Value,
    signature_b64: &str,
    public_key: &RsaPublicKey,
) -> Result<(), LicvaultError> {
    if verify_license(license, signature_b64, public_key) {
        Ok(())
    } else {
        Err(LicvaultError::SignatureInvalid)
    }
}
