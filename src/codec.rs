//! The `.lic` codec: sign, wrap and encrypt on the way out; decrypt and
//! parse on the way in.
//!
//! A license file is the compact JSON envelope `{"license": ..., "signature": ...}`
//! run through [`hybrid_encrypt`] under a master public key.

use crate::clock::Clock;
use crate::crypto::hybrid::{hybrid_decrypt, hybrid_encrypt};
use crate::crypto::signature::{sign_license, verify_license};
use crate::keystore::{MasterKeyPair, MasterKeyStore};
use crate::policy::expiry::check_expiry;
use crate::protocol::models::{
    License, LicenseEnvelope, LicenseInfo, ParsingStatus, SignatureStatus, ValidationResult,
    ValidityStatus,
};
use crate::LicvaultError;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

/// Issue a license file signed and encrypted with the given master pair.
pub fn issue(license: &License, master: &MasterKeyPair) -> Result<String, LicvaultError> {
    let private = master.private()?;
    issue_signed_by(license, &private, &private.to_public_key())
}

/// Issue a license file signed with a per-license key and encrypted for the
/// master public key.
pub fn issue_signed_by(
    license: &License,
    signing_key: &RsaPrivateKey,
    master_public: &RsaPublicKey,
) -> Result<String, LicvaultError> {
    license.validate()?;
    let envelope = LicenseEnvelope {
        license: license.to_value()?,
        signature: sign_license(license, signing_key)?,
    };
    let wire = hybrid_encrypt(&envelope.to_json()?, master_public)?;
    debug!(license_id = %license.id, tenant_id = %license.tenant_id, "Issued license file");
    Ok(wire)
}

/// Decrypt and parse a license file. The signature is not checked.
///
/// # Errors
/// * `DecryptionError` - malformed wire string or any cipher failure
/// * `ParseError` - the plaintext is not a `{license, signature}` envelope
pub fn open(wire: &str, master_private: &RsaPrivateKey) -> Result<LicenseEnvelope, LicvaultError> {
    let plaintext = hybrid_decrypt(wire, master_private)?;
    LicenseEnvelope::from_json(&plaintext)
}

/// [`open`] against every key in the store: the active pair first, then
/// retired pairs, most recently retired first.
pub fn open_with_keyring(wire: &str, store: &MasterKeyStore) -> Result<LicenseEnvelope, LicvaultError> {
    let mut last_error = None;

    for key in store.decryption_order()? {
        let private = match key.private() {
            Ok(private) => private,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };
        match open(wire, &private) {
            Ok(envelope) => {
                debug!(key_id = %key.id, active = key.is_active, "Opened license file");
                return Ok(envelope);
            }
            Err(e @ LicvaultError::DecryptionError(_)) => last_error = Some(e),
            // Decrypted with this key, so no other key will do better.
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| LicvaultError::KeyStore("Keyring is empty".to_string())))
}

/// Evaluate a license file without acting on it.
///
/// Parsing, signature and validity are judged independently, and
/// `license_info` is present whenever the license parsed.
pub fn inspect<C: Clock + ?Sized>(
    wire: &str,
    master_private: &RsaPrivateKey,
    license_key: &RsaPublicKey,
    clock: &C,
) -> ValidationResult {
    match open(wire, master_private) {
        Ok(envelope) => inspect_envelope(&envelope, license_key, clock),
        Err(e) => ValidationResult::failed(e.to_string()),
    }
}

/// [`inspect`] using the keyring to decrypt.
pub fn inspect_with_keyring<C: Clock + ?Sized>(
    wire: &str,
    store: &MasterKeyStore,
    license_key: &RsaPublicKey,
    clock: &C,
) -> ValidationResult {
    match open_with_keyring(wire, store) {
        Ok(envelope) => inspect_envelope(&envelope, license_key, clock),
        Err(e) => ValidationResult::failed(e.to_string()),
    }
}

fn inspect_envelope<C: Clock + ?Sized>(
    envelope: &LicenseEnvelope,
    license_key: &RsaPublicKey,
    clock: &C,
) -> ValidationResult {
    let signature = if verify_license(&envelope.license, &envelope.signature, license_key) {
        SignatureStatus::Verified
    } else {
        SignatureStatus::VerificationFailed
    };

    let license = match envelope.license() {
        Ok(license) => license,
        Err(e) => {
            return ValidationResult {
                signature,
                ..ValidationResult::failed(e.to_string())
            }
        }
    };

    let expiry = check_expiry(&license, clock);
    let validity = if expiry.is_ok() {
        ValidityStatus::Valid
    } else {
        ValidityStatus::Invalid
    };

    let error = match (signature, expiry) {
        (SignatureStatus::VerificationFailed, _) => Some(LicvaultError::SignatureInvalid.to_string()),
        (_, Err(e)) => Some(e.to_string()),
        _ => None,
    };

    ValidationResult {
        parsing: ParsingStatus::Success,
        validity,
        signature,
        license_info: Some(LicenseInfo::from(&license)),
        error,
        downloaded: false,
    }
}
