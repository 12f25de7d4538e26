//! Issuer-side facade over the key store, the codec and the code generator.
//!
//! This is what an issuing backend's handlers call: issue a license file,
//! manage master keys, emit validators and inspect files sent in by clients.

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::codegen::{GeneratedValidator, ValidatorCodeGenerator};
use crate::crypto::keys::{decode_public_key, LicenseKeyPair};
use crate::keystore::{MaskedMasterKey, MasterKeyStore, OverrideRequest};
use crate::protocol::models::{License, ValidationResult};
use crate::LicvaultError;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

/// Issuing side of licvault.
pub struct LicenseAuthority {
    store: MasterKeyStore,
    generator: ValidatorCodeGenerator,
    clock: Arc<dyn Clock>,
}

impl LicenseAuthority {
    /// Authority whose validators download from `api_base_url`.
    pub fn new(store: MasterKeyStore, api_base_url: impl Into<String>) -> Self {
        Self {
            store,
            generator: ValidatorCodeGenerator::new(api_base_url),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom generator (e.g. a different default license file).
    pub fn with_generator(mut self, generator: ValidatorCodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Replace the clock used by [`inspect_license_file`](Self::inspect_license_file).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying key store.
    pub fn store(&self) -> &MasterKeyStore {
        &self.store
    }

    /// Issue a license file encrypted for the active master key.
    ///
    /// The envelope is signed with `signing_key` when given, otherwise with
    /// the active master key itself.
    pub fn issue_license(
        &self,
        license: &License,
        signing_key: Option<&RsaPrivateKey>,
    ) -> Result<String, LicvaultError> {
        let active = self.store.active()?;
        let wire = match signing_key {
            Some(key) => codec::issue_signed_by(license, key, &active.public()?)?,
            None => codec::issue(license, &active)?,
        };
        info!(
            license_id = %license.id,
            tenant_id = %license.tenant_id,
            master_key_id = %active.id,
            per_license_key = signing_key.is_some(),
            "License issued"
        );
        Ok(wire)
    }

    /// Issue a license signed by a per-license key pair.
    pub fn issue_license_for(&self, license: &License, keys: &LicenseKeyPair) -> Result<String, LicvaultError> {
        self.issue_license(license, Some(&keys.signing_key()?))
    }

    /// Every master key, private halves masked.
    pub fn master_keys(&self) -> Result<Vec<MaskedMasterKey>, LicvaultError> {
        self.store.list()
    }

    /// Generate a new master key and make it active.
    pub fn rotate_master_key(&self) -> Result<MaskedMasterKey, LicvaultError> {
        self.store.rotate()
    }

    /// Install externally supplied key material as the active master key.
    pub fn override_master_key(&self, request: &OverrideRequest) -> Result<MaskedMasterKey, LicvaultError> {
        self.store.override_keys(&request.public_key, &request.private_key)
    }

    /// Base64 DER of the active master private key. Admin only.
    pub fn current_master_private_key(&self) -> Result<Zeroizing<String>, LicvaultError> {
        Ok(Zeroizing::new(self.store.active()?.private_key))
    }

    /// Validator source for `language`, embedding the active master key.
    ///
    /// # Errors
    /// * `UnsupportedLanguage` - unknown language identifier
    pub fn generate_validator(&self, language: &str) -> Result<GeneratedValidator, LicvaultError> {
        let language = language.parse()?;
        let private_key = self.current_master_private_key()?;
        self.generator.generate(language, &private_key)
    }

    /// Judge a license file without acting on it.
    ///
    /// Files encrypted under retired master keys still open. A license key
    /// that does not decode is reported in the result's `error`.
    pub fn inspect_license_file(&self, wire: &str, license_key: &str) -> ValidationResult {
        match decode_public_key(license_key) {
            Ok(key) => codec::inspect_with_keyring(wire, &self.store, &key, self.clock.as_ref()),
            Err(e) => ValidationResult::failed(e.to_string()),
        }
    }
}
