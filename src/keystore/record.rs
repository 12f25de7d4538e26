//! Master key pair records and their display forms.

use crate::clock::Clock;
use crate::crypto::keys::{
    check_key_pair, decode_private_key, decode_public_key, encode_private_key,
    encode_public_key, generate_rsa_key, mask_private_key,
};
use crate::LicvaultError;
use chrono::{DateTime, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A stored master key pair.
///
/// Never deleted: deactivated pairs are kept so files encrypted under them
/// can still be opened.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterKeyPair {
    /// Key pair identifier (UUID).
    pub id: String,

    /// Base64 DER SubjectPublicKeyInfo.
    pub public_key: String,

    /// Base64 DER PKCS#8.
    pub private_key: String,

    /// Whether this pair is the one used for new licenses.
    pub is_active: bool,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// When the pair stopped being active, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl MasterKeyPair {
    /// Generate a new, inactive pair.
    pub fn generate<C: Clock + ?Sized>(bits: usize, clock: &C) -> Result<Self, LicvaultError> {
        Self::from_private_key(&generate_rsa_key(bits)?, clock)
    }

    /// Wrap an existing private key as a new, inactive pair.
    pub fn from_private_key<C: Clock + ?Sized>(
        key: &RsaPrivateKey,
        clock: &C,
    ) -> Result<Self, LicvaultError> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            public_key: encode_public_key(&key.to_public_key())?,
            private_key: encode_private_key(key)?,
            is_active: false,
            created_at: clock.now_utc(),
            deactivated_at: None,
        })
    }

    /// Build a new, inactive pair from caller-supplied base64 DER.
    ///
    /// # Errors
    /// * `KeyMaterial` - either half fails to decode or they do not match
    pub fn from_encoded<C: Clock + ?Sized>(
        public_key: &str,
        private_key: &str,
        clock: &C,
    ) -> Result<Self, LicvaultError> {
        check_key_pair(public_key, private_key)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            public_key: public_key.trim().to_string(),
            private_key: private_key.trim().to_string(),
            is_active: false,
            created_at: clock.now_utc(),
            deactivated_at: None,
        })
    }

    /// Decoded public half.
    pub fn public(&self) -> Result<RsaPublicKey, LicvaultError> {
        decode_public_key(&self.public_key)
    }

    /// Decoded private half.
    pub fn private(&self) -> Result<RsaPrivateKey, LicvaultError> {
        decode_private_key(&self.private_key)
    }

    /// Display form with the private key masked.
    pub fn masked(&self) -> MaskedMasterKey {
        MaskedMasterKey {
            id: self.id.clone(),
            public_key: self.public_key.clone(),
            private_key_masked: mask_private_key(&self.private_key),
            is_active: self.is_active,
            created_at: self.created_at,
            deactivated_at: self.deactivated_at,
        }
    }
}

impl fmt::Debug for MasterKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyPair")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("private_key", &mask_private_key(&self.private_key))
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("deactivated_at", &self.deactivated_at)
            .finish()
    }
}

/// What the key listing endpoint returns for each pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedMasterKey {
    /// Key pair identifier.
    pub id: String,
    /// Base64 DER public key (not secret).
    pub public_key: String,
    /// Header, length and fingerprint of the private key.
    pub private_key_masked: String,
    /// Whether this pair is active.
    pub is_active: bool,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Deactivation instant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// Body of the master key override request.
#[derive(Clone, Serialize, Deserialize)]
pub struct OverrideRequest {
    /// Base64 DER public key.
    pub public_key: String,
    /// Base64 DER PKCS#8 private key.
    pub private_key: String,
}

impl fmt::Debug for OverrideRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideRequest")
            .field("public_key", &self.public_key)
            .field("private_key", &mask_private_key(&self.private_key))
            .finish()
    }
}
