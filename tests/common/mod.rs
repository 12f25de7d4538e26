//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::Utc;
use licvault::client::LicenseSource;
use licvault::crypto::keys::{encode_private_key, encode_public_key};
use licvault::keystore::MemoryKeyStorage;
use licvault::{
    KeyStoreConfig, License, LicenseAuthority, LicvaultError, MasterKeyPair, MasterKeyStore,
    SystemClock, ValidatorConfig,
};
use once_cell::sync::Lazy;
use rsa::RsaPrivateKey;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static MASTER_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap());

static LICENSE_SIGNING_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap());

pub fn master_key() -> &'static RsaPrivateKey {
    &MASTER_KEY
}

pub fn license_signing_key() -> &'static RsaPrivateKey {
    &LICENSE_SIGNING_KEY
}

pub fn master_private_b64() -> String {
    encode_private_key(master_key()).unwrap()
}

pub fn public_b64(key: &RsaPrivateKey) -> String {
    encode_public_key(&key.to_public_key()).unwrap()
}

/// Authority whose keyring holds only [`master_key`], active.
pub fn authority(base_url: &str) -> LicenseAuthority {
    let mut pair = MasterKeyPair::from_private_key(master_key(), &SystemClock).unwrap();
    pair.is_active = true;
    let store = MasterKeyStore::open(
        Box::new(MemoryKeyStorage::with_keys(vec![pair])),
        &KeyStoreConfig::default(),
    )
    .unwrap();
    LicenseAuthority::new(store, base_url)
}

pub fn fresh_license(validity_days: u32) -> License {
    License::new(
        "tenant-integration",
        Utc::now(),
        validity_days,
        json!({"plan": "team", "seats": 5, "features": ["export", "sso"]}),
    )
    .unwrap()
}

/// Validator config for a license signed by `signer`, stored at `file`.
pub fn validator_config(base_url: &str, signer: &RsaPrivateKey, file: &Path) -> ValidatorConfig {
    ValidatorConfig::new(base_url, master_private_b64(), public_b64(signer)).with_license_file(file)
}

/// Source serving a fixed reply and counting calls.
pub struct StaticSource {
    reply: Option<String>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn serving(wire: impl Into<String>) -> Self {
        Self {
            reply: Some(wire.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn offline() -> Self {
        Self {
            reply: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl LicenseSource for StaticSource {
    fn fetch_license(&self, _license_key: &str) -> Result<Vec<u8>, LicvaultError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .map(String::into_bytes)
            .ok_or_else(|| LicvaultError::Network("offline".to_string()))
    }
}
