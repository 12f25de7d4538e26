//! The master key store.
//!
//! Exactly one pair is active once the store is open. Every transition is
//! computed on a copy of the keyring, persisted, and only then published, all
//! under the same write lock: readers never see zero or two active keys, and a
//! failed save leaves both storage and memory untouched.

use crate::clock::{Clock, SystemClock};
use crate::config::KeyStoreConfig;
use crate::keystore::record::{MaskedMasterKey, MasterKeyPair};
use crate::storage::keyring::{FileKeyStorage, KeyStorage};
use crate::LicvaultError;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Thread-safe store of master key pairs.
pub struct MasterKeyStore {
    keys: RwLock<Vec<MasterKeyPair>>,
    storage: Box<dyn KeyStorage>,
    clock: Arc<dyn Clock>,
    key_bits: usize,
}

impl MasterKeyStore {
    /// Open the file-backed keyring named by `config`.
    pub fn open_default(config: &KeyStoreConfig) -> Result<Self, LicvaultError> {
        config.validate()?;
        let storage = FileKeyStorage::new(&config.namespace)?;
        Self::open(Box::new(storage), config)
    }

    /// Open a keyring, generating the first active pair if it is empty.
    ///
    /// # Errors
    /// * `KeyStore` - the stored keyring does not have exactly one active pair
    pub fn open(storage: Box<dyn KeyStorage>, config: &KeyStoreConfig) -> Result<Self, LicvaultError> {
        Self::open_inner(storage, config, Arc::new(SystemClock))
    }

    /// Open with an injected clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn open_with_clock(
        storage: Box<dyn KeyStorage>,
        config: &KeyStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicvaultError> {
        Self::open_inner(storage, config, clock)
    }

    fn open_inner(
        storage: Box<dyn KeyStorage>,
        config: &KeyStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicvaultError> {
        config.validate()?;
        let mut keys = storage.load()?;

        if keys.is_empty() {
            info!("Master keyring is empty, generating the initial key pair");
            let mut initial = MasterKeyPair::generate(config.key_bits, clock.as_ref())?;
            initial.is_active = true;
            keys.push(initial);
            storage.save(&keys)?;
        }

        check_single_active(&keys)?;
        debug!(keys = keys.len(), "Master keyring loaded");

        Ok(Self {
            keys: RwLock::new(keys),
            storage,
            clock,
            key_bits: config.key_bits,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<MasterKeyPair>>, LicvaultError> {
        self.keys
            .read()
            .map_err(|_| LicvaultError::KeyStore("Key store lock poisoned".to_string()))
    }

    /// Apply `change` to a copy of the keyring, persist it, then publish it.
    fn commit<T, F>(&self, change: F) -> Result<T, LicvaultError>
    where
        F: FnOnce(&mut Vec<MasterKeyPair>) -> Result<T, LicvaultError>,
    {
        let mut guard = self
            .keys
            .write()
            .map_err(|_| LicvaultError::KeyStore("Key store lock poisoned".to_string()))?;

        let mut next = guard.clone();
        let outcome = change(&mut next)?;
        check_single_active(&next)?;

        if let Err(e) = self.storage.save(&next) {
            warn!(error = %e, "Failed to persist master keyring, change discarded");
            return Err(e);
        }

        *guard = next;
        Ok(outcome)
    }

    /// Generate a new pair and store it inactive.
    pub fn generate(&self) -> Result<MaskedMasterKey, LicvaultError> {
        let pair = MasterKeyPair::generate(self.key_bits, self.clock.as_ref())?;
        let masked = pair.masked();
        self.commit(move |keys| {
            keys.push(pair);
            Ok(())
        })?;
        info!(key_id = %masked.id, "Generated inactive master key pair");
        Ok(masked)
    }

    /// Make the stored pair `id` the active one.
    ///
    /// # Errors
    /// * `KeyStore` - no pair has that id
    pub fn activate(&self, id: &str) -> Result<MaskedMasterKey, LicvaultError> {
        let now = self.clock.now_utc();
        let masked = self.commit(|keys| switch_active(keys, id, now))?;
        info!(key_id = %id, "Activated master key pair");
        Ok(masked)
    }

    /// Replace the active pair with a freshly generated one.
    ///
    /// The previous pair stays in the keyring, inactive.
    pub fn rotate(&self) -> Result<MaskedMasterKey, LicvaultError> {
        let pair = MasterKeyPair::generate(self.key_bits, self.clock.as_ref())?;
        let id = pair.id.clone();
        let now = self.clock.now_utc();

        let masked = self.commit(move |keys| {
            keys.push(pair);
            switch_active(keys, &id, now)
        })?;
        info!(key_id = %masked.id, "Rotated master key pair");
        Ok(masked)
    }

    /// Make caller-supplied key material the active pair.
    ///
    /// Material already in the keyring is reactivated rather than duplicated.
    ///
    /// # Errors
    /// * `KeyMaterial` - the halves do not decode or do not match
    pub fn override_keys(&self, public_key: &str, private_key: &str) -> Result<MaskedMasterKey, LicvaultError> {
        let candidate = MasterKeyPair::from_encoded(public_key, private_key, self.clock.as_ref())?;
        let now = self.clock.now_utc();

        let masked = self.commit(move |keys| {
            let existing = keys
                .iter()
                .find(|k| k.public_key == candidate.public_key)
                .map(|k| k.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = candidate.id.clone();
                    keys.push(candidate);
                    id
                }
            };
            switch_active(keys, &id, now)
        })?;
        info!(key_id = %masked.id, "Overrode master key pair");
        Ok(masked)
    }

    /// Every pair, private keys masked, oldest first.
    pub fn list(&self) -> Result<Vec<MaskedMasterKey>, LicvaultError> {
        Ok(self.read()?.iter().map(MasterKeyPair::masked).collect())
    }

    /// The active pair.
    pub fn active(&self) -> Result<MasterKeyPair, LicvaultError> {
        self.read()?
            .iter()
            .find(|k| k.is_active)
            .cloned()
            .ok_or_else(|| LicvaultError::KeyStore("No active master key".to_string()))
    }

    /// Look up a pair by id, active or not.
    pub fn get(&self, id: &str) -> Result<Option<MasterKeyPair>, LicvaultError> {
        Ok(self.read()?.iter().find(|k| k.id == id).cloned())
    }

    /// Look up a pair by its base64 public key.
    pub fn find_by_public_key(&self, public_key: &str) -> Result<Option<MasterKeyPair>, LicvaultError> {
        let public_key = public_key.trim();
        Ok(self
            .read()?
            .iter()
            .find(|k| k.public_key == public_key)
            .cloned())
    }

    /// Pairs in the order a license file should be tried against them:
    /// the active pair, then deactivated pairs, most recently retired first.
    pub fn decryption_order(&self) -> Result<Vec<MasterKeyPair>, LicvaultError> {
        let mut keys = self.read()?.clone();
        keys.sort_by(|a, b| {
            b.is_active
                .cmp(&a.is_active)
                .then_with(|| b.deactivated_at.cmp(&a.deactivated_at))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(keys)
    }
}

fn check_single_active(keys: &[MasterKeyPair]) -> Result<(), LicvaultError> {
    let active = keys.iter().filter(|k| k.is_active).count();
    if active != 1 {
        return Err(LicvaultError::KeyStore(format!(
            "Keyring must have exactly one active key, found {}",
            active
        )));
    }
    Ok(())
}

fn switch_active(
    keys: &mut [MasterKeyPair],
    id: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<MaskedMasterKey, LicvaultError> {
    let target = keys
        .iter()
        .position(|k| k.id == id)
        .ok_or_else(|| LicvaultError::KeyStore(format!("Unknown master key id: {}", id)))?;

    if keys[target].is_active {
        return Ok(keys[target].masked());
    }

    for key in keys.iter_mut().filter(|k| k.is_active) {
        key.is_active = false;
        key.deactivated_at = Some(now);
    }

    let key = &mut keys[target];
    key.is_active = true;
    key.deactivated_at = None;
    Ok(key.masked())
}
