//! Master keyring persistence.
//!
//! The keyring is a JSON document `{"keys": [...]}`. The file backend stores it
//! under `dirs::data_dir()/<namespace>/master_keys.json`.

use crate::keystore::MasterKeyPair;
use crate::storage::write_atomic_private;
use crate::LicvaultError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the keyring inside its namespace directory.
pub const KEYRING_FILE: &str = "master_keys.json";

/// Where the master keyring lives.
///
/// `save` must be all-or-nothing: after an error the previously saved
/// keyring is still the one `load` returns.
pub trait KeyStorage: Send + Sync {
    /// Load every stored key pair, oldest first.
    fn load(&self) -> Result<Vec<MasterKeyPair>, LicvaultError>;

    /// Replace the stored keyring.
    fn save(&self, keys: &[MasterKeyPair]) -> Result<(), LicvaultError>;
}

#[derive(Serialize, Deserialize)]
struct KeyringDocument {
    keys: Vec<MasterKeyPair>,
}

/// Keyring kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryKeyStorage {
    keys: Mutex<Vec<MasterKeyPair>>,
}

impl MemoryKeyStorage {
    /// Empty keyring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyring pre-populated with `keys`.
    pub fn with_keys(keys: Vec<MasterKeyPair>) -> Self {
        Self {
            keys: Mutex::new(keys),
        }
    }
}

impl KeyStorage for MemoryKeyStorage {
    fn load(&self) -> Result<Vec<MasterKeyPair>, LicvaultError> {
        self.keys
            .lock()
            .map(|keys| keys.clone())
            .map_err(|_| LicvaultError::KeyStore("Keyring mutex poisoned".to_string()))
    }

    fn save(&self, keys: &[MasterKeyPair]) -> Result<(), LicvaultError> {
        let mut guard = self
            .keys
            .lock()
            .map_err(|_| LicvaultError::KeyStore("Keyring mutex poisoned".to_string()))?;
        *guard = keys.to_vec();
        Ok(())
    }
}

/// Keyring persisted as a JSON file with atomic replace.
#[derive(Debug, Clone)]
pub struct FileKeyStorage {
    path: PathBuf,
}

impl FileKeyStorage {
    /// Keyring under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, LicvaultError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| LicvaultError::StorageIO("Could not find data directory".to_string()))?;

        let dir = base_dir.join(namespace);
        fs::create_dir_all(&dir)
            .map_err(|e| LicvaultError::StorageIO(format!("Failed to create keyring dir: {}", e)))?;

        Ok(Self {
            path: dir.join(KEYRING_FILE),
        })
    }

    /// Keyring at an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the keyring file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyStorage for FileKeyStorage {
    fn load(&self) -> Result<Vec<MasterKeyPair>, LicvaultError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| LicvaultError::StorageIO(format!("Failed to read keyring: {}", e)))?;
        let document: KeyringDocument = serde_json::from_str(&json)
            .map_err(|e| LicvaultError::KeyStore(format!("Corrupt keyring file: {}", e)))?;

        Ok(document.keys)
    }

    fn save(&self, keys: &[MasterKeyPair]) -> Result<(), LicvaultError> {
        let document = KeyringDocument {
            keys: keys.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| LicvaultError::KeyStore(format!("Failed to serialize keyring: {}", e)))?;

        write_atomic_private(&self.path, &json)
    }
}
