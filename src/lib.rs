//! # Licvault
//!
//! **Encrypted, signed, expiring license files with offline validation.**
//!
//! An issuer signs a license document with RSA-PSS, wraps it in a hybrid
//! RSA-OAEP + AES-256-GCM envelope under a master key and hands the client a
//! `.lic` file. The client validates that file offline and downloads a fresh
//! copy from the issuing backend at most once when it is missing, corrupted,
//! forged or expired.
//!
//! ## Features
//!
//! - **Hybrid encryption**: `base64(RSA-OAEP(aes_key)):base64(iv || tag || ciphertext)`
//! - **RSA-PSS signatures** over canonical JSON, verified with the client's `LICENSE_KEY`
//! - **Validation state machine** with a single bounded download
//! - **Master keyring** with rotation, override and retired-key decryption
//! - **Validator generation** for JavaScript, TypeScript, Python, Java, Rust, Dart and Go
//!
//! ## Quickstart
//!
//! ```no_run
//! use licvault::{LicenseValidator, ValidatorConfig};
//!
//! fn main() -> Result<(), licvault::LicvaultError> {
//!     // LICENSE_KEY (and optionally LICENSE_FILE_PATH) come from the environment.
//!     let config = ValidatorConfig::from_env(
//!         "https://licenses.example.com",
//!         "MIIEvQIBADANBgkqhkiG9w0BAQEFAASC...",
//!     )?;
//!
//!     let validator = LicenseValidator::new(config)?;
//!     let result = validator.validate();
//!
//!     if result.is_valid() {
//!         println!("License valid! (downloaded: {})", result.downloaded);
//!     } else {
//!         eprintln!("License rejected: {:?}", result.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Issuing side:
//!
//! ```no_run
//! use licvault::{KeyStoreConfig, License, LicenseAuthority, MasterKeyStore};
//!
//! fn main() -> Result<(), licvault::LicvaultError> {
//!     let store = MasterKeyStore::open_default(&KeyStoreConfig::default())?;
//!     let authority = LicenseAuthority::new(store, "https://licenses.example.com");
//!
//!     let license = License::new(
//!         "tenant-1",
//!         chrono::Utc::now(),
//!         30,
//!         serde_json::json!({"plan": "enterprise"}),
//!     )?;
//!     let wire = authority.issue_license(&license, None)?;
//!     std::fs::write("license.lic", wire).map_err(|e| licvault::LicvaultError::StorageIO(e.to_string()))?;
//!
//!     let validator = authority.generate_validator("py")?;
//!     println!("{}", validator.filename);
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Licvault protects against:
//! - **Forged licenses**: a file not signed for the client's `LICENSE_KEY` is rejected
//! - **Tampering**: AES-GCM authentication and the signature both cover the license
//! - **Stale licenses**: expiry is checked on every validation
//!
//! Generated validators embed the master private key, so anyone holding a
//! validator can decrypt license files. Client-side licensing can always be
//! bypassed by a determined attacker with access to the binary.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Policy layer
pub mod policy;

// Storage layer
pub mod storage;

// Master keys
pub mod keystore;

// License file codec
pub mod codec;

// Client layer
pub mod client;

// Validator (main client API)
pub mod validator;

// Validator code generation
pub mod codegen;

// Issuer facade
pub mod authority;

#[cfg(test)]
mod test_support;

// Re-exports for public API
pub use authority::LicenseAuthority;
pub use clock::{Clock, SystemClock};
pub use codegen::{GeneratedValidator, TargetLanguage, ValidatorCodeGenerator};
pub use config::{KeyStoreConfig, ValidatorConfig};
pub use crypto::keys::LicenseKeyPair;
pub use errors::LicvaultError;
pub use keystore::{MaskedMasterKey, MasterKeyPair, MasterKeyStore, OverrideRequest};
pub use protocol::models::{
    License, LicenseEnvelope, LicenseInfo, ParsingStatus, SignatureStatus, ValidationResult,
    ValidityStatus,
};
pub use validator::LicenseValidator;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
