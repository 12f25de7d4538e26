//! Licvault error types.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while issuing, opening or validating licenses.
#[derive(Debug, Error)]
pub enum LicvaultError {
    /// Configuration is invalid (missing `LICENSE_KEY`, bad URL, undecodable key).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The local license file does not exist.
    #[error("License file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The wire string is malformed or a cryptographic step failed.
    #[error("Decryption error: {0}")]
    DecryptionError(String),

    /// The decrypted envelope is not a well-formed license document.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The license signature does not match the client-held public key.
    #[error("License signature verification failed")]
    SignatureInvalid,

    /// The license validity window has passed.
    #[error("License expired at {expires_at}")]
    LicenseExpired {
        /// Instant after which the license stopped being valid.
        expires_at: DateTime<Utc>,
    },

    /// Downloading a fresh license failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Key store state or persistence error.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// Key material could not be generated, encoded or decoded.
    #[error("Key material error: {0}")]
    KeyMaterial(String),

    /// Local file I/O error.
    #[error("Storage I/O error: {0}")]
    StorageIO(String),

    /// Validator generation was requested for an unknown language.
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A validator template could not be rendered.
    #[error("Template error: {0}")]
    TemplateError(String),
}

impl LicvaultError {
    /// Whether this failure may be cured by downloading a fresh license.
    ///
    /// Configuration and network failures are terminal.
    pub fn is_recoverable_by_download(&self) -> bool {
        matches!(
            self,
            LicvaultError::FileNotFound(_)
                | LicvaultError::DecryptionError(_)
                | LicvaultError::ParseError(_)
                | LicvaultError::SignatureInvalid
                | LicvaultError::LicenseExpired { .. }
        )
    }
}
