//! Licvault configuration.

use crate::crypto::keys::{mask_private_key, DEFAULT_KEY_BITS, MIN_KEY_BITS};
use crate::LicvaultError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the client's license (public) key.
pub const LICENSE_KEY_ENV: &str = "LICENSE_KEY";

/// Environment variable overriding the license file location.
pub const LICENSE_FILE_ENV: &str = "LICENSE_FILE_PATH";

/// License file used when `LICENSE_FILE_PATH` is unset.
pub const DEFAULT_LICENSE_FILE: &str = "./license.lic";

/// Issuance endpoint path, relative to the API base URL.
pub const ISSUE_PATH: &str = "/api/licenses/issue";

/// Download timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Keyring namespace under the platform data directory.
pub const DEFAULT_KEYRING_NAMESPACE: &str = "licvault";

/// Client-side validator settings.
///
/// `master_private_key` decrypts license files; `license_key` verifies their
/// signatures. Both are base64 DER.
#[derive(Clone)]
pub struct ValidatorConfig {
    /// Base64 DER public key the license must be signed for (`LICENSE_KEY`).
    pub license_key: String,

    /// Local `.lic` file.
    pub license_file: PathBuf,

    /// Issuing backend, e.g. `https://licenses.example.com`.
    pub api_base_url: String,

    /// Base64 DER PKCS#8 master private key.
    pub master_private_key: String,

    /// Download timeout.
    pub timeout: Duration,
}

impl ValidatorConfig {
    /// Config with the default license file and timeout.
    pub fn new(
        api_base_url: impl Into<String>,
        master_private_key: impl Into<String>,
        license_key: impl Into<String>,
    ) -> Self {
        Self {
            license_key: license_key.into(),
            license_file: PathBuf::from(DEFAULT_LICENSE_FILE),
            api_base_url: api_base_url.into(),
            master_private_key: master_private_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read `LICENSE_KEY` and `LICENSE_FILE_PATH` from the environment.
    ///
    /// # Errors
    /// * `ConfigError` - `LICENSE_KEY` is unset or empty
    pub fn from_env(
        api_base_url: impl Into<String>,
        master_private_key: impl Into<String>,
    ) -> Result<Self, LicvaultError> {
        Self::from_lookup(api_base_url, master_private_key, |name| std::env::var(name).ok())
    }

    fn from_lookup<F>(
        api_base_url: impl Into<String>,
        master_private_key: impl Into<String>,
        lookup: F,
    ) -> Result<Self, LicvaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let license_key = lookup(LICENSE_KEY_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                LicvaultError::ConfigError(format!("{} environment variable is not set", LICENSE_KEY_ENV))
            })?;

        let mut config = Self::new(api_base_url, master_private_key, license_key);
        if let Some(path) = lookup(LICENSE_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            config.license_file = PathBuf::from(path.trim());
        }
        Ok(config)
    }

    /// Use a different license file.
    pub fn with_license_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.license_file = path.into();
        self
    }

    /// Use a different download timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full issuance URL, without the query string.
    pub fn issue_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), ISSUE_PATH)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicvaultError> {
        if self.license_key.trim().is_empty() {
            return Err(LicvaultError::ConfigError(
                "license_key cannot be empty".to_string(),
            ));
        }
        if self.master_private_key.trim().is_empty() {
            return Err(LicvaultError::ConfigError(
                "master_private_key cannot be empty".to_string(),
            ));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(LicvaultError::ConfigError(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(LicvaultError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("license_key", &self.license_key)
            .field("license_file", &self.license_file)
            .field("api_base_url", &self.api_base_url)
            .field("master_private_key", &mask_private_key(&self.master_private_key))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Issuer-side master key store settings.
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    /// Directory name under the platform data directory.
    /// Each deployment should use its own namespace.
    pub namespace: String,

    /// Modulus size for generated master keys.
    pub key_bits: usize,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_KEYRING_NAMESPACE.to_string(),
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl KeyStoreConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicvaultError> {
        if self.namespace.is_empty() {
            return Err(LicvaultError::ConfigError(
                "namespace cannot be empty".to_string(),
            ));
        }
        if self.namespace.contains(['/', '\\']) || self.namespace.starts_with('.') {
            return Err(LicvaultError::ConfigError(format!(
                "namespace must be a plain directory name, got {:?}",
                self.namespace
            )));
        }
        if self.key_bits < MIN_KEY_BITS {
            return Err(LicvaultError::ConfigError(format!(
                "key_bits must be at least {}, got {}",
                MIN_KEY_BITS, self.key_bits
            )));
        }
        Ok(())
    }
}
