//! License Validator - the client-side public API.
//!
//! Runs the local license file through a small state machine:
//!
//! ```text
//! CheckFile -> Decrypt -> VerifySignature -> CheckExpiry -> Valid
//!     |           |             |                 |
//!     +-----------+-------------+-----------------+--> Download (once) -> retry
//!                                                  \-> Invalid
//! ```
//!
//! A missing file, or any decrypt, parse, signature or expiry failure,
//! triggers at most one download per [`LicenseValidator::validate`] call.
//! Download failures are final.

use crate::client::{IssuanceClient, LicenseSource};
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::ValidatorConfig;
use crate::crypto::keys::{decode_private_key, decode_public_key};
use crate::crypto::signature::require_valid_signature;
use crate::policy::expiry::check_expiry;
use crate::protocol::models::{
    License, LicenseEnvelope, LicenseInfo, ParsingStatus, SignatureStatus, ValidationResult,
    ValidityStatus,
};
use crate::storage::license_file::LicenseFile;
use crate::LicvaultError;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where to continue after a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    CheckFile,
    Decrypt,
}

enum State {
    CheckFile,
    Download(Resume),
    Decrypt,
    VerifySignature {
        envelope: LicenseEnvelope,
        license: License,
    },
    CheckExpiry(License),
    Valid(License),
    Invalid(LicvaultError),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::CheckFile => "check_file",
            State::Download(_) => "download",
            State::Decrypt => "decrypt",
            State::VerifySignature { .. } => "verify_signature",
            State::CheckExpiry(_) => "check_expiry",
            State::Valid(_) => "valid",
            State::Invalid(_) => "invalid",
        }
    }
}

/// Indicators of the attempt in progress.
struct Run {
    parsing: ParsingStatus,
    signature: SignatureStatus,
    validity: ValidityStatus,
    download_attempted: bool,
    downloaded: bool,
}

impl Run {
    fn new() -> Self {
        Self {
            parsing: ParsingStatus::Failed,
            signature: SignatureStatus::VerificationFailed,
            validity: ValidityStatus::Invalid,
            download_attempted: false,
            downloaded: false,
        }
    }

    fn reset_indicators(&mut self) {
        self.parsing = ParsingStatus::Failed;
        self.signature = SignatureStatus::VerificationFailed;
        self.validity = ValidityStatus::Invalid;
    }

    fn finish(self, license_info: Option<LicenseInfo>, error: Option<String>) -> ValidationResult {
        ValidationResult {
            parsing: self.parsing,
            validity: self.validity,
            signature: self.signature,
            license_info,
            error,
            downloaded: self.downloaded,
        }
    }
}

/// Client-side license validator.
///
/// Create one per application and call [`validate`](Self::validate) at
/// startup or whenever the license should be re-checked.
pub struct LicenseValidator {
    license_key: RsaPublicKey,
    license_key_b64: String,
    master_key: RsaPrivateKey,
    file: LicenseFile,
    source: Box<dyn LicenseSource>,
    clock: Arc<dyn Clock>,
}

impl LicenseValidator {
    /// Create a validator that downloads from the configured backend.
    ///
    /// # Errors
    /// * `ConfigError` - invalid settings or undecodable keys
    pub fn new(config: ValidatorConfig) -> Result<Self, LicvaultError> {
        config.validate()?;
        let source = IssuanceClient::from_config(&config)?;
        Self::with_source(config, Box::new(source))
    }

    /// Create a validator with a custom license source.
    pub fn with_source(
        config: ValidatorConfig,
        source: Box<dyn LicenseSource>,
    ) -> Result<Self, LicvaultError> {
        config.validate()?;

        let license_key = decode_public_key(&config.license_key)
            .map_err(|e| LicvaultError::ConfigError(format!("Invalid LICENSE_KEY: {}", e)))?;
        let master_key = decode_private_key(&config.master_private_key)
            .map_err(|e| LicvaultError::ConfigError(format!("Invalid master private key: {}", e)))?;

        Ok(Self {
            license_key,
            license_key_b64: config.license_key.trim().to_string(),
            master_key,
            file: LicenseFile::new(config.license_file),
            source,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Location of the license file.
    pub fn license_file(&self) -> &Path {
        self.file.path()
    }

    /// Shortcut for `validate().is_valid()`.
    pub fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }

    /// Validate the local license, downloading a fresh one at most once.
    ///
    /// Never fails: I/O and network problems are reported in the result.
    pub fn validate(&self) -> ValidationResult {
        let mut run = Run::new();
        let mut state = State::CheckFile;

        loop {
            debug!(state = state.name(), "License validation step");
            state = match state {
                State::CheckFile => {
                    if self.file.exists() {
                        State::Decrypt
                    } else {
                        let missing = LicvaultError::FileNotFound(self.file.path().to_path_buf());
                        self.recover(&run, missing, Resume::CheckFile)
                    }
                }
                State::Download(resume) => {
                    run.download_attempted = true;
                    match self.download() {
                        Ok(()) => {
                            run.downloaded = true;
                            match resume {
                                Resume::CheckFile => State::CheckFile,
                                Resume::Decrypt => State::Decrypt,
                            }
                        }
                        Err(e) => State::Invalid(e),
                    }
                }
                State::Decrypt => {
                    run.reset_indicators();
                    match self.decrypt() {
                        Ok((envelope, license)) => {
                            run.parsing = ParsingStatus::Success;
                            State::VerifySignature { envelope, license }
                        }
                        Err(e) => self.recover(&run, e, Resume::Decrypt),
                    }
                }
                State::VerifySignature { envelope, license } => {
                    match require_valid_signature(&envelope.license, &envelope.signature, &self.license_key) {
                        Ok(()) => {
                            run.signature = SignatureStatus::Verified;
                            State::CheckExpiry(license)
                        }
                        Err(e) => self.recover(&run, e, Resume::Decrypt),
                    }
                }
                State::CheckExpiry(license) => match check_expiry(&license, self.clock.as_ref()) {
                    Ok(()) => {
                        run.validity = ValidityStatus::Valid;
                        State::Valid(license)
                    }
                    Err(e) => self.recover(&run, e, Resume::Decrypt),
                },
                State::Valid(license) => {
                    info!(
                        license_id = %license.id,
                        expires_at = %license.expires_at(),
                        downloaded = run.downloaded,
                        "License valid"
                    );
                    return run.finish(Some(LicenseInfo::from(&license)), None);
                }
                State::Invalid(error) => {
                    warn!(error = %error, downloaded = run.downloaded, "License invalid");
                    return run.finish(None, Some(error.to_string()));
                }
            };
        }
    }

    /// Next state after a failure: one download if allowed, else Invalid.
    fn recover(&self, run: &Run, error: LicvaultError, resume: Resume) -> State {
        if !run.download_attempted && error.is_recoverable_by_download() {
            info!(reason = %error, "Local license unusable, requesting a fresh one");
            State::Download(resume)
        } else {
            State::Invalid(error)
        }
    }

    fn download(&self) -> Result<(), LicvaultError> {
        let body = self.source.fetch_license(&self.license_key_b64)?;
        self.file.replace(&body)?;
        info!(path = %self.file.path().display(), bytes = body.len(), "Saved fresh license file");
        Ok(())
    }

    fn decrypt(&self) -> Result<(LicenseEnvelope, License), LicvaultError> {
        let wire = self.file.read()?;
        let envelope = codec::open(&wire, &self.master_key)?;
        let license = envelope.license()?;
        Ok((envelope, license))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::crypto::hybrid::hybrid_encrypt;
    use crate::crypto::keys::{encode_private_key, encode_public_key};
    use crate::crypto::signature::sign_value;
    use crate::test_support::{master_key, other_key};
    use chrono::Duration;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Source that serves a fixed reply and counts requests.
    struct MockSource {
        reply: Option<Vec<u8>>,
        calls: Arc<AtomicUsize>,
        last_key: Arc<Mutex<Option<String>>>,
    }

    impl LicenseSource for MockSource {
        fn fetch_license(&self, license_key: &str) -> Result<Vec<u8>, LicvaultError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_key.lock().unwrap() = Some(license_key.to_string());
            self.reply
                .clone()
                .ok_or_else(|| LicvaultError::Network("connection refused".to_string()))
        }
    }

    struct Fixture {
        _dir: TempDir,
        file: LicenseFile,
        calls: Arc<AtomicUsize>,
        last_key: Arc<Mutex<Option<String>>>,
        clock: MockClock,
        validator: LicenseValidator,
    }

    impl Fixture {
        fn downloads(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn clock() -> MockClock {
        MockClock::from_rfc3339("2025-01-15T12:00:00Z")
    }

    fn license_key_b64() -> String {
        encode_public_key(&other_key().to_public_key()).unwrap()
    }

    /// A wire string signed with the per-license key, issued `days_ago`.
    fn wire(days_ago: i64, validity_days: u32) -> String {
        let license = License::new(
            "tenant-1",
            clock().now_utc() - Duration::days(days_ago),
            validity_days,
            json!({"plan": "pro", "features": ["sso", "audit"]}),
        )
        .unwrap();
        codec::issue_signed_by(&license, other_key(), &master_key().to_public_key()).unwrap()
    }

    fn fixture(local: Option<&str>, reply: Option<String>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("license.lic");
        let file = LicenseFile::new(&path);
        if let Some(contents) = local {
            file.replace(contents.as_bytes()).unwrap();
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let last_key = Arc::new(Mutex::new(None));
        let source = MockSource {
            reply: reply.map(String::into_bytes),
            calls: calls.clone(),
            last_key: last_key.clone(),
        };

        let config = ValidatorConfig::new(
            "http://127.0.0.1:9",
            encode_private_key(master_key()).unwrap(),
            license_key_b64(),
        )
        .with_license_file(&path);
        let clock = clock();
        let validator = LicenseValidator::with_source(config, Box::new(source))
            .unwrap()
            .with_clock(Arc::new(clock.clone()));

        Fixture {
            _dir: dir,
            file,
            calls,
            last_key,
            clock,
            validator,
        }
    }

    #[test]
    fn test_valid_local_file() {
        let f = fixture(Some(&wire(0, 30)), None);
        let result = f.validator.validate();

        assert!(result.is_valid());
        assert!(!result.downloaded);
        assert_eq!(f.downloads(), 0);
        let info = result.license_info.unwrap();
        assert_eq!(info.validity_days, 30);
        assert_eq!(info.payload, json!({"plan": "pro", "features": ["sso", "audit"]}));
    }

    #[test]
    fn test_missing_file_downloads_once() {
        let f = fixture(None, Some(wire(0, 30)));
        let result = f.validator.validate();

        assert!(result.is_valid());
        assert!(result.downloaded);
        assert_eq!(f.downloads(), 1);
        assert!(f.file.exists());
        assert_eq!(f.last_key.lock().unwrap().as_deref(), Some(license_key_b64().as_str()));
    }

    #[test]
    fn test_missing_file_network_failure() {
        let f = fixture(None, None);
        let result = f.validator.validate();

        assert!(!result.is_valid());
        assert_eq!(result.parsing, ParsingStatus::Failed);
        assert!(result.error.unwrap().contains("Network error"));
        assert!(!result.downloaded);
        assert_eq!(f.downloads(), 1);
    }

    #[test]
    fn test_download_that_writes_nothing_useful() {
        let f = fixture(None, Some("not-a-license".to_string()));
        let result = f.validator.validate();

        assert!(!result.is_valid());
        assert!(result.downloaded);
        assert_eq!(f.downloads(), 1);
        assert!(result.error.unwrap().contains("Decryption error"));
    }

    #[test]
    fn test_corrupt_file_stays_corrupt() {
        let corrupt = "no-colon-separator-here";
        let f = fixture(Some(corrupt), Some(corrupt.to_string()));
        let result = f.validator.validate();

        assert_eq!(result.parsing, ParsingStatus::Failed);
        assert_eq!(result.validity, ValidityStatus::Invalid);
        assert_eq!(result.signature, SignatureStatus::VerificationFailed);
        assert!(result.license_info.is_none());
        assert!(result.downloaded);
        assert_eq!(f.downloads(), 1);
    }

    #[test]
    fn test_corrupt_file_repaired_by_download() {
        let f = fixture(Some("garbage:garbage"), Some(wire(0, 30)));
        let result = f.validator.validate();

        assert!(result.is_valid());
        assert!(result.downloaded);
        assert_eq!(f.downloads(), 1);
    }

    #[test]
    fn test_expired_file_renewed() {
        let fresh = wire(0, 30);
        let f = fixture(Some(&wire(45, 30)), Some(fresh.clone()));
        let result = f.validator.validate();

        assert!(result.is_valid());
        assert_eq!(f.downloads(), 1);
        assert_eq!(f.file.read().unwrap(), fresh);
    }

    #[test]
    fn test_expired_file_not_renewed() {
        let f = fixture(Some(&wire(45, 30)), Some(wire(40, 30)));
        let result = f.validator.validate();

        assert_eq!(result.parsing, ParsingStatus::Success);
        assert_eq!(result.signature, SignatureStatus::Verified);
        assert_eq!(result.validity, ValidityStatus::Invalid);
        assert!(result.license_info.is_none());
        assert!(result.error.unwrap().contains("expired"));
        assert_eq!(f.downloads(), 1);
    }

    #[test]
    fn test_wrong_signer_always_fails_with_one_download_per_call() {
        let license = License::new("tenant-1", clock().now_utc(), 30, json!({})).unwrap();
        // Signed by the master key, but the client holds the per-license key.
        let forged = codec::issue_signed_by(&license, master_key(), &master_key().to_public_key()).unwrap();
        let f = fixture(Some(&forged), Some(forged.clone()));

        let first = f.validator.validate();
        assert_eq!(first.parsing, ParsingStatus::Success);
        assert_eq!(first.signature, SignatureStatus::VerificationFailed);
        assert_eq!(first.validity, ValidityStatus::Invalid);
        assert_eq!(f.downloads(), 1);

        assert!(!f.validator.is_valid());
        assert_eq!(f.downloads(), 2);
    }

    #[test]
    fn test_network_failure_after_bad_file_keeps_file() {
        let f = fixture(Some("garbage"), None);
        let result = f.validator.validate();

        assert!(!result.is_valid());
        assert!(result.error.unwrap().contains("Network error"));
        assert_eq!(f.file.read().unwrap(), "garbage");
    }

    #[test]
    fn test_exact_expiry_boundary_is_valid() {
        let f = fixture(Some(&wire(30, 30)), None);
        assert!(f.validator.validate().is_valid());
        assert_eq!(f.downloads(), 0);
    }

    #[test]
    fn test_out_of_range_validity_is_rejected_without_panic() {
        // Correctly signed and encrypted, but the expiry instant overflows.
        let license = json!({
            "id": "6f1c2f4e-1111-4a5b-9c3d-000000000002",
            "tenant_id": "tenant-1",
            "issued_at": "2025-01-15T12:00:00Z",
            "validity_days": u32::MAX,
            "payload": {}
        });
        let envelope = LicenseEnvelope {
            signature: sign_value(&license, other_key()).unwrap(),
            license,
        };
        let wire = hybrid_encrypt(&envelope.to_json().unwrap(), &master_key().to_public_key()).unwrap();

        let f = fixture(Some(&wire), None);
        let result = f.validator.validate();

        assert_eq!(result.parsing, ParsingStatus::Failed);
        assert_eq!(result.validity, ValidityStatus::Invalid);
        assert!(result.license_info.is_none());
        assert!(!result.downloaded);
        assert_eq!(f.downloads(), 1);
    }

    #[test]
    fn test_same_file_expires_as_time_passes() {
        let f = fixture(Some(&wire(0, 30)), None);
        assert!(f.validator.validate().is_valid());

        f.clock.advance(Duration::days(30));
        assert!(f.validator.validate().is_valid());
        assert_eq!(f.downloads(), 0);

        f.clock.advance(Duration::seconds(1));
        let result = f.validator.validate();
        assert_eq!(result.signature, SignatureStatus::Verified);
        assert_eq!(result.validity, ValidityStatus::Invalid);
        assert!(result.error.unwrap().contains("Network error"));
        assert_eq!(f.downloads(), 1);
    }

    #[test]
    fn test_with_source_rejects_bad_license_key() {
        let config = ValidatorConfig::new(
            "http://127.0.0.1:9",
            encode_private_key(master_key()).unwrap(),
            "bm90IGEga2V5",
        );
        let source = MockSource {
            reply: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_key: Arc::new(Mutex::new(None)),
        };
        let result = LicenseValidator::with_source(config, Box::new(source));
        assert!(matches!(result, Err(LicvaultError::ConfigError(_))));
    }
}
