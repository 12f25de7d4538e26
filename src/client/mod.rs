//! Download of fresh license files from the issuing backend.

pub mod http;

use crate::LicvaultError;

/// Something that can hand out a fresh license file for a license key.
///
/// Implementations return the raw wire string bytes. Any failure, including
/// a non-success response, is reported as `Network`.
pub trait LicenseSource: Send + Sync {
    /// Fetch a newly issued license for `license_key` (base64 DER public key).
    fn fetch_license(&self, license_key: &str) -> Result<Vec<u8>, LicvaultError>;
}

pub use http::IssuanceClient;
