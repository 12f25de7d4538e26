//! Reqwest-based client for the issuance endpoint.
//!
//! `GET {base}/api/licenses/issue?encoded_license_key=<base64(LICENSE_KEY)>`
//! answers 200 with the raw wire string.

use crate::client::LicenseSource;
use crate::config::{ValidatorConfig, ISSUE_PATH};
use crate::LicvaultError;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Query parameter carrying the encoded license key.
pub const LICENSE_KEY_PARAM: &str = "encoded_license_key";

/// Blocking HTTP client for license issuance.
pub struct IssuanceClient {
    client: Client,
    issue_url: String,
    user_agent: String,
}

impl IssuanceClient {
    /// Create a client for the backend at `api_base_url`.
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self, LicvaultError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicvaultError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            issue_url: format!("{}{}", api_base_url.trim_end_matches('/'), ISSUE_PATH),
            user_agent: build_user_agent(),
        })
    }

    /// Create a client from validator settings.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, LicvaultError> {
        Self::new(&config.api_base_url, config.timeout)
    }

    /// Issuance URL requests are sent to.
    pub fn issue_url(&self) -> &str {
        &self.issue_url
    }
}

impl LicenseSource for IssuanceClient {
    fn fetch_license(&self, license_key: &str) -> Result<Vec<u8>, LicvaultError> {
        let encoded = encode_license_key(license_key);
        debug!(url = %self.issue_url, "Requesting fresh license");

        let response = self
            .client
            .get(&self.issue_url)
            .query(&[(LICENSE_KEY_PARAM, encoded.as_str())])
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/plain")
            .send()
            .map_err(|e| LicvaultError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Issuance endpoint refused the request");
            return Err(LicvaultError::Network(format!(
                "Issuance endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| LicvaultError::Network(format!("Failed to read body: {}", e)))?;
        Ok(body.to_vec())
    }
}

/// Base64 of the license key string's bytes, as the endpoint expects.
pub fn encode_license_key(license_key: &str) -> String {
    STANDARD.encode(license_key.trim().as_bytes())
}

/// Build a User-Agent string: `licvault/<version>`.
pub fn build_user_agent() -> String {
    format!("licvault/{}", env!("CARGO_PKG_VERSION"))
}
