//! License documents, the signed envelope and validation results.

use crate::policy::expiry;
use crate::LicvaultError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An issued license. Immutable: a renewal is a new license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    /// License identifier (UUID).
    pub id: String,

    /// Owning tenant identifier.
    pub tenant_id: String,

    /// Issuance instant.
    #[serde(with = "timestamp")]
    pub issued_at: DateTime<Utc>,

    /// Number of days the license stays valid after `issued_at`. Always > 0.
    pub validity_days: u32,

    /// Arbitrary business data carried by the license.
    #[serde(default)]
    pub payload: Value,

    /// Subscription this license was issued for, if any. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_subscription: Option<String>,
}

impl License {
    /// Create a license with a fresh id.
    ///
    /// `issued_at` is truncated to microseconds, the finest precision every
    /// generated validator can parse.
    pub fn new(
        tenant_id: impl Into<String>,
        issued_at: DateTime<Utc>,
        validity_days: u32,
        payload: Value,
    ) -> Result<Self, LicvaultError> {
        let license = Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            issued_at: issued_at.trunc_subsecs(6),
            validity_days,
            payload,
            linked_subscription: None,
        };
        license.validate()?;
        Ok(license)
    }

    /// Attach the subscription this license was issued for.
    pub fn with_linked_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.linked_subscription = Some(subscription_id.into());
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), LicvaultError> {
        if self.validity_days == 0 {
            return Err(LicvaultError::ParseError(
                "validity_days must be greater than zero".to_string(),
            ));
        }
        if self.validity_days > expiry::MAX_VALIDITY_DAYS {
            return Err(LicvaultError::ParseError(format!(
                "validity_days must be at most {}, got {}",
                expiry::MAX_VALIDITY_DAYS,
                self.validity_days
            )));
        }
        if expiry::expires_at(self.issued_at, self.validity_days).is_none() {
            return Err(LicvaultError::ParseError(
                "issued_at + validity_days is out of range".to_string(),
            ));
        }
        if self.id.is_empty() || self.tenant_id.is_empty() {
            return Err(LicvaultError::ParseError(
                "license id and tenant_id must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Decode a license from its JSON form.
    pub fn from_value(value: &Value) -> Result<Self, LicvaultError> {
        let license: License = serde_json::from_value(value.clone())
            .map_err(|e| LicvaultError::ParseError(format!("Malformed license: {}", e)))?;
        license.validate()?;
        Ok(license)
    }

    /// JSON form of this license; the exact value that gets signed.
    pub fn to_value(&self) -> Result<Value, LicvaultError> {
        serde_json::to_value(self)
            .map_err(|e| LicvaultError::ParseError(format!("Failed to serialize license: {}", e)))
    }

    /// Last instant at which the license is still valid.
    ///
    /// Saturates at the end of the representable range; [`validate`](Self::validate)
    /// rejects licenses that would reach it.
    pub fn expires_at(&self) -> DateTime<Utc> {
        expiry::expires_at(self.issued_at, self.validity_days).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// `{license, signature}` as found inside a decrypted `.lic` file.
///
/// The license stays raw JSON so the signature is checked over exactly what
/// was issued, whatever produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseEnvelope {
    /// The signed license object.
    pub license: Value,

    /// Base64 RSA-PSS signature over the canonical form of `license`.
    pub signature: String,
}

impl LicenseEnvelope {
    /// Compact JSON encoding, the plaintext handed to the hybrid cipher.
    pub fn to_json(&self) -> Result<String, LicvaultError> {
        serde_json::to_string(self)
            .map_err(|e| LicvaultError::ParseError(format!("Failed to serialize envelope: {}", e)))
    }

    /// Parse a decrypted envelope.
    pub fn from_json(json: &str) -> Result<Self, LicvaultError> {
        let envelope: LicenseEnvelope = serde_json::from_str(json)
            .map_err(|e| LicvaultError::ParseError(format!("Malformed license envelope: {}", e)))?;
        if !envelope.license.is_object() {
            return Err(LicvaultError::ParseError(
                "Envelope license member is not an object".to_string(),
            ));
        }
        Ok(envelope)
    }

    /// Typed view of the license member.
    pub fn license(&self) -> Result<License, LicvaultError> {
        License::from_value(&self.license)
    }
}

/// License details exposed to callers after a successful parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    /// License identifier.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Issuance instant.
    #[serde(with = "timestamp")]
    pub issued_at: DateTime<Utc>,
    /// Validity window length in days.
    pub validity_days: u32,
    /// Business payload, exactly as issued.
    pub payload: Value,
    /// Last valid instant.
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
}

impl From<&License> for LicenseInfo {
    fn from(license: &License) -> Self {
        Self {
            id: license.id.clone(),
            tenant_id: license.tenant_id.clone(),
            issued_at: license.issued_at,
            validity_days: license.validity_days,
            payload: license.payload.clone(),
            expires_at: license.expires_at(),
        }
    }
}

/// Whether the license file decrypted and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingStatus {
    /// Decrypted and parsed.
    Success,
    /// Unreadable, undecryptable or malformed.
    Failed,
}

/// Whether the license is inside its validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    /// All checks passed (validator) or not expired (inspection).
    Valid,
    /// Expired or not established.
    Invalid,
}

/// Whether the signature matched the client-held public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// Signature matched.
    Verified,
    /// Signature mismatched or could not be checked.
    VerificationFailed,
}

/// Outcome of one validation or inspection.
///
/// The three indicators are independent so callers can tell apart, say,
/// "parsed fine but the signature failed" from "could not decrypt".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Decrypt + parse outcome.
    pub parsing: ParsingStatus,

    /// Expiry outcome.
    pub validity: ValidityStatus,

    /// Signature outcome.
    pub signature: SignatureStatus,

    /// License details, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_info: Option<LicenseInfo>,

    /// Human-readable reason for the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether a fresh license was downloaded during this run.
    #[serde(default)]
    pub downloaded: bool,
}

impl ValidationResult {
    /// Every indicator failed, with the given reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            parsing: ParsingStatus::Failed,
            validity: ValidityStatus::Invalid,
            signature: SignatureStatus::VerificationFailed,
            license_info: None,
            error: Some(error.into()),
            downloaded: false,
        }
    }

    /// True when the license parsed, verified and has not expired.
    pub fn is_valid(&self) -> bool {
        self.parsing == ParsingStatus::Success
            && self.signature == SignatureStatus::Verified
            && self.validity == ValidityStatus::Valid
    }
}

/// Parse an `issued_at` string.
///
/// Accepts RFC 3339 with any offset, and naive ISO-8601 date-times, which are
/// taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, LicvaultError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| LicvaultError::ParseError(format!("Invalid timestamp {:?}: {}", s, e)))
}

/// Format a timestamp the way licenses carry it (`2025-01-15T12:00:00Z`).
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}
