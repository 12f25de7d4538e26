//! Standalone validator source generation.
//!
//! Each template is a self-contained client validator running the same
//! decrypt, verify and expiry steps as [`crate::LicenseValidator`]. Rendering
//! substitutes four `@@NAME@@` placeholders into string literals.

use crate::config::{DEFAULT_LICENSE_FILE, ISSUE_PATH};
use crate::crypto::keys::decode_private_key;
use crate::LicvaultError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;

const BASE_URL_PLACEHOLDER: &str = "@@BASE_URL@@";
const ISSUE_PATH_PLACEHOLDER: &str = "@@ISSUE_PATH@@";
const MASTER_KEY_PLACEHOLDER: &str = "@@MASTER_PRIVATE_KEY@@";
const LICENSE_FILE_PLACEHOLDER: &str = "@@LICENSE_FILE@@";

/// Characters that would break out of a string literal in some template.
const FORBIDDEN_LITERAL_CHARS: [char; 7] = ['"', '\\', '\'', '$', '`', '\n', '\r'];

/// Base name of every generated file.
pub const VALIDATOR_FILE_STEM: &str = "license-validator";

/// Target language for a generated validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    /// Node.js, CommonJS.
    #[serde(rename = "js")]
    JavaScript,
    /// Node.js, ES modules.
    #[serde(rename = "ts")]
    TypeScript,
    /// Python 3 with `cryptography`.
    #[serde(rename = "py")]
    Python,
    /// Java 17 with Jackson.
    Java,
    /// Rust with RustCrypto and reqwest.
    Rust,
    /// Dart with pointycastle.
    Dart,
    /// Go, standard library only.
    Go,
}

impl TargetLanguage {
    /// Every supported language.
    pub const ALL: [TargetLanguage; 7] = [
        TargetLanguage::JavaScript,
        TargetLanguage::TypeScript,
        TargetLanguage::Python,
        TargetLanguage::Java,
        TargetLanguage::Rust,
        TargetLanguage::Dart,
        TargetLanguage::Go,
    ];

    /// Identifier accepted by [`FromStr`].
    pub fn id(self) -> &'static str {
        match self {
            TargetLanguage::JavaScript => "js",
            TargetLanguage::TypeScript => "ts",
            TargetLanguage::Python => "py",
            TargetLanguage::Java => "java",
            TargetLanguage::Rust => "rust",
            TargetLanguage::Dart => "dart",
            TargetLanguage::Go => "go",
        }
    }

    /// File extension of the generated source.
    pub fn extension(self) -> &'static str {
        match self {
            TargetLanguage::Rust => "rs",
            other => other.id(),
        }
    }

    /// `license-validator.<ext>`.
    pub fn filename(self) -> String {
        format!("{}.{}", VALIDATOR_FILE_STEM, self.extension())
    }

    fn template(self) -> &'static str {
        match self {
            TargetLanguage::JavaScript => include_str!("templates/js.tmpl"),
            TargetLanguage::TypeScript => include_str!("templates/ts.tmpl"),
            TargetLanguage::Python => include_str!("templates/py.tmpl"),
            TargetLanguage::Java => include_str!("templates/java.tmpl"),
            TargetLanguage::Rust => include_str!("templates/rust.tmpl"),
            TargetLanguage::Dart => include_str!("templates/dart.tmpl"),
            TargetLanguage::Go => include_str!("templates/go.tmpl"),
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = LicvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetLanguage::ALL
            .into_iter()
            .find(|lang| lang.id() == s)
            .ok_or_else(|| LicvaultError::UnsupportedLanguage(s.to_string()))
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Rendered validator source.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedValidator {
    /// Language the code is written in.
    pub language: TargetLanguage,
    /// Suggested file name.
    pub filename: String,
    /// Source code.
    pub code: String,
}

impl GeneratedValidator {
    /// `{"code": "..."}`, the body served by the generation endpoint.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "code": self.code })
    }
}

/// Renders validator templates for one issuing backend.
#[derive(Debug, Clone)]
pub struct ValidatorCodeGenerator {
    base_url: String,
    license_file: String,
}

impl ValidatorCodeGenerator {
    /// Generator for validators that download from `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            license_file: DEFAULT_LICENSE_FILE.to_string(),
        }
    }

    /// Default license file baked into generated validators.
    pub fn with_license_file(mut self, license_file: impl Into<String>) -> Self {
        self.license_file = license_file.into();
        self
    }

    /// Render the validator for `language`, embedding `master_private_key`
    /// (base64 DER PKCS#8).
    ///
    /// # Errors
    /// * `KeyMaterial` - the key does not decode as an RSA private key
    /// * `TemplateError` - a substituted value would break a string literal,
    ///   or a placeholder survived rendering
    pub fn generate(
        &self,
        language: TargetLanguage,
        master_private_key: &str,
    ) -> Result<GeneratedValidator, LicvaultError> {
        let master_private_key = master_private_key.trim();
        decode_private_key(master_private_key)?;

        let base_url = self.base_url.trim_end_matches('/');
        check_literal("base URL", base_url)?;
        check_literal("license file", &self.license_file)?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LicvaultError::TemplateError(format!(
                "base URL must be an http(s) URL, got {:?}",
                base_url
            )));
        }

        let code = language
            .template()
            .replace(BASE_URL_PLACEHOLDER, base_url)
            .replace(ISSUE_PATH_PLACEHOLDER, ISSUE_PATH)
            .replace(LICENSE_FILE_PLACEHOLDER, &self.license_file)
            .replace(MASTER_KEY_PLACEHOLDER, master_private_key);

        if let Some(pos) = code.find("@@") {
            let rest = &code[pos..];
            let end = rest.len().min(40);
            return Err(LicvaultError::TemplateError(format!(
                "unsubstituted placeholder in {} template near {:?}",
                language,
                rest.get(..end).unwrap_or(rest)
            )));
        }

        info!(language = %language, "Generated license validator");
        Ok(GeneratedValidator {
            language,
            filename: language.filename(),
            code,
        })
    }

    /// [`generate`](Self::generate) with the language given by identifier.
    pub fn generate_for(&self, language: &str, master_private_key: &str) -> Result<GeneratedValidator, LicvaultError> {
        self.generate(language.parse()?, master_private_key)
    }
}

fn check_literal(what: &str, value: &str) -> Result<(), LicvaultError> {
    if value.is_empty() {
        return Err(LicvaultError::TemplateError(format!("{} cannot be empty", what)));
    }
    if let Some(c) = value.chars().find(|c| FORBIDDEN_LITERAL_CHARS.contains(c)) {
        return Err(LicvaultError::TemplateError(format!(
            "{} contains forbidden character {:?}",
            what, c
        )));
    }
    Ok(())
}
