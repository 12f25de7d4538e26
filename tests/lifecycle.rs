//! End-to-end: issue on the authority side, validate on the client side.

mod common;

use common::*;
use licvault::client::http::{encode_license_key, LICENSE_KEY_PARAM};
use licvault::config::ISSUE_PATH;
use licvault::{LicenseValidator, ParsingStatus, SignatureStatus, ValidityStatus};
use std::sync::atomic::Ordering;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OFFLINE_URL: &str = "https://licenses.invalid";

#[test]
fn issued_file_validates_offline() {
    let authority = authority(OFFLINE_URL);
    let license = fresh_license(30);
    let wire = authority
        .issue_license(&license, Some(license_signing_key()))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("license.lic");
    std::fs::write(&file, &wire).unwrap();

    let source = StaticSource::offline();
    let calls = source.calls.clone();
    let validator = LicenseValidator::with_source(
        validator_config(OFFLINE_URL, license_signing_key(), &file),
        Box::new(source),
    )
    .unwrap();

    let result = validator.validate();
    assert!(result.is_valid(), "{:?}", result.error);
    assert!(!result.downloaded);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let info = result.license_info.unwrap();
    assert_eq!(info.id, license.id);
    assert_eq!(info.payload, license.payload);
    assert_eq!(info.expires_at, license.expires_at());
}

#[test]
fn forged_file_is_replaced_once() {
    let authority = authority(OFFLINE_URL);
    // Signed by the master key, but the client trusts the per-license key.
    let forged = authority.issue_license(&fresh_license(30), None).unwrap();
    let genuine = authority
        .issue_license(&fresh_license(30), Some(license_signing_key()))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("license.lic");
    std::fs::write(&file, &forged).unwrap();

    let source = StaticSource::serving(genuine.clone());
    let calls = source.calls.clone();
    let validator = LicenseValidator::with_source(
        validator_config(OFFLINE_URL, license_signing_key(), &file),
        Box::new(source),
    )
    .unwrap();

    let result = validator.validate();
    assert!(result.is_valid(), "{:?}", result.error);
    assert!(result.downloaded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), genuine);
}

#[test]
fn corrupt_file_without_backend_reports_every_indicator() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("license.lic");
    std::fs::write(&file, "no colon here").unwrap();

    let source = StaticSource::offline();
    let calls = source.calls.clone();
    let validator = LicenseValidator::with_source(
        validator_config(OFFLINE_URL, license_signing_key(), &file),
        Box::new(source),
    )
    .unwrap();

    let result = validator.validate();
    assert_eq!(result.parsing, ParsingStatus::Failed);
    assert_eq!(result.signature, SignatureStatus::VerificationFailed);
    assert_eq!(result.validity, ValidityStatus::Invalid);
    assert!(!result.downloaded);
    assert!(result.error.unwrap().starts_with("Network error"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn rotated_authority_still_inspects_old_files() {
    let authority = authority(OFFLINE_URL);
    let wire = authority
        .issue_license(&fresh_license(7), Some(license_signing_key()))
        .unwrap();

    authority.rotate_master_key().unwrap();
    let keys = authority.master_keys().unwrap();
    assert_eq!(keys.len(), 2);

    let result = authority.inspect_license_file(&wire, &public_b64(license_signing_key()));
    assert!(result.is_valid(), "{:?}", result.error);
}

#[test]
fn generated_validators_embed_the_active_key() {
    let authority = authority("https://licenses.example.com");
    let key = authority.current_master_private_key().unwrap();
    for language in ["js", "ts", "py", "java", "rust", "dart", "go"] {
        let generated = authority.generate_validator(language).unwrap();
        assert!(generated.code.contains(key.as_str()), "{}", language);
        assert!(!generated.code.contains("@@"), "{}", language);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_file_is_downloaded_from_backend() {
    let server = MockServer::start().await;
    let authority = authority(&server.uri());
    let wire = authority
        .issue_license(&fresh_license(30), Some(license_signing_key()))
        .unwrap();

    Mock::given(method("GET"))
        .and(path(ISSUE_PATH))
        .and(query_param(
            LICENSE_KEY_PARAM,
            encode_license_key(&public_b64(license_signing_key())),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(wire.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("nested").join("license.lic");
    let config = validator_config(&server.uri(), license_signing_key(), &file);

    let result = tokio::task::spawn_blocking(move || LicenseValidator::new(config).unwrap().validate())
        .await
        .unwrap();

    assert!(result.is_valid(), "{:?}", result.error);
    assert!(result.downloaded);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), wire);
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_refusal_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ISSUE_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("license.lic");
    let config = validator_config(&server.uri(), license_signing_key(), &file);

    let result = tokio::task::spawn_blocking(move || LicenseValidator::new(config).unwrap().validate())
        .await
        .unwrap();

    assert!(!result.is_valid());
    assert!(!result.downloaded);
    assert!(result.error.unwrap().contains("403"));
    assert!(!file.exists());
}
