//! Issue a license file from the local master keyring.
//!
//! # Running
//!
//! ```bash
//! cargo run --example issue_license -- tenant-1 30
//! ```
//!
//! Writes `license.lic` and prints the settings a client needs to validate
//! it with the `validate_license` example.

use licvault::{KeyStoreConfig, License, LicenseAuthority, LicenseKeyPair, LicvaultError, MasterKeyStore};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const API_BASE_URL: &str = "https://licenses.example.com";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), LicvaultError> {
    let mut args = std::env::args().skip(1);
    let tenant = args.next().unwrap_or_else(|| "demo-tenant".to_string());
    let days: u32 = match args.next() {
        Some(raw) => raw
            .parse()
            .map_err(|_| LicvaultError::ConfigError(format!("validity days must be a number, got {:?}", raw)))?,
        None => 30,
    };

    let config = KeyStoreConfig {
        namespace: "licvault-demo".to_string(),
        ..KeyStoreConfig::default()
    };
    let authority = LicenseAuthority::new(MasterKeyStore::open_default(&config)?, API_BASE_URL);

    // Each license gets its own signing pair; the public half is the client's LICENSE_KEY.
    let license_keys = LicenseKeyPair::generate()?;
    let license = License::new(tenant, chrono::Utc::now(), days, json!({"plan": "demo"}))?;
    let wire = authority.issue_license_for(&license, &license_keys)?;

    std::fs::write("license.lic", &wire).map_err(|e| LicvaultError::StorageIO(e.to_string()))?;

    println!("Issued license {} (expires {})", license.id, license.expires_at());
    println!();
    for key in authority.master_keys()? {
        println!(
            "  master key {} active={} private={}",
            key.id, key.is_active, key.private_key_masked
        );
    }
    println!();
    println!("export LICENSE_KEY={}", license_keys.public_key);
    println!("export LICVAULT_MASTER_PRIVATE_KEY={}", authority.current_master_private_key()?.as_str());
    Ok(())
}
