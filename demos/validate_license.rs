//! Validate the local license file.
//!
//! # Running
//!
//! ```bash
//! export LICENSE_KEY="<base64 DER public key>"
//! export LICVAULT_MASTER_PRIVATE_KEY="<base64 DER PKCS#8 master key>"
//! export LICENSE_FILE_PATH=./license.lic   # optional
//! RUST_LOG=licvault=debug cargo run --example validate_license
//! ```
//!
//! # Note
//!
//! In production the API base URL and master key are compile-time constants
//! of your binary, as in the generated validators. Only `LICENSE_KEY` and
//! `LICENSE_FILE_PATH` should come from the environment.

use licvault::{LicenseValidator, ValidatorConfig};
use tracing_subscriber::EnvFilter;

const API_BASE_URL: &str = "https://licenses.example.com";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let master_private_key = std::env::var("LICVAULT_MASTER_PRIVATE_KEY").unwrap_or_default();

    let validator = match ValidatorConfig::from_env(API_BASE_URL, master_private_key)
        .and_then(LicenseValidator::new)
    {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let result = validator.validate();
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render result: {}", e),
    }

    if result.is_valid() {
        if let Some(info) = &result.license_info {
            println!("License {} valid until {}", info.id, info.expires_at);
        }
    } else {
        match result.error.as_deref() {
            Some(msg) if msg.starts_with("Network error") => {
                eprintln!("Could not reach the license server: {}", msg)
            }
            Some(msg) => eprintln!("License rejected: {}", msg),
            None => eprintln!("License rejected"),
        }
        std::process::exit(1);
    }
}

