//! Shared RSA fixtures for unit tests.
//!
//! Key generation dominates test time, so every test reuses the same two pairs.

use once_cell::sync::Lazy;
use rsa::RsaPrivateKey;

static MASTER_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate master key"));

static OTHER_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate other key"));

/// The key most tests encrypt and sign with.
pub fn master_key() -> &'static RsaPrivateKey {
    &MASTER_KEY
}

/// An unrelated key, for wrong-key cases.
pub fn other_key() -> &'static RsaPrivateKey {
    &OTHER_KEY
}
