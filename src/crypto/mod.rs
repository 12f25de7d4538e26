//! Cryptographic primitives: hybrid encryption, license signatures and key material.

pub mod digest;
pub mod hybrid;
pub mod keys;
pub mod signature;
