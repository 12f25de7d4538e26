//! Master key lifecycle: generation, activation, rotation, override and masked display.

pub mod record;
pub mod store;

pub use crate::storage::keyring::{FileKeyStorage, KeyStorage, MemoryKeyStorage};
pub use record::{MaskedMasterKey, MasterKeyPair, OverrideRequest};
pub use store::MasterKeyStore;
