//! License policies.

pub mod expiry;
