//! License documents and validation results exchanged with issuers and clients.

pub mod models;
