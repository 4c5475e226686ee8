//! Credential lifecycle: acquisition, durable storage and renewal.

/// The in-memory credential holder and its `with_auth` middleware.
pub mod store;
/// Pluggable ways of producing a fresh credential.
pub mod strategy;
/// `token.json` persistence.
pub mod token_file;

pub use store::{CredentialStore, Renewal, AUTH_SCHEME};
pub use strategy::{parse_expiry, AcquireError, AcquisitionStrategy, Credential, StaticToken};
pub use token_file::TokenFile;
