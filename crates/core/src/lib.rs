#![warn(clippy::all, missing_docs)]

//! Core logic for achsync.
//!
//! This crate hosts the credential lifecycle, the game catalogue, the
//! typed gateway to the remote achievement services and the resumable
//! discovery and unlock engines driven by the command-line frontend.

pub mod auth;
pub mod catalogue;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod models;

#[cfg(test)]
mod testing;

pub use auth::{AcquisitionStrategy, Credential, CredentialStore, StaticToken, TokenFile};
pub use catalogue::Catalogue;
pub use config::AppConfig;
pub use engine::{
    BatchOutcome, DiscoveryReport, Interrupts, SyncEngine, UnlockEngine, UnlockReport,
};
pub use error::{ApiError, SyncError};
pub use gateway::{RemoteGateway, UserProfile, XboxGateway};
pub use models::{Achievement, Game, GameStatus};
