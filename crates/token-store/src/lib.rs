//! Session token persistence for the partner console.
//!
//! This crate provides:
//! - A `KeyValueStorage` seam so the backend can be swapped without touching
//!   the session layer
//! - `FileStorage` (durable, survives restarts) and `MemoryStorage` backends
//! - `TokenStore`, which stores the access token, refresh token and cached
//!   admin profile and never surfaces backend failures to its callers
//!
//! Values are persisted in plaintext. The store is only as safe as the
//! account and filesystem it runs under.

mod file;
mod keys;
mod memory;
mod profile;
mod store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use profile::{AdminProfile, AdminRole};
pub use store::TokenStore;
pub use traits::KeyValueStorage;

use console_config::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default durable storage: a JSON file under the console's data
/// directory.
pub fn create_storage(paths: &Paths) -> Box<dyn KeyValueStorage> {
    Box::new(FileStorage::new(paths.session_file()))
}

/// Create a TokenStore over the default durable storage.
pub fn create_token_store(paths: &Paths) -> TokenStore {
    TokenStore::new(create_storage(paths))
}
