//! Revelation Fill - fetch, decrypt and browse Revelation password vaults
//!
//! This library provides the retrieval and decryption pipeline: source
//! selection, fetching (directly or through a page scanner), the decryption
//! engine handshake, the durable document cache and the entry catalog.

pub mod cache;
pub mod catalog;
pub mod channel;
pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod orchestrator;
pub mod protocol;
pub mod scanner;
pub mod source;
pub mod store;

use thiserror::Error;

/// Main error type for vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("channel error: {0}")]
    Channel(#[from] channel::ChannelError),

    /// Error text reported by the decryption engine, kept verbatim
    #[error("{0}")]
    Decrypt(String),

    #[error("XML parser error")]
    Parse(#[from] catalog::CatalogError),

    #[error("Not found: {name}")]
    NotFound { name: String },

    #[error("no vault data has been loaded")]
    NoVaultData,

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;
