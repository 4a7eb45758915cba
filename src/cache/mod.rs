//! Document cache
//!
//! Holds the last fetched vault and the last rendered entry list in the
//! durable store, so a later run can decrypt or show the picker without
//! fetching again. The last decrypted document is kept in memory only:
//! - stored as `secrecy::SecretString`, so it never reaches log output
//! - replaced wholesale on every successful decrypt

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::fetch::RawVault;
use crate::store::{Store, StoreError, StoreKey};

pub struct DocumentCache {
    /// Durable slots
    store: Arc<Store>,
    /// Last decrypted document, this process only
    document: RwLock<Option<SecretString>>,
}

impl DocumentCache {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            document: RwLock::new(None),
        }
    }

    fn record(hit: bool, slot: &str) {
        if hit {
            tracing::debug!(slot, "cache hit");
        } else {
            tracing::debug!(slot, "cache miss");
        }
    }

    /// Replace the raw vault slot
    pub fn put_raw(&self, raw: &RawVault) -> Result<(), StoreError> {
        self.store.put(StoreKey::VaultData, raw.as_bytes())?;
        tracing::debug!(bytes = raw.len(), "cached raw vault");
        Ok(())
    }

    /// The last fetched vault, if any
    pub fn raw(&self) -> Result<Option<RawVault>, StoreError> {
        let raw = self.store.get_bytes(StoreKey::VaultData)?.map(RawVault::new);
        Self::record(raw.is_some(), "raw");
        Ok(raw)
    }

    /// When the raw vault slot was last written
    pub fn raw_updated_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.store.updated_at(StoreKey::VaultData)
    }

    /// Replace the rendered entry list
    pub fn put_names(&self, markup: &str) -> Result<(), StoreError> {
        self.store.put_string(StoreKey::NamesMarkup, markup)
    }

    /// The last rendered entry list, if any
    pub fn names(&self) -> Result<Option<String>, StoreError> {
        self.store.get_string(StoreKey::NamesMarkup)
    }

    /// Replace the decrypted document
    pub fn put_document(&self, text: SecretString) {
        let mut document = self.document.write().unwrap_or_else(|e| e.into_inner());
        *document = Some(text);
        tracing::debug!("cached decrypted document");
    }

    /// Run `f` on the decrypted document, if one is cached
    pub fn with_document<R>(&self, f: impl FnOnce(&str) -> R) -> Option<R> {
        let document = self.document.read().unwrap_or_else(|e| e.into_inner());
        Self::record(document.is_some(), "document");
        document.as_ref().map(|doc| f(doc.expose_secret()))
    }
}
