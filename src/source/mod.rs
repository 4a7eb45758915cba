//! Vault source selection
//!
//! A vault comes either from a fully qualified URL or from a link on a host
//! page, identified by its bare file name. The selection is persisted in the
//! store and re-read before every fetch.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::store::{Store, StoreKey};
use crate::VaultError;

/// Location used when nothing has been selected yet
pub const DEFAULT_LOCATION: &str = "pwd";

/// Where the vault is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Direct network GET
    Url,
    /// Named link on the host page, fetched by the page scanner
    PageLink,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Url => "url",
            SourceKind::PageLink => "page_link",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "url" => Some(SourceKind::Url),
            "page_link" => Some(SourceKind::PageLink),
            _ => None,
        }
    }
}

/// A validated source selection.
///
/// The kind and location are only constructible together, so a `PageLink`
/// always carries a bare file name and a `Url` a fully qualified URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    kind: SourceKind,
    location: String,
}

impl SourceConfig {
    /// Source fetched directly from `url`
    pub fn url(url: &str) -> Result<Self, VaultError> {
        let parsed = Url::parse(url)
            .map_err(|e| VaultError::InvalidSource(format!("'{url}' is not a URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(VaultError::InvalidSource(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            kind: SourceKind::Url,
            location: url.to_string(),
        })
    }

    /// Source found as a link named `filename` on the host page
    pub fn page_link(filename: &str) -> Result<Self, VaultError> {
        if filename.is_empty() {
            return Err(VaultError::InvalidSource("empty file name".into()));
        }
        if filename.contains('/') || filename.contains("://") {
            return Err(VaultError::InvalidSource(format!(
                "'{filename}' is not a bare file name"
            )));
        }
        Ok(Self {
            kind: SourceKind::PageLink,
            location: filename.to_string(),
        })
    }

    pub fn new(kind: SourceKind, location: &str) -> Result<Self, VaultError> {
        match kind {
            SourceKind::Url => Self::url(location),
            SourceKind::PageLink => Self::page_link(location),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::PageLink,
            location: DEFAULT_LOCATION.to_string(),
        }
    }
}

impl fmt::Display for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SourceKind::Url => write!(f, "url {}", self.location),
            SourceKind::PageLink => write!(f, "page link '{}'", self.location),
        }
    }
}

/// Reads and writes the persisted source selection
#[derive(Clone)]
pub struct SourceLocator {
    store: Arc<Store>,
}

impl SourceLocator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Current selection, or the default page link `pwd` when unset.
    ///
    /// A persisted pair that no longer validates falls back to the default.
    pub fn resolve(&self) -> Result<SourceConfig, VaultError> {
        let kind = self.store.get_string(StoreKey::SourceKind)?;
        let location = self.store.get_string(StoreKey::SourceLocation)?;

        let kind = kind
            .as_deref()
            .and_then(SourceKind::parse)
            .unwrap_or(SourceKind::PageLink);
        let location = location.unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        match SourceConfig::new(kind, &location) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(error = %e, "persisted source is invalid, using default");
                Ok(SourceConfig::default())
            }
        }
    }

    /// Persist an explicit user selection
    pub fn select(&self, config: &SourceConfig) -> Result<(), VaultError> {
        self.store.put_string(StoreKey::SourceKind, config.kind().as_str())?;
        self.store
            .put_string(StoreKey::SourceLocation, config.location())?;
        tracing::info!(source = %config, "source selected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> SourceLocator {
        SourceLocator::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    #[test]
    fn test_default_is_page_link_pwd() {
        let config = locator().resolve().unwrap();
        assert_eq!(config.kind(), SourceKind::PageLink);
        assert_eq!(config.location(), "pwd");
    }

    #[test]
    fn test_select_then_resolve() {
        let locator = locator();
        let config = SourceConfig::url("https://example.com/vault.rvl").unwrap();
        locator.select(&config).unwrap();
        assert_eq!(locator.resolve().unwrap(), config);

        let config = SourceConfig::page_link("passwords").unwrap();
        locator.select(&config).unwrap();
        assert_eq!(locator.resolve().unwrap(), config);
    }

    #[test]
    fn test_kind_location_consistency() {
        assert!(SourceConfig::url("vault.rvl").is_err());
        assert!(SourceConfig::url("ftp://example.com/v").is_err());
        assert!(SourceConfig::page_link("https://example.com/v").is_err());
        assert!(SourceConfig::page_link("dir/file").is_err());
        assert!(SourceConfig::page_link("").is_err());
        assert!(SourceConfig::new(SourceKind::PageLink, "pwd").is_ok());
    }

    #[test]
    fn test_inconsistent_persisted_pair_falls_back() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.put_string(StoreKey::SourceKind, "url").unwrap();
        store.put_string(StoreKey::SourceLocation, "pwd").unwrap();
        let config = SourceLocator::new(store).resolve().unwrap();
        assert_eq!(config, SourceConfig::default());
    }
}
