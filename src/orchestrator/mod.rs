//! Orchestrator
//!
//! Sequences source resolution, fetching, decryption, parsing and display in
//! response to user actions, and keeps the single user-facing status string.
//!
//! ```text
//! Idle -> Loading -> Ready -> Decrypting -> Displaying(entry)
//!            \                     \-----> Failed(reason)
//!             \--------------------------> Failed(reason)
//! ```
//!
//! Every operation takes `&mut self`, so one orchestrator never runs two
//! steps at once. A new password submission is accepted from any phase.

use secrecy::{ExposeSecret, SecretString};

use crate::cache::DocumentCache;
use crate::catalog::{self, Catalog, Choice, Entry};
use crate::client::DecryptionClient;
use crate::fetch::Fetcher;
use crate::source::{SourceKind, SourceLocator};
use crate::VaultError;

/// Status shown before anything has happened
pub const INITIAL_STATUS: &str = "NO-STATUS";

/// Pipeline phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    /// A raw vault is cached and can be decrypted
    Ready,
    Decrypting,
    Displaying { name: String },
    Failed { reason: String },
}

/// The rendered form for one entry
#[derive(Debug)]
pub struct DisplayedEntry {
    pub name: String,
    pub description: String,
    pub username: String,
    pub password: SecretString,
}

impl DisplayedEntry {
    fn from_entry(entry: &Entry) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            username: entry.username().unwrap_or_default().to_string(),
            password: SecretString::from(entry.password().unwrap_or_default()),
        }
    }
}

/// Everything the user sees
#[derive(Debug)]
pub struct OrchestratorState {
    phase: Phase,
    status: String,
    selected: Option<String>,
    choices: Vec<Choice>,
    displayed: Option<DisplayedEntry>,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            status: INITIAL_STATUS.to_string(),
            selected: None,
            choices: Vec::new(),
            displayed: None,
        }
    }
}

impl OrchestratorState {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Name currently chosen in the picker
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Picker contents
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn displayed(&self) -> Option<&DisplayedEntry> {
        self.displayed.as_ref()
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        tracing::info!(status = %self.status, "status");
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    /// Name to render: the explicit selection, else the first picker entry
    fn name_to_show(&self) -> Option<String> {
        self.selected
            .clone()
            .or_else(|| self.choices.first().map(Choice::name))
    }
}

pub struct Orchestrator {
    locator: SourceLocator,
    fetcher: Fetcher,
    client: DecryptionClient,
    cache: DocumentCache,
    default_type: String,
    state: OrchestratorState,
}

impl Orchestrator {
    pub fn new(
        locator: SourceLocator,
        fetcher: Fetcher,
        client: DecryptionClient,
        cache: DocumentCache,
    ) -> Self {
        Self {
            locator,
            fetcher,
            client,
            cache,
            default_type: catalog::DEFAULT_TYPE.to_string(),
            state: OrchestratorState::default(),
        }
    }

    /// Entry type listed without a "(type)" suffix
    pub fn with_default_type(mut self, default_type: impl Into<String>) -> Self {
        self.default_type = default_type.into();
        self
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn status(&self) -> &str {
        self.state.status()
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    fn fail(&mut self, err: VaultError) -> VaultError {
        let reason = err.to_string();
        self.state.set_status(reason.clone());
        self.state.enter(Phase::Failed { reason });
        err
    }

    /// Bring back what the previous run left: the picker and the raw vault
    pub fn restore(&mut self) -> Result<(), VaultError> {
        if let Some(markup) = self.cache.names()? {
            self.state.choices = catalog::parse_options(&markup);
            tracing::debug!(choices = self.state.choices.len(), "picker restored");
        }
        if self.cache.raw()?.is_some() && self.state.phase == Phase::Idle {
            self.state.enter(Phase::Ready);
        }
        Ok(())
    }

    /// Initial activation: restore persisted state, then fetch
    pub async fn activate(&mut self) -> Result<(), VaultError> {
        self.state.set_status("LOADING...");
        self.restore()?;
        self.load().await
    }

    /// Fetch the vault from the current source and cache it
    pub async fn load(&mut self) -> Result<(), VaultError> {
        let source = match self.locator.resolve() {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e)),
        };

        self.state.enter(Phase::Loading);
        match source.kind() {
            SourceKind::PageLink => self
                .state
                .set_status(format!("loading '{}' from page", source.location())),
            SourceKind::Url => self
                .state
                .set_status(format!("loading '{}'", source.location())),
        }

        let raw = match self.fetcher.fetch(&source).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(e.into())),
        };

        if let Err(e) = self.cache.put_raw(&raw) {
            return Err(self.fail(e.into()));
        }

        self.state.enter(Phase::Ready);
        self.state.set_status(match source.kind() {
            SourceKind::PageLink => "saved real file",
            SourceKind::Url => "loaded file",
        });
        Ok(())
    }

    /// Decrypt the cached vault with `password` and show the selected entry
    pub async fn submit_password(&mut self, password: &SecretString) -> Result<(), VaultError> {
        let raw = match self.cache.raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err(self.fail(VaultError::NoVaultData)),
            Err(e) => return Err(self.fail(e.into())),
        };

        self.state.enter(Phase::Decrypting);
        tracing::info!(bytes = raw.len(), "decrypting vault");

        let document = match self.client.decrypt(password, &raw).await {
            Ok(document) => document,
            Err(e) => return Err(self.fail(e)),
        };

        let catalog = match Catalog::parse_with_default_type(
            document.expose_secret(),
            &self.default_type,
        ) {
            Ok(catalog) => catalog,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.cache.put_document(document);

        // With an empty picker, the first entry of the new document is shown
        let name = self
            .state
            .name_to_show()
            .or_else(|| catalog.entries().first().map(|e| e.name.clone()))
            .unwrap_or_default();
        self.state.choices = catalog.list();
        if let Err(e) = self.cache.put_names(&catalog.render_options()) {
            return Err(self.fail(e.into()));
        }

        self.show(&catalog, &name)
    }

    /// Choose an entry; renders it when a decrypted document is cached
    pub fn select(&mut self, name: &str) -> Result<(), VaultError> {
        self.state.selected = Some(name.to_string());

        let default_type = self.default_type.clone();
        let parsed = self
            .cache
            .with_document(|doc| Catalog::parse_with_default_type(doc, &default_type));

        match parsed {
            Some(Ok(catalog)) => self.show(&catalog, name),
            Some(Err(e)) => Err(self.fail(e.into())),
            None => Ok(()),
        }
    }

    fn show(&mut self, catalog: &Catalog, name: &str) -> Result<(), VaultError> {
        let Some(entry) = catalog.find(name) else {
            // Not fatal: the previous form stays as it was
            let err = VaultError::NotFound {
                name: name.to_string(),
            };
            self.state.set_status(err.to_string());
            let phase = match &self.state.displayed {
                Some(shown) => Phase::Displaying {
                    name: shown.name.clone(),
                },
                None => Phase::Ready,
            };
            self.state.enter(phase);
            return Err(err);
        };

        self.state.selected = Some(entry.name.clone());
        self.state.displayed = Some(DisplayedEntry::from_entry(entry));
        self.state.enter(Phase::Displaying {
            name: entry.name.clone(),
        });
        self.state.set_status(format!("showing '{}'", entry.name));
        Ok(())
    }
}
