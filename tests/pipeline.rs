//! End-to-end: host page -> scanner -> fetcher -> engine -> catalog

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use revelation_fill::cache::DocumentCache;
use revelation_fill::channel::channel;
use revelation_fill::client::DecryptionClient;
use revelation_fill::engine::{self, revelation, RevelationEngine};
use revelation_fill::fetch::{FetchError, Fetcher, HttpReply, Transport};
use revelation_fill::orchestrator::{Orchestrator, Phase};
use revelation_fill::scanner::{Page, PageScanner};
use revelation_fill::source::{SourceConfig, SourceLocator};
use revelation_fill::store::Store;
use revelation_fill::VaultError;

const PAGE_URL: &str = "https://files.example.com/browse/";
const DOCUMENT: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<revelationdata version="0.4.14" dataversion="1">
  <entry type="folder">
    <name>Work</name>
    <entry type="website">
      <name>Bank</name>
      <description>checking</description>
      <field id="generic-username">alice</field>
      <field id="generic-password">hunter2</field>
    </entry>
    <entry type="email">
      <name>Mail</name>
      <field id="generic-username">alice@example.com</field>
      <field id="generic-password">p&amp;ss</field>
    </entry>
  </entry>
</revelationdata>"#;

/// Serves fixed bodies by URL
struct StaticSite(HashMap<String, Vec<u8>>);

#[async_trait]
impl Transport for StaticSite {
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
        Ok(match self.0.get(url) {
            Some(body) => HttpReply {
                status: 200,
                body: body.clone(),
            },
            None => HttpReply {
                status: 404,
                body: Vec::new(),
            },
        })
    }
}

fn site(vault: Vec<u8>) -> Arc<StaticSite> {
    let page = r#"<html><body><div id="browse-files">
        <a href="old/pwd">pwd</a>
        <a href="/files/pwd.rvl">pwd</a>
        <a href="notes.txt">notes</a>
    </div></body></html>"#;

    let mut bodies = HashMap::new();
    bodies.insert(PAGE_URL.to_string(), page.as_bytes().to_vec());
    bodies.insert("https://files.example.com/browse/old/pwd".to_string(), b"stale".to_vec());
    bodies.insert("https://files.example.com/files/pwd.rvl".to_string(), vault);
    Arc::new(StaticSite(bodies))
}

async fn orchestrator(store: Arc<Store>, site: Arc<StaticSite>) -> Orchestrator {
    build(store, site, false).await
}

/// With `legacy` set, scanner failures go unanswered, the channel has no
/// timeout, and failed fetches never resolve
async fn build(store: Arc<Store>, site: Arc<StaticSite>, legacy: bool) -> Orchestrator {
    let limit = Some(Duration::from_secs(5));
    let page = Page::fetch(site.as_ref(), PAGE_URL, limit).await.unwrap();
    let (client, server) = channel(8, if legacy { None } else { limit });
    PageScanner::new(page, site.clone(), limit)
        .with_silent_drop(legacy)
        .spawn(server);

    let (conn, _engine) = engine::spawn(Arc::new(RevelationEngine));

    Orchestrator::new(
        SourceLocator::new(Arc::clone(&store)),
        Fetcher::new(site, limit)
            .with_scanner(client)
            .with_legacy_hang(legacy),
        DecryptionClient::new(conn, limit),
        DocumentCache::new(store),
    )
}

fn sealed(password: &str) -> Vec<u8> {
    revelation::seal(
        &SecretString::from(password),
        DOCUMENT.as_bytes(),
        [7u8; 16],
    )
    .unwrap()
}

#[tokio::test]
async fn test_page_link_vault_decrypts_and_displays() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut orch = orchestrator(Arc::clone(&store), site(sealed("correct horse"))).await;

    orch.activate().await.unwrap();
    assert_eq!(orch.status(), "saved real file");

    orch.select("Mail").unwrap();
    orch.submit_password(&SecretString::from("correct horse"))
        .await
        .unwrap();

    let shown = orch.state().displayed().unwrap();
    assert_eq!(shown.name, "Mail");
    assert_eq!(shown.username, "alice@example.com");
    assert_eq!(shown.password.expose_secret(), "p&ss");
    assert_eq!(orch.status(), "showing 'Mail'");

    let labels: Vec<_> = orch
        .state()
        .choices()
        .iter()
        .map(|c| c.plain_label())
        .collect();
    assert_eq!(labels, vec!["Work (folder)", "Bank", "Mail (email)"]);

    // Switching entries reuses the decrypted document
    orch.select("Bank").unwrap();
    let shown = orch.state().displayed().unwrap();
    assert_eq!(shown.password.expose_secret(), "hunter2");
    assert_eq!(shown.description, "checking");
}

#[tokio::test]
async fn test_wrong_password_reports_engine_error() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut orch = orchestrator(store, site(sealed("correct horse"))).await;
    orch.load().await.unwrap();

    let err = orch
        .submit_password(&SecretString::from("battery staple"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Decrypt(_)));
    assert!(orch.status().starts_with("Error"));
    assert!(matches!(orch.state().phase(), Phase::Failed { .. }));
    assert!(orch.state().displayed().is_none());
}

#[tokio::test]
async fn test_missing_link_is_a_fetch_failure() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut orch = orchestrator(Arc::clone(&store), site(sealed("pw"))).await;
    orch.locator()
        .select(&SourceConfig::page_link("absent").unwrap())
        .unwrap();

    let err = orch.load().await.unwrap_err();
    assert!(matches!(err, VaultError::Fetch(_)));
    assert!(orch.status().starts_with("fetch failed"));
    assert!(orch.cache().raw().unwrap().is_none());
}

#[tokio::test]
async fn test_direct_url_source() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut orch = orchestrator(Arc::clone(&store), site(sealed("pw"))).await;
    orch.locator()
        .select(&SourceConfig::url("https://files.example.com/files/pwd.rvl").unwrap())
        .unwrap();

    orch.load().await.unwrap();
    assert_eq!(orch.status(), "loaded file");

    orch.submit_password(&SecretString::from("pw")).await.unwrap();
    // Empty picker: the first entry of the document is shown
    assert_eq!(orch.state().displayed().unwrap().name, "Work");
}

#[tokio::test]
async fn test_legacy_mode_missing_link_leaves_load_pending() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut orch = build(Arc::clone(&store), site(sealed("pw")), true).await;
    orch.locator()
        .select(&SourceConfig::page_link("absent").unwrap())
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(200), orch.load()).await;
    assert!(outcome.is_err(), "legacy load should never resolve");
    assert_eq!(orch.state().phase(), &Phase::Loading);
    assert_eq!(orch.status(), "loading 'absent' from page");
    assert!(orch.cache().raw().unwrap().is_none());
}

#[tokio::test]
async fn test_legacy_mode_still_loads_existing_link() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut orch = build(Arc::clone(&store), site(sealed("pw")), true).await;

    tokio::time::timeout(Duration::from_secs(5), orch.load())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orch.status(), "saved real file");
    assert_eq!(orch.state().phase(), &Phase::Ready);
}
