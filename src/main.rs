//! Revelation Fill - fetch, decrypt and browse a Revelation vault
//!
//! Usage:
//!   revelation-fill source show              Show the selected vault source
//!   revelation-fill source set --url <URL>   Fetch the vault from a URL
//!   revelation-fill source set --page <NAME> Fetch the link named NAME on the host page
//!   revelation-fill load [--page-url <URL>]  Fetch and cache the vault
//!   revelation-fill list                     List entries from the last decrypt
//!   revelation-fill show <NAME>              Decrypt (password on stdin) and show an entry
//!   revelation-fill import-legacy <FILE>     Import a legacy string-encoded vault export
//!   revelation-fill export-legacy <FILE>     Write the cached vault as a legacy string export

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use revelation_fill::cache::DocumentCache;
use revelation_fill::channel::channel;
use revelation_fill::client::DecryptionClient;
use revelation_fill::codec;
use revelation_fill::config::{Config, EngineKind};
use revelation_fill::engine::{self, RevelationEngine};
use revelation_fill::fetch::{Fetcher, HttpTransport, RawVault};
use revelation_fill::orchestrator::Orchestrator;
use revelation_fill::scanner::{Page, PageScanner};
use revelation_fill::source::{SourceConfig, SourceKind, SourceLocator};
use revelation_fill::store::Store;

#[derive(Parser, Debug)]
#[command(name = "revelation-fill")]
#[command(author, version, about = "Fetch, decrypt and browse Revelation vaults", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Vault source selection
    Source {
        #[command(subcommand)]
        action: SourceCommand,
    },

    /// Fetch the vault from the selected source and cache it
    Load {
        /// Host page listing the vault link (page-link sources only)
        #[arg(long, env = "REVELATION_PAGE_URL")]
        page_url: Option<String>,
    },

    /// List entries from the last successful decrypt
    List,

    /// Decrypt the cached vault and show one entry (password read from stdin)
    Show {
        /// Entry name
        name: String,

        /// Fetch the vault before decrypting
        #[arg(long)]
        load: bool,

        /// Host page listing the vault link (page-link sources only)
        #[arg(long, env = "REVELATION_PAGE_URL")]
        page_url: Option<String>,

        /// Print the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// Import a vault exported as a legacy 16-bit code unit string
    ImportLegacy {
        /// File holding the exported string
        file: PathBuf,
    },

    /// Export the cached vault as a legacy 16-bit code unit string
    ExportLegacy {
        /// File to write the exported string to
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Show the selected source
    Show,

    /// Select a new source
    Set {
        /// Fetch the vault directly from this URL
        #[arg(long, conflicts_with = "page", required_unless_present = "page")]
        url: Option<String>,

        /// Fetch the link with this text from the host page
        #[arg(long)]
        page: Option<String>,
    },
}

#[derive(Serialize)]
struct EntryOutput<'a> {
    name: &'a str,
    description: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Serialize)]
struct SourceOutput<'a> {
    kind: SourceKind,
    location: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("revelation_fill={log_level},warn")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = Config::load(args.config.as_ref())?;
    tracing::debug!(config = ?config, "loaded configuration");

    let store = Arc::new(Store::open(&config.store.path)?);

    match args.command {
        Command::Source { action } => handle_source_command(&action, store, args.json),
        Command::Load { page_url } => {
            let mut orch = build(&config, store, page_url.as_deref()).await?;
            orch.restore()?;
            let result = orch.load().await;
            eprintln!("{}", orch.status());
            result?;
            if let Some(at) = orch.cache().raw_updated_at()? {
                eprintln!("vault cached at {}", at.to_rfc3339());
            }
            Ok(())
        }
        Command::List => {
            let mut orch = build(&config, store, None).await?;
            orch.restore()?;
            if let Some(at) = orch.cache().raw_updated_at()? {
                eprintln!("vault cached at {}", at.to_rfc3339());
            }
            let choices = orch.state().choices();
            if args.json {
                let names: Vec<_> = choices.iter().map(|c| c.name()).collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if choices.is_empty() {
                eprintln!("no entries; decrypt the vault with 'show' first");
            } else {
                for choice in choices {
                    println!("{}", choice.plain_label());
                }
            }
            Ok(())
        }
        Command::Show {
            name,
            load,
            page_url,
            reveal,
        } => {
            let mut orch = build(&config, store, page_url.as_deref()).await?;
            orch.restore()?;
            if load {
                if let Err(e) = orch.load().await {
                    eprintln!("{}", orch.status());
                    return Err(e.into());
                }
            }

            let password = read_password()?;
            orch.select(&name)?;
            let result = orch.submit_password(&password).await;
            eprintln!("{}", orch.status());
            result?;

            if let Some(entry) = orch.state().displayed() {
                let output = EntryOutput {
                    name: &entry.name,
                    description: &entry.description,
                    username: &entry.username,
                    password: reveal.then(|| entry.password.expose_secret()),
                };
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("name:        {}", output.name);
                    println!("description: {}", output.description);
                    println!("username:    {}", output.username);
                    println!("password:    {}", output.password.unwrap_or("********"));
                }
            }
            Ok(())
        }
        Command::ImportLegacy { file } => {
            let text = std::fs::read_to_string(&file)?;
            let raw = RawVault::new(codec::units_to_bytes(&text));
            if raw.is_empty() {
                anyhow::bail!("{} holds no vault data", file.display());
            }
            DocumentCache::new(store).put_raw(&raw)?;
            eprintln!("imported {} bytes from {}", raw.len(), file.display());
            Ok(())
        }
        Command::ExportLegacy { file } => {
            let Some(raw) = DocumentCache::new(store).raw()? else {
                anyhow::bail!("no vault has been loaded");
            };
            let text = codec::bytes_to_units(raw.as_bytes())?;
            std::fs::write(&file, text)?;
            eprintln!("exported {} bytes to {}", raw.len(), file.display());
            Ok(())
        }
    }
}

/// Wire the pipeline together from configuration
async fn build(
    config: &Config,
    store: Arc<Store>,
    page_url: Option<&str>,
) -> anyhow::Result<Orchestrator> {
    let transport = Arc::new(HttpTransport::new());

    let mut fetcher = Fetcher::new(transport.clone(), config.fetch_timeout())
        .with_legacy_hang(config.compat.legacy_hang);

    if let Some(url) = page_url {
        let page = Page::fetch(transport.as_ref(), url, config.fetch_timeout()).await?;
        let (client, server) = channel(8, config.channel_timeout());
        PageScanner::new(page, transport.clone(), config.fetch_timeout())
            .with_silent_drop(config.compat.legacy_hang)
            .spawn(server);
        fetcher = fetcher.with_scanner(client);
    }

    let (conn, _engine) = match config.engine.kind {
        EngineKind::Revelation => engine::spawn(Arc::new(RevelationEngine)),
    };

    Ok(Orchestrator::new(
        SourceLocator::new(Arc::clone(&store)),
        fetcher,
        DecryptionClient::new(conn, config.engine_timeout()),
        DocumentCache::new(store),
    )
    .with_default_type(config.catalog.default_type.clone()))
}

fn handle_source_command(
    action: &SourceCommand,
    store: Arc<Store>,
    json: bool,
) -> anyhow::Result<()> {
    let locator = SourceLocator::new(store);

    match action {
        SourceCommand::Show => {
            let source = locator.resolve()?;
            if json {
                let output = SourceOutput {
                    kind: source.kind(),
                    location: source.location(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{source}");
            }
        }
        SourceCommand::Set { url, page } => {
            let source = match (url, page) {
                (Some(url), _) => SourceConfig::url(url)?,
                (None, Some(page)) => SourceConfig::page_link(page)?,
                (None, None) => anyhow::bail!("either --url or --page is required"),
            };
            locator.select(&source)?;
            println!("source set to {source}");
        }
    }

    Ok(())
}

/// First line of stdin, without the line ending
fn read_password() -> anyhow::Result<SecretString> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    Ok(SecretString::from(password))
}
