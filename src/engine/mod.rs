//! Decryption engine
//!
//! The engine is an opaque capability reached only through messages: it
//! receives a password, then a ciphertext, and posts back one string, either
//! the plaintext document or an error report starting with `"Error"`. Each
//! reply carries the attempt id of the ciphertext it answers. The engine
//! runs as its own task and remembers the last password it was sent.

pub mod revelation;

pub use revelation::RevelationEngine;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::{EngineMessage, EngineOutput};

/// Errors reported by an engine. The display text is the reply sent back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("Error: Password not set.")]
    PasswordNotSet,

    #[error("Error: input file is too small.")]
    TooSmall,

    #[error("Error: cbc_decrypt failed.")]
    Cipher,

    #[error("Error: inflate failed.")]
    Inflate,

    #[error("Error: {0}")]
    Other(String),
}

/// Turns a password and ciphertext into plaintext
pub trait Decrypt: Send + Sync {
    fn decrypt(&self, password: &SecretString, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError>;
}

/// Caller's end of the engine connection
pub struct EngineConnection {
    pub(crate) outbox: mpsc::Sender<EngineMessage>,
    pub(crate) inbox: mpsc::Receiver<EngineOutput>,
}

impl EngineConnection {
    /// Wrap an existing pair of message streams
    pub fn new(outbox: mpsc::Sender<EngineMessage>, inbox: mpsc::Receiver<EngineOutput>) -> Self {
        Self { outbox, inbox }
    }
}

/// Start `engine` in its own task and connect to it
pub fn spawn(engine: Arc<dyn Decrypt>) -> (EngineConnection, JoinHandle<()>) {
    let (to_engine, engine_inbox) = mpsc::channel(8);
    let (engine_outbox, from_engine) = mpsc::channel(8);
    let handle = tokio::spawn(run(engine, engine_inbox, engine_outbox));
    (EngineConnection::new(to_engine, from_engine), handle)
}

async fn run(
    engine: Arc<dyn Decrypt>,
    mut inbox: mpsc::Receiver<EngineMessage>,
    outbox: mpsc::Sender<EngineOutput>,
) {
    let mut password: Option<Arc<SecretString>> = None;

    while let Some(message) = inbox.recv().await {
        let (attempt, ciphertext) = match message {
            EngineMessage::Password(p) => {
                password = Some(Arc::new(p));
                continue;
            }
            EngineMessage::Ciphertext { attempt, data } => (attempt, data),
        };

        let reply = match password.as_ref() {
            Some(p) if !p.expose_secret().is_empty() => {
                let engine = Arc::clone(&engine);
                let p = Arc::clone(p);
                let outcome =
                    tokio::task::spawn_blocking(move || engine.decrypt(&p, &ciphertext)).await;
                match outcome {
                    Ok(Ok(plaintext)) => String::from_utf8_lossy(&plaintext).into_owned(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => DecryptError::Other(format!("engine task failed: {e}")).to_string(),
                }
            }
            _ => DecryptError::PasswordNotSet.to_string(),
        };

        tracing::debug!(attempt, bytes = reply.len(), "engine reply posted");
        let output = EngineOutput {
            attempt,
            text: reply,
        };
        if outbox.send(output).await.is_err() {
            break;
        }
    }

    tracing::debug!("decryption engine stopped");
}
