//! Decryption client
//!
//! Holds the single persistent connection to the decryption engine. A
//! decrypt attempt sends the password, then the ciphertext tagged with a
//! fresh attempt id, then waits for the reply carrying that id. Replies to
//! earlier attempts that were abandoned after a timeout are discarded.
//! Replies starting with `"Error"` are returned as [`VaultError::Decrypt`]
//! and never handed on as a document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use crate::channel::ChannelError;
use crate::engine::EngineConnection;
use crate::fetch::RawVault;
use crate::protocol::{EngineMessage, EngineReply};
use crate::VaultError;

pub struct DecryptionClient {
    conn: Mutex<EngineConnection>,
    timeout: Option<Duration>,
    next_attempt: AtomicU64,
}

impl DecryptionClient {
    pub fn new(conn: EngineConnection, timeout: Option<Duration>) -> Self {
        Self {
            conn: Mutex::new(conn),
            timeout,
            next_attempt: AtomicU64::new(1),
        }
    }

    /// Decrypt `raw` with `password`, returning the plaintext document
    pub async fn decrypt(
        &self,
        password: &SecretString,
        raw: &RawVault,
    ) -> Result<SecretString, VaultError> {
        let mut conn = self.conn.lock().await;
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);

        conn.outbox
            .send(EngineMessage::Password(SecretString::from(
                password.expose_secret().to_owned(),
            )))
            .await
            .map_err(|_| engine_stopped())?;
        conn.outbox
            .send(EngineMessage::Ciphertext {
                attempt,
                data: raw.as_bytes().to_vec(),
            })
            .await
            .map_err(|_| engine_stopped())?;

        tracing::debug!(attempt, bytes = raw.len(), "ciphertext sent to engine");

        let wait = async {
            while let Some(output) = conn.inbox.recv().await {
                if output.attempt == attempt {
                    return Some(output.text);
                }
                tracing::debug!(
                    attempt,
                    stale = output.attempt,
                    "discarding reply to an abandoned attempt"
                );
            }
            None
        };

        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ChannelError::Timeout(limit))?,
            None => wait.await,
        }
        .ok_or_else(engine_stopped)?;

        match EngineReply::classify(reply) {
            EngineReply::Error(text) => {
                tracing::warn!(attempt, error = %text, "engine reported an error");
                Err(VaultError::Decrypt(text))
            }
            EngineReply::Plaintext(document) => {
                tracing::debug!(attempt, bytes = document.len(), "plaintext received");
                Ok(SecretString::from(document))
            }
        }
    }
}

fn engine_stopped() -> VaultError {
    VaultError::Internal("decryption engine is not running".into())
}
