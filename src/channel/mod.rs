//! Cross-context request/response channel
//!
//! Connects two independent tasks that share no memory. The caller's request
//! is serialized to JSON, deserialized on the receiving side, and the reply
//! travels back the same way on a per-request return path, so concurrent
//! calls never see each other's responses. There is no ordering across calls
//! and no cancellation. A receiver that drops a request without answering
//! leaves the caller with [`ChannelError::NoResponse`]; a receiver that holds
//! it forever leaves the caller waiting unless a timeout was configured.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("receiving side has shut down")]
    Closed,

    #[error("request was dropped without a response")]
    NoResponse,

    #[error("no response after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("message encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Serialized request plus its private return path
struct Envelope {
    id: u64,
    payload: String,
    reply: oneshot::Sender<String>,
}

/// Create a connected client/server pair
pub fn channel<Req, Resp>(
    capacity: usize,
    timeout: Option<Duration>,
) -> (ChannelClient<Req, Resp>, ChannelServer<Req, Resp>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ChannelClient {
            tx,
            timeout,
            next_id: Arc::new(AtomicU64::new(1)),
            _marker: PhantomData,
        },
        ChannelServer {
            rx,
            _marker: PhantomData,
        },
    )
}

/// Sending side
pub struct ChannelClient<Req, Resp> {
    tx: mpsc::Sender<Envelope>,
    timeout: Option<Duration>,
    next_id: Arc<AtomicU64>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Clone for ChannelClient<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            timeout: self.timeout,
            next_id: Arc::clone(&self.next_id),
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> ChannelClient<Req, Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    /// Send a request and wait for its response
    pub async fn send(&self, request: &Req) -> Result<Resp, ChannelError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_string(request)?;
        let (reply, response) = oneshot::channel();

        tracing::debug!(id, bytes = payload.len(), "channel request sent");

        self.tx
            .send(Envelope { id, payload, reply })
            .await
            .map_err(|_| ChannelError::Closed)?;

        let wait = async { response.await.map_err(|_| ChannelError::NoResponse) };

        let raw = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ChannelError::Timeout(limit))??,
            None => wait.await?,
        };

        tracing::debug!(id, bytes = raw.len(), "channel response received");
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Receiving side
pub struct ChannelServer<Req, Resp> {
    rx: mpsc::Receiver<Envelope>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> ChannelServer<Req, Resp>
where
    Req: DeserializeOwned,
    Resp: Serialize,
{
    /// Next decoded request, or `None` once every client is gone.
    ///
    /// Undecodable requests are dropped, which the caller observes as
    /// [`ChannelError::NoResponse`].
    pub async fn recv(&mut self) -> Option<Incoming<Req, Resp>> {
        loop {
            let envelope = self.rx.recv().await?;
            match serde_json::from_str(&envelope.payload) {
                Ok(request) => {
                    return Some(Incoming {
                        id: envelope.id,
                        request,
                        responder: Responder {
                            id: envelope.id,
                            reply: envelope.reply,
                            _marker: PhantomData,
                        },
                    })
                }
                Err(e) => {
                    tracing::warn!(id = envelope.id, error = %e, "dropping undecodable request");
                }
            }
        }
    }
}

/// A delivered request and the means to answer it
pub struct Incoming<Req, Resp> {
    pub id: u64,
    pub request: Req,
    pub responder: Responder<Resp>,
}

/// Answers one request. Consumed on use, so at most one response is sent.
pub struct Responder<Resp> {
    id: u64,
    reply: oneshot::Sender<String>,
    _marker: PhantomData<fn(Resp)>,
}

impl<Resp: Serialize> Responder<Resp> {
    pub fn respond(self, response: &Resp) -> Result<(), ChannelError> {
        let payload = serde_json::to_string(response)?;
        if self.reply.send(payload).is_err() {
            // Caller timed out or went away
            tracing::debug!(id = self.id, "response arrived after caller left");
        }
        Ok(())
    }

    /// Drop the request without answering
    pub fn ignore(self) {
        tracing::debug!(id = self.id, "request dropped without response");
    }
}
