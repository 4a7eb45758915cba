//! HTTP transport backed by reqwest

use async_trait::async_trait;

use super::{FetchError, HttpReply, Transport};

/// Transport issuing real binary GET requests
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
        tracing::debug!(url, "GET");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(url, status, bytes = body.len(), "GET complete");

        Ok(HttpReply {
            status,
            body: body.to_vec(),
        })
    }
}
