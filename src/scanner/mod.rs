//! Page scanner
//!
//! Runs in the host page's context, on the far side of the cross-context
//! channel. Given a file name it looks for a link whose text is exactly that
//! name and downloads the link target. Links are scanned from the end of the
//! page backwards, so when several links share a name the last one wins.

mod page;

pub use page::{Anchor, Page};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::channel::ChannelServer;
use crate::fetch::{get_ok, Transport};
use crate::protocol::{ScanRequest, ScanResponse};

/// Server side of the page scanner channel
pub type ScannerServer = ChannelServer<ScanRequest, ScanResponse>;

/// Answers file requests from the links of one page
pub struct PageScanner {
    page: Page,
    transport: Arc<dyn Transport>,
    timeout: Option<Duration>,
    silent_drop: bool,
}

impl PageScanner {
    pub fn new(page: Page, transport: Arc<dyn Transport>, timeout: Option<Duration>) -> Self {
        Self {
            page,
            transport,
            timeout,
            silent_drop: false,
        }
    }

    /// Send no response at all on failure instead of an explicit error
    pub fn with_silent_drop(mut self, silent_drop: bool) -> Self {
        self.silent_drop = silent_drop;
        self
    }

    /// Last link on the page whose text equals `filename`
    pub fn find(&self, filename: &str) -> Option<&Anchor> {
        self.page
            .anchors()
            .iter()
            .rev()
            .find(|anchor| anchor.text == filename)
    }

    /// Produce the response for one request, or `None` to stay silent
    pub async fn handle(&self, request: &ScanRequest) -> Option<ScanResponse> {
        let outcome = match self.find(&request.filename) {
            Some(anchor) => {
                tracing::debug!(filename = %request.filename, href = %anchor.href, "link matched");
                get_ok(self.transport.as_ref(), anchor.href.as_str(), self.timeout)
                    .await
                    .map_err(|e| e.to_string())
            }
            None => Err(format!("no link named '{}' on {}", request.filename, self.page.url())),
        };

        match outcome {
            Ok(vault_data) => Some(ScanResponse::vault(vault_data)),
            Err(reason) if self.silent_drop => {
                tracing::warn!(filename = %request.filename, reason = %reason, "scan failed, not responding");
                None
            }
            Err(reason) => {
                tracing::warn!(filename = %request.filename, reason = %reason, "scan failed");
                Some(ScanResponse::failed(reason))
            }
        }
    }

    /// Serve requests until every client is gone
    pub async fn serve(self: Arc<Self>, mut server: ScannerServer) {
        while let Some(incoming) = server.recv().await {
            let scanner = Arc::clone(&self);
            tokio::spawn(async move {
                match scanner.handle(&incoming.request).await {
                    Some(response) => {
                        if let Err(e) = incoming.responder.respond(&response) {
                            tracing::error!(id = incoming.id, error = %e, "failed to send scan response");
                        }
                    }
                    None => incoming.responder.ignore(),
                }
            });
        }
        tracing::debug!("page scanner stopped");
    }

    /// Run the scanner as its own task
    pub fn spawn(self, server: ScannerServer) -> JoinHandle<()> {
        tokio::spawn(Arc::new(self).serve(server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel, ChannelError};
    use crate::fetch::mock::MockTransport;

    const LISTING: &str = r#"
        <html><body>
        <div id="browse-files">
          <a href="/files/old/pwd">pwd</a>
          <a href="notes.txt">notes</a>
          <a href="https://cdn.example.org/latest/pwd">pwd</a>
        </div>
        </body></html>
    "#;

    fn page() -> Page {
        Page::from_html("https://example.com/home/", LISTING).unwrap()
    }

    #[test]
    fn test_last_duplicate_wins() {
        let scanner = PageScanner::new(page(), Arc::new(MockTransport::new()), None);
        let anchor = scanner.find("pwd").unwrap();
        assert_eq!(anchor.href.as_str(), "https://cdn.example.org/latest/pwd");
        assert_eq!(
            scanner.find("notes").unwrap().href.as_str(),
            "https://example.com/home/notes.txt"
        );
        assert!(scanner.find("pw").is_none());
    }

    #[tokio::test]
    async fn test_handle_fetches_matched_link() {
        let transport = Arc::new(
            MockTransport::new().with_reply("https://cdn.example.org/latest/pwd", 200, b"vault"),
        );
        let scanner = PageScanner::new(page(), transport.clone(), None);

        let response = scanner.handle(&ScanRequest::new("pwd")).await;
        assert_eq!(response, Some(ScanResponse::vault(b"vault".to_vec())));
        assert_eq!(transport.requests(), vec!["https://cdn.example.org/latest/pwd"]);
    }

    #[tokio::test]
    async fn test_http_failure_is_explicit_by_default() {
        let transport = Arc::new(MockTransport::new());
        let scanner = PageScanner::new(page(), transport, None);

        let response = scanner.handle(&ScanRequest::new("pwd")).await;
        assert!(matches!(response, Some(ScanResponse::Failed { .. })));

        let response = scanner.handle(&ScanRequest::new("missing")).await;
        assert!(matches!(response, Some(ScanResponse::Failed { .. })));
    }

    #[tokio::test]
    async fn test_silent_drop_reaches_caller_as_no_response() {
        let scanner = PageScanner::new(page(), Arc::new(MockTransport::new()), None)
            .with_silent_drop(true);
        let (client, server) = channel::<ScanRequest, ScanResponse>(4, None);
        let handle = scanner.spawn(server);

        assert!(matches!(
            client.send(&ScanRequest::new("pwd")).await,
            Err(ChannelError::NoResponse)
        ));

        drop(client);
        handle.await.unwrap();
    }
}
