//! Host page model: the links a page exposes
//!
//! Only anchors with an `href` are kept. Link text is the anchor's content
//! with inner tags removed and basic entities decoded, compared verbatim.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;

use crate::catalog::unescape;
use crate::fetch::{get_ok, FetchError, Transport};
use crate::VaultError;

/// One link on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub text: String,
    pub href: Url,
}

/// Links of a page, in document order
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    anchors: Vec<Anchor>,
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid regex"))
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

impl Page {
    /// Extract the links of an HTML document served from `url`
    pub fn from_html(url: &str, html: &str) -> Result<Self, VaultError> {
        let base = Url::parse(url)
            .map_err(|e| VaultError::InvalidSource(format!("'{url}' is not a URL: {e}")))?;

        let anchors = anchor_re()
            .captures_iter(html)
            .filter_map(|caps| {
                let attrs = caps.get(1)?.as_str();
                let href_caps = href_re().captures(attrs)?;
                let raw_href = href_caps
                    .get(1)
                    .or_else(|| href_caps.get(2))
                    .or_else(|| href_caps.get(3))?
                    .as_str();
                let href = match base.join(&unescape(raw_href)) {
                    Ok(href) => href,
                    Err(e) => {
                        tracing::debug!(href = raw_href, error = %e, "skipping unresolvable link");
                        return None;
                    }
                };
                let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let text = unescape(&tag_re().replace_all(inner, ""));
                Some(Anchor { text, href })
            })
            .collect::<Vec<_>>();

        tracing::debug!(url, links = anchors.len(), "page parsed");
        Ok(Self { url: base, anchors })
    }

    /// Download and parse the page at `url`
    pub async fn fetch(
        transport: &dyn Transport,
        url: &str,
        limit: Option<Duration>,
    ) -> Result<Self, VaultError> {
        let body = get_ok(transport, url, limit).await?;
        let html = String::from_utf8(body).map_err(|_| FetchError::Http {
            url: url.to_string(),
            reason: "page is not UTF-8".into(),
        })?;
        Self::from_html(url, &html)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }
}
