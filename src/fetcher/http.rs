//! reqwest-based fetcher with conditional requests and streamed bodies.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::sink::{BodySink, SinkPush};
use super::{FetchOutcome, Fetcher};
use crate::app::{HysError, Result};

pub const USER_AGENT: &str = concat!("hys-rss/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;
const MAX_CONNECTIONS_PER_HOST: usize = 6;
const MAX_URL_LEN: usize = 2048;

/// Content-Type prefixes accepted for feed bodies.
const ALLOWED_CONTENT_TYPES: [&str; 7] = [
    "application/rss",
    "application/atom",
    "application/xml",
    "application/json",
    "text/xml",
    "text/rss",
    "text/atom",
];

pub struct HttpFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(max_body_bytes: usize) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(MAX_CONNECTIONS_PER_HOST)
            .gzip(true)
            .brotli(true)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            max_body_bytes,
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchOutcome> {
        let parsed = validate_url(url)?;

        if parsed.scheme() == "file" {
            return self.fetch_file(parsed.path()).await;
        }

        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }
        if let Some(last_modified) = last_modified {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|err| HysError::Network(err.to_string()))?;

        let status = response.status();
        let etag_out = header_string(response.headers(), ETAG);
        let last_modified_out = header_string(response.headers(), LAST_MODIFIED);

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified {
                etag: etag_out,
                last_modified: last_modified_out,
            });
        }
        if status.as_u16() >= 400 {
            return Err(HysError::Http(status.as_u16()));
        }
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !content_type_allowed(content_type) {
                debug!(url, content_type, "rejecting disallowed content type");
                return Err(HysError::Http(status.as_u16()));
            }
        }

        let mut sink = BodySink::new(self.max_body_bytes);
        let mut stream = response.bytes_stream();
        let mut truncated_early = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| HysError::Network(err.to_string()))?;
            if sink.push(&chunk)? == SinkPush::Done {
                // Dropping the stream aborts the transfer.
                truncated_early = true;
                break;
            }
        }
        drop(stream);
        if truncated_early {
            debug!(url, cap = self.max_body_bytes, "transfer capped");
        }

        let (body, truncated) = sink.finish()?;
        if body.is_empty() {
            return Err(HysError::Network("empty response body".into()));
        }
        Ok(FetchOutcome::Success {
            body,
            etag: etag_out,
            last_modified: last_modified_out,
            truncated,
        })
    }

    /// Local files go through the same sink so the cap and UTF-8 rules hold.
    async fn fetch_file(&self, path: &str) -> Result<FetchOutcome> {
        let bytes = tokio::fs::read(path).await?;
        let mut sink = BodySink::new(self.max_body_bytes);
        for chunk in bytes.chunks(64 * 1024) {
            if sink.push(chunk)? == SinkPush::Done {
                break;
            }
        }
        let (body, truncated) = sink.finish()?;
        if body.is_empty() {
            return Err(HysError::Network("empty file".into()));
        }
        Ok(FetchOutcome::Success {
            body,
            etag: None,
            last_modified: None,
            truncated,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> FetchOutcome {
        match self.fetch_inner(url, etag, last_modified).await {
            Ok(outcome) => outcome,
            Err(err) => FetchOutcome::Failed(err),
        }
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

fn content_type_allowed(content_type: &str) -> bool {
    let lower = content_type.trim().to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn validate_url(url: &str) -> Result<Url> {
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(HysError::InvalidUrl(format!(
            "url length {} out of range",
            url.len()
        )));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(HysError::InvalidUrl("url contains whitespace".into()));
    }
    let parsed =
        Url::parse(url).map_err(|err| HysError::InvalidUrl(format!("{url}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        other => Err(HysError::InvalidUrl(format!("unsupported scheme {other}"))),
    }
}
