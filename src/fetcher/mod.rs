pub mod http;
pub mod sink;
pub mod utf8;

use async_trait::async_trait;

use crate::app::HysError;

/// Result of one transfer. NotModified is a status, not an error: the
/// server confirmed the cached copy is still current.
#[derive(Debug)]
pub enum FetchOutcome {
    Success {
        body: String,
        etag: Option<String>,
        last_modified: Option<String>,
        truncated: bool,
    },
    NotModified {
        etag: Option<String>,
        last_modified: Option<String>,
    },
    Failed(HysError),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> FetchOutcome;
}
