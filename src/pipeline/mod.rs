//! Drives fetch→parse concurrency.
//!
//! Each feed gets its own task, bounded by a semaphore sized to the
//! transfer limit. As soon as a transfer completes its body is parsed on
//! the blocking pool, so parsing overlaps with the downloads still in
//! flight. Completion order is non-deterministic; `results[i]` always
//! corresponds to `feeds[i]`. Joining every task gives the caller a
//! happens-before edge over all worker writes.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

use crate::app::HysError;
use crate::domain::{ParsedFeed, ParsedItem};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::identity;
use crate::parser;

/// Upper bound on concurrent transfers.
pub const MAX_TRANSFERS: usize = 50;

/// One fetch target with its cached validators.
#[derive(Debug, Clone)]
pub struct FeedJob {
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Per-feed result, aligned with the input order.
#[derive(Debug)]
pub enum FeedOutcome {
    Fresh {
        feed: ParsedFeed,
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

/// Fetches and parses every job. The seen set, when provided, is consulted
/// as the parser's early-abort oracle; it is read-only for the whole run.
pub async fn fetch_and_parse(
    fetcher: Arc<dyn Fetcher>,
    jobs: Vec<FeedJob>,
    seen: Option<Arc<HashSet<u64>>>,
) -> Vec<FeedOutcome> {
    let total = jobs.len();
    let semaphore = Arc::new(Semaphore::new(MAX_TRANSFERS));
    let mut handles = Vec::with_capacity(total);

    for (index, job) in jobs.into_iter().enumerate() {
        let fetcher = fetcher.clone();
        let semaphore = semaphore.clone();
        let seen = seen.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("Semaphore closed");
            let outcome = fetcher
                .fetch(&job.url, job.etag.as_deref(), job.last_modified.as_deref())
                .await;
            let result = match outcome {
                FetchOutcome::Success {
                    body,
                    etag,
                    last_modified,
                    truncated,
                } => parse_body(body, seen, etag, last_modified, truncated).await,
                FetchOutcome::NotModified {
                    etag,
                    last_modified,
                } => FeedOutcome::NotModified {
                    etag,
                    last_modified,
                },
                FetchOutcome::Failed(err) => FeedOutcome::Failed(err),
            };
            (index, result)
        });
        handles.push(handle);
    }

    let mut results: Vec<FeedOutcome> = (0..total)
        .map(|_| FeedOutcome::Failed(HysError::Network("transfer did not complete".into())))
        .collect();
    for handle in handles {
        match handle.await {
            Ok((index, result)) => results[index] = result,
            Err(err) => {
                error!("task join error: {err}");
            }
        }
    }
    results
}

/// Parses a fetched body on the blocking pool so the transfer loop keeps
/// the reactor to itself.
async fn parse_body(
    body: String,
    seen: Option<Arc<HashSet<u64>>>,
    etag: Option<String>,
    last_modified: Option<String>,
    truncated: bool,
) -> FeedOutcome {
    let joined = tokio::task::spawn_blocking(move || match seen {
        Some(seen) => {
            let mut stop = |item: &ParsedItem| -> bool {
                item.identity()
                    .map(|key| seen.contains(&identity::item_hash(key)))
                    .unwrap_or(false)
            };
            parser::parse_feed(&body, Some(&mut stop))
        }
        None => parser::parse_feed(&body, None),
    })
    .await;

    match joined {
        Ok(Ok(feed)) => FeedOutcome::Fresh {
            feed,
            etag,
            last_modified,
            truncated,
        },
        Ok(Err(err)) => FeedOutcome::Failed(err),
        Err(err) => FeedOutcome::Failed(HysError::Network(format!("parse task failed: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedFetcher {
        bodies: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            url: &str,
            _etag: Option<&str>,
            _last_modified: Option<&str>,
        ) -> FetchOutcome {
            match self.bodies.lock().unwrap().get(url) {
                Some(body) => FetchOutcome::Success {
                    body: body.clone(),
                    etag: Some(format!("\"etag-{url}\"")),
                    last_modified: None,
                    truncated: false,
                },
                None => FetchOutcome::Failed(HysError::Http(404)),
            }
        }
    }

    fn rss(title: &str, guids: &[&str]) -> String {
        let mut body = format!("<rss><channel><title>{title}</title>");
        for guid in guids {
            body.push_str(&format!(
                "<item><title>{guid}</title><guid>{guid}</guid><link>https://example.com/{guid}</link></item>"
            ));
        }
        body.push_str("</channel></rss>");
        body
    }

    fn job(url: &str) -> FeedJob {
        FeedJob {
            url: url.into(),
            etag: None,
            last_modified: None,
        }
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let fetcher = Arc::new(ScriptedFetcher {
            bodies: Mutex::new(
                [
                    ("https://a.example/feed".to_string(), rss("A", &["a1"])),
                    ("https://b.example/feed".to_string(), rss("B", &["b1"])),
                ]
                .into(),
            ),
        });
        let jobs = vec![
            job("https://a.example/feed"),
            job("https://missing.example/feed"),
            job("https://b.example/feed"),
        ];
        let results = fetch_and_parse(fetcher, jobs, None).await;

        assert_eq!(results.len(), 3);
        match &results[0] {
            FeedOutcome::Fresh { feed, .. } => {
                assert_eq!(feed.title.as_deref(), Some("A"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            results[1],
            FeedOutcome::Failed(HysError::Http(404))
        ));
        match &results[2] {
            FeedOutcome::Fresh { feed, .. } => {
                assert_eq!(feed.title.as_deref(), Some("B"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_seen_set_aborts_parse() {
        let url = "https://a.example/feed";
        let fetcher = Arc::new(ScriptedFetcher {
            bodies: Mutex::new([(url.to_string(), rss("A", &["new", "old1", "old2"]))].into()),
        });
        let seen: HashSet<u64> = [
            identity::item_hash("old1"),
            identity::item_hash("old2"),
        ]
        .into_iter()
        .collect();

        let results = fetch_and_parse(fetcher, vec![job(url)], Some(Arc::new(seen))).await;
        match &results[0] {
            FeedOutcome::Fresh { feed, .. } => {
                let titles: Vec<_> = feed.items.iter().filter_map(|i| i.title.as_deref()).collect();
                assert_eq!(titles, ["new"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
