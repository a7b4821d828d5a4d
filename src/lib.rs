//! # hys
//!
//! A terminal feed aggregator built around a once-per-interval reading
//! rhythm: each named group of feeds is fetched at most once per configured
//! interval, articles are deduplicated against a persistent content-addressed
//! history, and the day's digest is cached on disk so re-invocations within
//! the interval replay from disk without network I/O.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Parser → Digest → History
//! ```
//!
//! - [`fetcher`]: HTTP client with conditional requests, size caps, and
//!   streaming UTF-8 validation
//! - [`parser`]: single-pass RSS/Atom event parser with early abort
//! - [`pipeline`]: fetch→parse fan-out, results in input order
//! - [`digest`]: per-group interval gate, dedup, sort, persistence
//! - [`history`]: daily snapshots and logical-date arithmetic
//! - [`seen`]: append-only binary log of seen article hashes
//!
//! ## Quick Start
//!
//! ```bash
//! # Read the default group
//! hys
//!
//! # Read specific groups in this order
//! hys tech news
//!
//! # One-off read of ad-hoc feeds (no state is written)
//! hys --url https://blog.rust-lang.org/feed.xml
//!
//! # Re-render yesterday's digest without fetching
//! hys --yesterday
//! ```

/// Application context and error handling.
pub mod app;

/// Command-line interface definitions.
pub mod cli;

/// Global configuration loaded from `~/.hys/config.json`.
pub mod config;

/// The digest engine: partition, fetch, dedup, sort, persist.
pub mod digest;

/// Core domain models (FeedConfig, Group, RssItem, ParsedFeed).
pub mod domain;

/// Terminal rendering of a finished digest.
pub mod format;

/// HTTP fetching with conditional request support.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for feed fetching
/// - [`HttpFetcher`](fetcher::http::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Daily snapshot files and logical-date arithmetic.
pub mod history;

/// Identity normalization and 64-bit article hashing.
pub mod identity;

/// RSS/Atom parsing: XML events, capture rules, HTML cleanup, dates.
pub mod parser;

/// Drives fetch→parse concurrency and collects results in input order.
pub mod pipeline;

/// Persistent binary log of seen article hashes.
pub mod seen;

/// Group definition files under `~/.hys/feeds/`.
pub mod storage;
