//! The digest engine.
//!
//! A read partitions the requested groups into cached and fresh. Cached
//! groups replay their latest snapshot with no network traffic; fresh
//! groups are fetched and parsed in parallel, deduplicated against the
//! seen store, merged with the cached items, sorted, and persisted.
//!
//! Per-feed failures never abort a read: they are collected and handed to
//! the formatter alongside the digest.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::app::{AppContext, Result};
use crate::domain::{Group, ParsedItem, RssItem};
use crate::history::{self, Snapshot};
use crate::identity;
use crate::pipeline::{self, FeedJob, FeedOutcome};
use crate::storage::FetchedHeaders;

/// Group tag applied to ad-hoc command-line feeds.
const AD_HOC_GROUP: &str = "main";

/// A parsed read request, as assembled by the CLI layer.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// Requested groups; their order drives the sort when more than one
    /// group was named explicitly.
    pub groups: Vec<String>,
    /// Ad-hoc feed URLs. When non-empty, groups are ignored, dedup is
    /// disabled, and nothing is persisted.
    pub ad_hoc_urls: Vec<String>,
    /// Bypass the interval gate: treat every group as fresh.
    pub reset: bool,
}

#[derive(Debug, Clone)]
pub struct FailedFeed {
    pub url: String,
    pub feed_name: Option<String>,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Digest {
    pub items: Vec<RssItem>,
    pub failed_feeds: Vec<FailedFeed>,
}

/// Display metadata carried alongside each fetch job, index-aligned.
struct PlannedFeed {
    url: String,
    feed_name: String,
    group_name: String,
    group_display_name: Option<String>,
}

pub async fn read(ctx: &AppContext, request: &ReadRequest) -> Result<Digest> {
    if !request.ad_hoc_urls.is_empty() {
        return read_ad_hoc(ctx, &request.ad_hoc_urls).await;
    }

    let today = history::logical_date(ctx.config.day_start_hour);
    let group_names = dedup_names(&request.groups);

    let mut cached: Vec<(Group, Snapshot)> = Vec::new();
    let mut fresh: Vec<Group> = Vec::new();
    for name in &group_names {
        let group = ctx.groups.load(name)?;
        match cached_snapshot(ctx, &group, today, request.reset) {
            Some(snapshot) => cached.push((group, snapshot)),
            None => fresh.push(group),
        }
    }
    debug!(
        fresh = fresh.len(),
        cached = cached.len(),
        %today,
        "partitioned groups"
    );

    let mut planned = Vec::new();
    let mut jobs = Vec::new();
    for group in &fresh {
        for feed in group.enabled_feeds() {
            planned.push(PlannedFeed {
                url: feed.xml_url.clone(),
                feed_name: feed.display_name().to_string(),
                group_name: group.name.clone(),
                group_display_name: group.display_name.clone(),
            });
            jobs.push(FeedJob {
                url: feed.xml_url.clone(),
                etag: feed.etag.clone(),
                last_modified: feed.last_modified.clone(),
            });
        }
    }

    let seen = Arc::new(ctx.seen.load());
    let outcomes = pipeline::fetch_and_parse(ctx.fetcher.clone(), jobs, Some(seen.clone())).await;

    let mut digest = Digest::default();
    let mut new_hashes: Vec<u64> = Vec::new();
    let mut fetched_headers: HashMap<String, Vec<FetchedHeaders>> = HashMap::new();

    for (plan, outcome) in planned.iter().zip(outcomes) {
        match outcome {
            FeedOutcome::Fresh {
                feed,
                etag,
                last_modified,
                truncated,
            } => {
                if truncated {
                    debug!(url = %plan.url, "feed body was capped");
                }
                fetched_headers
                    .entry(plan.group_name.clone())
                    .or_default()
                    .push(FetchedHeaders {
                        url: plan.url.clone(),
                        etag,
                        last_modified,
                    });
                collect_items(
                    &feed.items,
                    plan,
                    ctx.config.max_items_per_feed,
                    Some(seen.as_ref()),
                    &mut new_hashes,
                    &mut digest.items,
                );
            }
            FeedOutcome::NotModified {
                etag,
                last_modified,
            } => {
                fetched_headers
                    .entry(plan.group_name.clone())
                    .or_default()
                    .push(FetchedHeaders {
                        url: plan.url.clone(),
                        etag,
                        last_modified,
                    });
            }
            FeedOutcome::Failed(err) => {
                digest.failed_feeds.push(FailedFeed {
                    url: plan.url.clone(),
                    feed_name: Some(plan.feed_name.clone()),
                    error: err.to_string(),
                });
            }
        }
    }

    for (group, snapshot) in &cached {
        for item in &snapshot.items {
            let mut item = item.clone();
            item.group_name = Some(group.name.clone());
            item.group_display_name = group.display_name.clone();
            digest.items.push(item);
        }
    }

    sort_items(&mut digest.items, &request.groups);

    persist(ctx, &fresh, &group_names, today, &fetched_headers, new_hashes, &digest);

    info!(
        items = digest.items.len(),
        failed = digest.failed_feeds.len(),
        "read complete"
    );
    Ok(digest)
}

/// Re-renders a past run without any network traffic. Offset 0 is the most
/// recent run, -1 the one before it.
pub fn read_offset(ctx: &AppContext, groups: &[String], offset: i64) -> Result<Digest> {
    let mut digest = Digest::default();
    for name in &dedup_names(groups) {
        let group = ctx.groups.load(name)?;
        let snapshot = ctx.history.load_run_by_offset(name, offset);
        for item in &snapshot.items {
            let mut item = item.clone();
            item.group_name = Some(group.name.clone());
            item.group_display_name = group.display_name.clone();
            digest.items.push(item);
        }
    }
    sort_items(&mut digest.items, groups);
    Ok(digest)
}

async fn read_ad_hoc(ctx: &AppContext, urls: &[String]) -> Result<Digest> {
    let jobs: Vec<FeedJob> = urls
        .iter()
        .map(|url| FeedJob {
            url: url.clone(),
            etag: None,
            last_modified: None,
        })
        .collect();
    let outcomes = pipeline::fetch_and_parse(ctx.fetcher.clone(), jobs, None).await;

    let mut digest = Digest::default();
    for (url, outcome) in urls.iter().zip(outcomes) {
        match outcome {
            FeedOutcome::Fresh { feed, .. } => {
                let plan = PlannedFeed {
                    url: url.clone(),
                    feed_name: feed.title.clone().unwrap_or_else(|| url.clone()),
                    group_name: AD_HOC_GROUP.to_string(),
                    group_display_name: None,
                };
                let mut unused = Vec::new();
                collect_items(
                    &feed.items,
                    &plan,
                    ctx.config.max_items_per_feed,
                    None,
                    &mut unused,
                    &mut digest.items,
                );
            }
            FeedOutcome::NotModified { .. } => {}
            FeedOutcome::Failed(err) => {
                digest.failed_feeds.push(FailedFeed {
                    url: url.clone(),
                    feed_name: None,
                    error: err.to_string(),
                });
            }
        }
    }
    sort_items(&mut digest.items, &[]);
    Ok(digest)
}

/// A group is served from cache when its latest run is newer than the
/// interval and the snapshot actually loads; anything else goes fresh.
fn cached_snapshot(
    ctx: &AppContext,
    group: &Group,
    today: NaiveDate,
    reset: bool,
) -> Option<Snapshot> {
    if reset || ctx.config.fetch_interval_days == 0 {
        return None;
    }
    let (date, path) = ctx.history.latest_run(&group.name)?;
    let age = today.signed_duration_since(date).num_days();
    if age >= i64::from(ctx.config.fetch_interval_days) {
        return None;
    }
    match ctx.history.load_snapshot(&path) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(group = %group.name, error = %err, "snapshot unreadable, fetching fresh");
            None
        }
    }
}

fn collect_items(
    parsed: &[ParsedItem],
    plan: &PlannedFeed,
    max_items: usize,
    seen: Option<&HashSet<u64>>,
    new_hashes: &mut Vec<u64>,
    out: &mut Vec<RssItem>,
) {
    let cap = if max_items == 0 { usize::MAX } else { max_items };
    for item in parsed.iter().take(cap) {
        if let Some(key) = item.identity() {
            let hash = identity::item_hash(key);
            if let Some(seen) = seen {
                if seen.contains(&hash) {
                    continue;
                }
                new_hashes.push(hash);
            }
        }
        out.push(RssItem {
            title: item.title.clone(),
            description: item.description.clone(),
            link: item.link.clone(),
            pub_date: item.pub_date.clone(),
            timestamp: item.timestamp,
            guid: item.guid.clone(),
            feed_name: Some(plan.feed_name.clone()),
            group_name: Some(plan.group_name.clone()),
            group_display_name: plan.group_display_name.clone(),
        });
    }
}

/// Group order first (command-line order when an explicit multi-group list
/// was given, alphabetical otherwise), then feed name, then newest first.
fn sort_items(items: &mut [RssItem], requested: &[String]) {
    let explicit: Option<HashMap<&str, usize>> = if requested.len() > 1 {
        Some(
            requested
                .iter()
                .enumerate()
                .map(|(rank, name)| (name.as_str(), rank))
                .collect(),
        )
    } else {
        None
    };
    items.sort_by(|a, b| {
        let group_a = a.group_name.as_deref().unwrap_or("");
        let group_b = b.group_name.as_deref().unwrap_or("");
        let by_group = match &explicit {
            Some(order) => {
                let rank_a = order.get(group_a).copied().unwrap_or(usize::MAX);
                let rank_b = order.get(group_b).copied().unwrap_or(usize::MAX);
                rank_a.cmp(&rank_b).then_with(|| group_a.cmp(group_b))
            }
            None => group_a.cmp(group_b),
        };
        by_group
            .then_with(|| {
                a.feed_name
                    .as_deref()
                    .unwrap_or("")
                    .cmp(b.feed_name.as_deref().unwrap_or(""))
            })
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
}

/// Step 7: save cache headers for fetched feeds (reloading each group from
/// disk so untouched feeds survive), write daily snapshots, append the new
/// hashes, and prune both history and the seen store. Everything here is
/// warn-and-continue; the digest is already complete.
fn persist(
    ctx: &AppContext,
    fresh: &[Group],
    group_names: &[String],
    today: NaiveDate,
    fetched_headers: &HashMap<String, Vec<FetchedHeaders>>,
    mut new_hashes: Vec<u64>,
    digest: &Digest,
) {
    for group in fresh {
        if let Some(headers) = fetched_headers.get(&group.name) {
            if let Err(err) = ctx.groups.merge_fetched(&group.name, headers) {
                warn!(group = %group.name, error = %err, "failed to save cache headers");
            }
        }

        let items: Vec<RssItem> = digest
            .items
            .iter()
            .filter(|item| item.group_name.as_deref() == Some(group.name.as_str()))
            .cloned()
            .collect();
        let path = ctx.history.snapshot_path(&group.name, today);
        // An empty snapshot is still written on the first read of the day
        // so same-day re-invocations replay instead of refetching.
        if !items.is_empty() || !path.exists() {
            let snapshot = Snapshot {
                timestamp: Utc::now().timestamp(),
                items,
            };
            if let Err(err) = ctx.history.save_snapshot(&group.name, today, &snapshot) {
                warn!(group = %group.name, error = %err, "failed to save snapshot");
            }
        }
    }

    let mut unique = HashSet::new();
    new_hashes.retain(|hash| unique.insert(*hash));
    if let Err(err) = ctx.seen.append(&new_hashes) {
        warn!(error = %err, "failed to append seen hashes");
    }

    for name in group_names {
        if let Err(err) = ctx.history.prune_group(name, today, ctx.config.retention_days) {
            warn!(group = %name, error = %err, "failed to prune history");
        }
    }
    if let Err(err) = ctx.seen.prune(ctx.config.retention_days) {
        warn!(error = %err, "failed to prune seen store");
    }
}

fn dedup_names(names: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for name in names {
        if seen.insert(name.as_str()) {
            out.push(name.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(group: &str, feed: &str, ts: i64) -> RssItem {
        RssItem {
            title: Some(format!("{group}/{feed}/{ts}")),
            timestamp: ts,
            feed_name: Some(feed.to_string()),
            group_name: Some(group.to_string()),
            ..Default::default()
        }
    }

    fn keys(items: &[RssItem]) -> Vec<String> {
        items
            .iter()
            .map(|i| i.title.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_sort_alphabetical_groups_when_single_request() {
        let mut items = vec![
            item("news", "n1", 5),
            item("art", "a1", 1),
            item("art", "a1", 9),
        ];
        sort_items(&mut items, &["news".into()]);
        assert_eq!(keys(&items), ["art/a1/9", "art/a1/1", "news/n1/5"]);
    }

    #[test]
    fn test_sort_follows_command_line_order() {
        let mut items = vec![
            item("art", "a1", 1),
            item("news", "n1", 5),
            item("news", "n2", 7),
        ];
        sort_items(&mut items, &["news".into(), "art".into()]);
        assert_eq!(keys(&items), ["news/n1/5", "news/n2/7", "art/a1/1"]);
    }

    #[test]
    fn test_sort_newest_first_within_feed() {
        let mut items = vec![
            item("g", "f", 1),
            item("g", "f", 3),
            item("g", "f", 2),
        ];
        sort_items(&mut items, &[]);
        assert_eq!(keys(&items), ["g/f/3", "g/f/2", "g/f/1"]);
    }

    #[test]
    fn test_sort_stable_under_repeat() {
        let mut items = vec![
            item("b", "y", 2),
            item("a", "x", 9),
            item("b", "x", 2),
            item("a", "x", 1),
        ];
        sort_items(&mut items, &[]);
        let first = keys(&items);
        sort_items(&mut items, &[]);
        assert_eq!(keys(&items), first);
    }

    #[test]
    fn test_dedup_names_preserves_order() {
        let names = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_names(&names), ["b".to_string(), "a".to_string()]);
    }
}
