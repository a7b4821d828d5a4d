//! Renders a finished digest for the terminal.
//!
//! Items arrive already sorted (group, then feed, then newest first), so
//! rendering is a single pass that emits a header whenever the group or
//! feed changes. Links become OSC-8 hyperlinks around the title text.

use chrono::DateTime;

use crate::digest::Digest;

const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

const OSC8_PREFIX: &str = "\x1b]8;;";
const OSC8_ST: &str = "\x1b\\";

pub fn render(digest: &Digest, color: bool) -> String {
    let mut out = String::new();
    let paint = |code: &'static str| if color { code } else { "" };

    if digest.items.is_empty() {
        out.push_str("No new articles.\n");
    }

    let mut current_group: Option<&str> = None;
    let mut current_feed: Option<&str> = None;
    for item in &digest.items {
        let group = item
            .group_display_name
            .as_deref()
            .or(item.group_name.as_deref())
            .unwrap_or("");
        if current_group != Some(group) {
            if current_group.is_some() {
                out.push('\n');
            }
            out.push_str(&format!(
                "{}{}== {} =={}\n",
                paint(BOLD),
                paint(CYAN),
                group,
                paint(RESET)
            ));
            current_group = Some(group);
            current_feed = None;
        }

        let feed = item.feed_name.as_deref().unwrap_or("");
        if current_feed != Some(feed) {
            out.push_str(&format!(
                "{}{}{}{}\n",
                paint(BOLD),
                paint(YELLOW),
                feed,
                paint(RESET)
            ));
            current_feed = Some(feed);
        }

        let title = item.title.as_deref().unwrap_or("(untitled)");
        let title = match item.link.as_deref() {
            Some(link) => format!("{OSC8_PREFIX}{link}{OSC8_ST}{title}{OSC8_PREFIX}{OSC8_ST}"),
            None => title.to_string(),
        };
        let date = humanize_date(item.timestamp, item.pub_date.as_deref());
        if date.is_empty() {
            out.push_str(&format!("  - {title}\n"));
        } else {
            out.push_str(&format!(
                "  - {title} {}({date}){}\n",
                paint(DIM),
                paint(RESET)
            ));
        }
        if let Some(description) = item.description.as_deref() {
            if !description.is_empty() {
                out.push_str(&format!(
                    "    {}{}{}\n",
                    paint(DIM),
                    description,
                    paint(RESET)
                ));
            }
        }
    }

    if !digest.failed_feeds.is_empty() {
        out.push('\n');
        out.push_str(&format!(
            "{}{}Failed feeds:{}\n",
            paint(BOLD),
            paint(RED),
            paint(RESET)
        ));
        for failed in &digest.failed_feeds {
            let name = failed.feed_name.as_deref().unwrap_or(&failed.url);
            out.push_str(&format!("  {} ({}): {}\n", name, failed.url, failed.error));
        }
    }

    out
}

fn humanize_date(timestamp: i64, pub_date: Option<&str>) -> String {
    if timestamp > 0 {
        if let Some(dt) = DateTime::from_timestamp(timestamp, 0) {
            return dt.format("%Y-%m-%d").to_string();
        }
    }
    pub_date.unwrap_or("").to_string()
}
