//! Single-pass RSS 2.0 / Atom 1.0 parser.
//!
//! The byte buffer is walked exactly once. A cheap probe rejects bodies that
//! cannot be feeds before any XML work happens. During the walk the parser
//! tracks element depth and captures the text of known tags; captured text
//! is flushed through the HTML cleaner when the matching close tag arrives.
//!
//! An optional per-item predicate is consulted as each item closes. When it
//! returns true the item is discarded and parsing stops; the dedup layer
//! uses this to abort on the first already-seen article, relying on the
//! convention that feeds are ordered newest-first.

pub mod clean;
pub mod date;
pub mod xml;

use tracing::trace;

use crate::app::{HysError, Result};
use crate::domain::{ParsedFeed, ParsedItem};

use xml::{XmlEvent, XmlReader};

/// Per-item predicate. Returning true discards the item and stops the parse.
pub type StopFn<'a> = dyn FnMut(&ParsedItem) -> bool + 'a;

const PROBE_WINDOW: usize = 1024;

/// Cheap gate ahead of the XML walk: after an optional BOM and leading
/// whitespace the first byte must be `<`, and one of the feed markers must
/// appear within the first KiB.
fn looks_like_feed(body: &str) -> bool {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);
    let body = body.trim_start();
    if !body.starts_with('<') {
        return false;
    }
    let head = &body.as_bytes()[..body.len().min(PROBE_WINDOW)];
    [
        b"<rss".as_slice(),
        b"<feed".as_slice(),
        b"<rdf".as_slice(),
        b"<?xml".as_slice(),
    ]
    .iter()
    .any(|marker| contains_ignore_case(head, marker))
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[derive(Clone, Copy, PartialEq)]
enum Slot {
    Title,
    Link,
    Description,
    Summary,
    Content,
    Date,
    Guid,
    Language,
    Generator,
    AuthorName,
    AuthorUri,
}

/// Priority of a description-class slot; higher wins the description field.
fn description_priority(slot: Slot) -> u8 {
    match slot {
        Slot::Description => 3,
        Slot::Summary => 2,
        Slot::Content => 1,
        _ => 0,
    }
}

struct Capture {
    slot: Slot,
    depth: usize,
    text: String,
}

struct Parser<'a, 'cb> {
    feed: ParsedFeed,
    item: Option<ParsedItem>,
    pending_enclosure: Option<String>,
    feed_desc_priority: u8,
    item_desc_priority: u8,
    capture: Option<Capture>,
    author_depth: Option<usize>,
    depth: usize,
    aborted: bool,
    stop: Option<&'cb mut StopFn<'a>>,
}

/// Parses a feed body. Partial feeds are permitted: a buffer truncated
/// mid-item yields every complete item. The error case is reserved for
/// bodies where nothing resembling a feed was recognized.
pub fn parse_feed(body: &str, stop: Option<&mut StopFn<'_>>) -> Result<ParsedFeed> {
    if !looks_like_feed(body) {
        return Err(HysError::Parse("content does not look like a feed".into()));
    }

    let mut parser = Parser {
        feed: ParsedFeed::default(),
        item: None,
        pending_enclosure: None,
        feed_desc_priority: 0,
        item_desc_priority: 0,
        capture: None,
        author_depth: None,
        depth: 0,
        aborted: false,
        stop,
    };
    parser.run(body);

    let empty = !parser.aborted
        && parser.feed.items.is_empty()
        && parser.feed.title.is_none()
        && parser.feed.link.is_none()
        && parser.feed.description.is_none();
    if empty {
        return Err(HysError::Parse("no feed content recognized".into()));
    }
    trace!(
        items = parser.feed.items.len(),
        aborted = parser.aborted,
        "parsed feed"
    );
    Ok(parser.feed)
}

impl<'a, 'cb> Parser<'a, 'cb> {
    fn run(&mut self, body: &str) {
        let mut reader = XmlReader::new(body);
        while let Some(event) = reader.next_event() {
            match event {
                XmlEvent::Start(tag) => {
                    if !tag.self_closing {
                        self.depth += 1;
                    }
                    self.on_start(&tag);
                }
                XmlEvent::Text(text) | XmlEvent::CData(text) => {
                    if let Some(capture) = &mut self.capture {
                        capture.text.push_str(text);
                    }
                }
                XmlEvent::End(name) => {
                    if self.on_end(name) {
                        return;
                    }
                }
            }
        }
    }

    fn on_start(&mut self, tag: &xml::Tag<'_>) {
        let name = tag.name.to_ascii_lowercase();
        match name.as_str() {
            "item" | "entry" => {
                self.item = Some(ParsedItem::default());
                self.pending_enclosure = None;
                self.item_desc_priority = 0;
                self.capture = None;
            }
            "author" => {
                if self.item.is_none() && !tag.self_closing {
                    self.author_depth = Some(self.depth);
                }
            }
            "enclosure" => {
                if self.item.is_some() && self.pending_enclosure.is_none() {
                    if let Some(url) = tag.attr("url") {
                        self.pending_enclosure = Some(clean::decode_entities(url));
                    }
                }
            }
            "link" => {
                // Atom links carry the target in href; RSS links in the body.
                if let Some(href) = tag.attr("href") {
                    self.assign_link(clean::decode_entities(href));
                } else if !tag.self_closing {
                    self.begin_capture(Slot::Link, tag);
                }
            }
            "name" if self.in_author() => self.begin_capture(Slot::AuthorName, tag),
            "uri" if self.in_author() => self.begin_capture(Slot::AuthorUri, tag),
            "title" => self.begin_capture(Slot::Title, tag),
            "description" | "content:encoded" | "media:description" | "subtitle" => {
                self.begin_capture(Slot::Description, tag)
            }
            "summary" => self.begin_capture(Slot::Summary, tag),
            "content" => self.begin_capture(Slot::Content, tag),
            "pubdate" | "published" | "updated" | "dc:date" | "date" | "lastbuilddate" => {
                self.begin_capture(Slot::Date, tag)
            }
            "guid" | "id" => self.begin_capture(Slot::Guid, tag),
            "language" => self.begin_capture(Slot::Language, tag),
            "generator" => self.begin_capture(Slot::Generator, tag),
            _ => {}
        }
    }

    /// Returns true when the parse should stop.
    fn on_end(&mut self, raw_name: &str) -> bool {
        let name = raw_name.to_ascii_lowercase();

        match self.capture.take() {
            Some(capture) if capture.depth == self.depth => self.assign(capture),
            other => self.capture = other,
        }
        if self.author_depth == Some(self.depth) && name == "author" {
            self.author_depth = None;
        }

        if name == "item" || name == "entry" {
            if let Some(mut item) = self.item.take() {
                self.capture = None;
                if item.link.is_none() {
                    item.link = self.pending_enclosure.take();
                }
                item.timestamp = item
                    .pub_date
                    .as_deref()
                    .map(date::parse_timestamp)
                    .unwrap_or(0);
                if let Some(stop) = self.stop.as_mut() {
                    if stop(&item) {
                        self.aborted = true;
                        return true;
                    }
                }
                self.feed.items.push(item);
            }
        }

        self.depth = self.depth.saturating_sub(1);
        false
    }

    fn in_author(&self) -> bool {
        self.author_depth.is_some() && self.item.is_none()
    }

    fn begin_capture(&mut self, slot: Slot, tag: &xml::Tag<'_>) {
        if self.capture.is_none() && !tag.self_closing {
            self.capture = Some(Capture {
                slot,
                depth: self.depth,
                text: String::new(),
            });
        }
    }

    fn assign(&mut self, capture: Capture) {
        let cleaned = clean::clean_html(&capture.text);
        if cleaned.is_empty() {
            return;
        }
        match capture.slot {
            Slot::Title => {
                let target = match &mut self.item {
                    Some(item) => &mut item.title,
                    None => &mut self.feed.title,
                };
                set_if_none(target, cleaned);
            }
            Slot::Link => self.assign_link(cleaned),
            Slot::Description | Slot::Summary | Slot::Content => {
                let priority = description_priority(capture.slot);
                match &mut self.item {
                    Some(item) => {
                        if priority > self.item_desc_priority {
                            item.description = Some(cleaned);
                            self.item_desc_priority = priority;
                        }
                    }
                    None => {
                        if priority > self.feed_desc_priority {
                            self.feed.description = Some(cleaned);
                            self.feed_desc_priority = priority;
                        }
                    }
                }
            }
            Slot::Date => {
                let target = match &mut self.item {
                    Some(item) => &mut item.pub_date,
                    None => &mut self.feed.last_build_date,
                };
                set_if_none(target, cleaned);
            }
            Slot::Guid => {
                if let Some(item) = &mut self.item {
                    set_if_none(&mut item.guid, cleaned);
                }
            }
            Slot::Language => {
                if self.item.is_none() {
                    set_if_none(&mut self.feed.language, cleaned);
                }
            }
            Slot::Generator => {
                if self.item.is_none() {
                    set_if_none(&mut self.feed.generator, cleaned);
                }
            }
            Slot::AuthorName => set_if_none(&mut self.feed.author_name, cleaned),
            Slot::AuthorUri => set_if_none(&mut self.feed.author_uri, cleaned),
        }
    }

    fn assign_link(&mut self, value: String) {
        // The first captured link wins, for items and for the feed root.
        let target = match &mut self.item {
            Some(item) => &mut item.link,
            None => &mut self.feed.link,
        };
        set_if_none(target, value);
    }
}

fn set_if_none(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}
