use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A single fetch target inside a group.
///
/// Mirrors the on-disk JSON shape: `xmlUrl` is required, everything else is
/// optional and omitted from the file when absent. The OPML-origin metadata
/// is preserved verbatim but never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(rename = "xmlUrl")]
    pub xml_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "htmlUrl", default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub feed_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(
        rename = "lastModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<String>,
}

impl FeedConfig {
    pub fn new(xml_url: String) -> Self {
        Self {
            xml_url,
            text: None,
            enabled: true,
            title: None,
            html_url: None,
            description: None,
            feed_type: None,
            language: None,
            version: None,
            etag: None,
            last_modified: None,
        }
    }

    /// Name shown for this feed in the digest: explicit text, then the OPML
    /// title, then the URL itself.
    pub fn display_name(&self) -> &str {
        self.text
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.xml_url)
    }
}

/// A named collection of feeds sharing one interval gate and history stream.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    pub display_name: Option<String>,
    pub feeds: Vec<FeedConfig>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            feeds: Vec::new(),
        }
    }

    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }
}

/// A parsed article as delivered to the formatter and stored in snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RssItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,

    /// Epoch seconds; 0 when the feed's date was missing or unparsable.
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_display_name: Option<String>,
}

/// The tree a single parse produces. Dropping the value releases every
/// string it owns as a unit.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub generator: Option<String>,
    pub last_build_date: Option<String>,
    pub author_name: Option<String>,
    pub author_uri: Option<String>,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub pub_date: Option<String>,
    /// Epoch seconds; 0 when unparsable.
    pub timestamp: i64,
}

impl ParsedItem {
    /// Identity key for dedup: the guid when non-empty, else the link when
    /// non-empty, else no identity (always treated as fresh).
    pub fn identity(&self) -> Option<&str> {
        self.guid
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.link.as_deref().filter(|s| !s.is_empty()))
    }
}
