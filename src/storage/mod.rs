//! Group definition files under `feeds/<group>.json`.
//!
//! The current shape is `{ "text": <display_name?>, "feeds": [ ... ] }`;
//! a legacy bare array of feeds is still accepted on read. Saves are
//! whole-file atomic (write to a temp file, then rename) and null-valued
//! optional fields are omitted entirely.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::{HysError, Result};
use crate::domain::{FeedConfig, Group};

#[derive(Serialize, Deserialize)]
struct GroupFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    feeds: Vec<FeedConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupFileCompat {
    Modern(GroupFile),
    Legacy(Vec<FeedConfig>),
}

/// Updated caching metadata for one fetched feed, matched by URL.
#[derive(Debug, Clone)]
pub struct FetchedHeaders {
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

pub struct GroupStore {
    dir: PathBuf,
}

impl GroupStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn group_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Loads a group. A missing file is an empty group, not an error.
    pub fn load(&self, name: &str) -> Result<Group> {
        validate_group_name(name)?;
        let path = self.group_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(group = name, "no group file, treating as empty");
                return Ok(Group::new(name));
            }
            Err(err) => return Err(err.into()),
        };
        let parsed: GroupFileCompat = serde_json::from_slice(&bytes)
            .map_err(|err| HysError::Config(format!("bad group file {}: {err}", path.display())))?;
        let (display_name, feeds) = match parsed {
            GroupFileCompat::Modern(file) => (file.text, file.feeds),
            GroupFileCompat::Legacy(feeds) => (None, feeds),
        };
        Ok(Group {
            name: name.to_string(),
            display_name,
            feeds,
        })
    }

    pub fn save(&self, group: &Group) -> Result<()> {
        validate_group_name(&group.name)?;
        let file = GroupFile {
            text: group.display_name.clone(),
            feeds: group.feeds.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|err| HysError::Config(err.to_string()))?;
        let path = self.group_path(&group.name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// All group names on disk, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                if validate_group_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Merges fresh cache headers into the on-disk group and saves it back.
    ///
    /// The group is re-read from disk first so feeds outside the fetched
    /// set, disabled feeds included, survive exactly as they were.
    pub fn merge_fetched(&self, name: &str, fetched: &[FetchedHeaders]) -> Result<()> {
        if fetched.is_empty() {
            return Ok(());
        }
        let mut group = self.load(name)?;
        for update in fetched {
            if let Some(feed) = group.feeds.iter_mut().find(|f| f.xml_url == update.url) {
                if update.etag.is_some() {
                    feed.etag = update.etag.clone();
                }
                if update.last_modified.is_some() {
                    feed.last_modified = update.last_modified.clone();
                }
            }
        }
        self.save(&group)
    }
}

/// Group names become filenames and shell arguments, so only a conservative
/// character set is allowed.
pub fn validate_group_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(HysError::InvalidGroupName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> GroupStore {
        GroupStore::new(dir.path().to_path_buf())
    }

    #[test]
    fn test_missing_group_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let group = store_in(&dir).load("main").unwrap();
        assert_eq!(group.name, "main");
        assert!(group.feeds.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut group = Group::new("main");
        group.display_name = Some("Main".into());
        let mut disabled = FeedConfig::new("https://example.com/b.xml".into());
        disabled.enabled = false;
        disabled.title = Some("B Feed".into());
        group.feeds = vec![FeedConfig::new("https://example.com/a.xml".into()), disabled];
        store.save(&group).unwrap();

        let loaded = store.load("main").unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("Main"));
        assert_eq!(loaded.feeds.len(), 2);
        assert!(!loaded.feeds[1].enabled);
        assert_eq!(loaded.feeds[1].title.as_deref(), Some("B Feed"));
    }

    #[test]
    fn test_legacy_bare_array_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.group_path("old"),
            r#"[{"xmlUrl": "https://example.com/a.xml"}, {"xmlUrl": "https://example.com/b.xml", "enabled": false}]"#,
        )
        .unwrap();

        let group = store.load("old").unwrap();
        assert_eq!(group.display_name, None);
        assert_eq!(group.feeds.len(), 2);
        assert!(!group.feeds[1].enabled);
    }

    #[test]
    fn test_merge_fetched_updates_only_matched_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut disabled = FeedConfig::new("https://example.com/b.xml".into());
        disabled.enabled = false;
        disabled.etag = Some("\"old-b\"".into());
        let mut group = Group::new("main");
        group.feeds = vec![FeedConfig::new("https://example.com/a.xml".into()), disabled];
        store.save(&group).unwrap();

        store
            .merge_fetched(
                "main",
                &[FetchedHeaders {
                    url: "https://example.com/a.xml".into(),
                    etag: Some("\"new-a\"".into()),
                    last_modified: Some("Wed, 02 Oct 2024 15:30:00 GMT".into()),
                }],
            )
            .unwrap();

        let loaded = store.load("main").unwrap();
        assert_eq!(loaded.feeds[0].etag.as_deref(), Some("\"new-a\""));
        assert!(loaded.feeds[0].last_modified.is_some());
        // The disabled feed kept its state and metadata.
        assert!(!loaded.feeds[1].enabled);
        assert_eq!(loaded.feeds[1].etag.as_deref(), Some("\"old-b\""));
    }

    #[test]
    fn test_merge_fetched_without_new_headers_keeps_old() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut feed = FeedConfig::new("https://example.com/a.xml".into());
        feed.etag = Some("\"keep\"".into());
        let mut group = Group::new("main");
        group.feeds = vec![feed];
        store.save(&group).unwrap();

        store
            .merge_fetched(
                "main",
                &[FetchedHeaders {
                    url: "https://example.com/a.xml".into(),
                    etag: None,
                    last_modified: None,
                }],
            )
            .unwrap();

        assert_eq!(
            store.load("main").unwrap().feeds[0].etag.as_deref(),
            Some("\"keep\"")
        );
    }

    #[test]
    fn test_group_name_validation() {
        assert!(validate_group_name("main").is_ok());
        assert!(validate_group_name("tech_news-2").is_ok());
        assert!(validate_group_name("").is_err());
        assert!(validate_group_name("a/b").is_err());
        assert!(validate_group_name("a b").is_err());
        assert!(validate_group_name("$(rm)").is_err());
        assert!(validate_group_name("..").is_err());
    }
}
