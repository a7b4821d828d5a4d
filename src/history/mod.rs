//! Daily snapshot files and logical-date arithmetic.
//!
//! One JSON file per (group, logical date) under the `history` directory,
//! named `<group>_<YYYY-MM-DD>.json`. The ISO date format makes the
//! lexicographically greatest filename the newest run. The logical date is
//! the local date shifted back by `day_start_hour`, so pre-dawn reads count
//! toward the previous day.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::Result;
use crate::domain::RssItem;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: i64,
    pub items: Vec<RssItem>,
}

pub fn logical_date(day_start_hour: u8) -> NaiveDate {
    logical_date_from(Local::now(), day_start_hour)
}

pub fn logical_date_from(now: DateTime<Local>, day_start_hour: u8) -> NaiveDate {
    (now - Duration::hours(i64::from(day_start_hour))).date_naive()
}

pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn snapshot_path(&self, group: &str, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{group}_{}.json", date.format("%Y-%m-%d")))
    }

    pub fn save_snapshot(&self, group: &str, date: NaiveDate, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshot_path(group, date);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(snapshot)
            .map_err(|err| crate::app::HysError::Config(err.to_string()))?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(group, %date, items = snapshot.items.len(), "saved snapshot");
        Ok(())
    }

    pub fn load_snapshot(&self, path: &Path) -> Result<Snapshot> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|err| crate::app::HysError::Config(format!("bad snapshot {}: {err}", path.display())))
    }

    /// Newest run for a group, if any.
    pub fn latest_run(&self, group: &str) -> Option<(NaiveDate, PathBuf)> {
        self.runs_desc(group).into_iter().next()
    }

    /// All runs for a group, newest first.
    pub fn runs_desc(&self, group: &str) -> Vec<(NaiveDate, PathBuf)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut runs: Vec<(NaiveDate, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                self.parse_run_name(group, name.to_str()?)
            })
            .collect();
        runs.sort_by(|a, b| b.0.cmp(&a.0));
        runs
    }

    /// Run at `|offset|` in the newest-first list: 0 is the most recent,
    /// -1 the one before, and so on. Out of range yields an empty snapshot.
    pub fn load_run_by_offset(&self, group: &str, offset: i64) -> Snapshot {
        let runs = self.runs_desc(group);
        match runs.get(offset.unsigned_abs() as usize) {
            Some((_, path)) => self.load_snapshot(path).unwrap_or_else(|err| {
                warn!(group, error = %err, "failed to load snapshot");
                Snapshot::default()
            }),
            None => Snapshot::default(),
        }
    }

    /// Deletes runs older than the retention horizon. Returns how many
    /// files were removed.
    pub fn prune_group(&self, group: &str, today: NaiveDate, retention_days: u32) -> Result<usize> {
        let mut removed = 0;
        for (date, path) in self.runs_desc(group) {
            let age = today.signed_duration_since(date).num_days();
            if age > i64::from(retention_days) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Strict filename match: `<group>_<YYYY-MM-DD>.json` with a digit right
    /// after the underscore, so `tech_` never swallows `tech_news_` files.
    fn parse_run_name(&self, group: &str, file_name: &str) -> Option<(NaiveDate, PathBuf)> {
        let stem = file_name.strip_suffix(".json")?;
        if stem.len() != group.len() + 1 + 10 {
            return None;
        }
        let rest = stem.strip_prefix(group)?.strip_prefix('_')?;
        if !rest.as_bytes().first()?.is_ascii_digit() {
            return None;
        }
        let date = NaiveDate::parse_from_str(rest, "%Y-%m-%d").ok()?;
        Some((date, self.dir.join(file_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_in(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().to_path_buf())
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_logical_date_shifts_predawn_to_previous_day() {
        let predawn = Local.with_ymd_and_hms(2024, 1, 10, 3, 30, 0).unwrap();
        assert_eq!(logical_date_from(predawn, 4), date("2024-01-09"));
        assert_eq!(logical_date_from(predawn, 0), date("2024-01-10"));

        let evening = Local.with_ymd_and_hms(2024, 1, 10, 22, 0, 0).unwrap();
        assert_eq!(logical_date_from(evening, 4), date("2024-01-10"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let snapshot = Snapshot {
            timestamp: 1_700_000_000,
            items: vec![RssItem {
                title: Some("Hello".into()),
                guid: Some("g1".into()),
                timestamp: 5,
                ..Default::default()
            }],
        };
        store.save_snapshot("main", date("2024-01-10"), &snapshot).unwrap();

        let (latest_date, path) = store.latest_run("main").unwrap();
        assert_eq!(latest_date, date("2024-01-10"));
        let loaded = store.load_snapshot(&path).unwrap();
        assert_eq!(loaded.timestamp, 1_700_000_000);
        assert_eq!(loaded.items[0].title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_latest_run_picks_greatest_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for d in ["2024-01-08", "2024-01-10", "2024-01-09"] {
            store.save_snapshot("main", date(d), &Snapshot::default()).unwrap();
        }
        assert_eq!(store.latest_run("main").unwrap().0, date("2024-01-10"));
    }

    #[test]
    fn test_group_prefix_does_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save_snapshot("tech", date("2024-01-09"), &Snapshot::default()).unwrap();
        store
            .save_snapshot("tech_news", date("2024-01-10"), &Snapshot::default())
            .unwrap();

        assert_eq!(store.latest_run("tech").unwrap().0, date("2024-01-09"));
        assert_eq!(store.latest_run("tech_news").unwrap().0, date("2024-01-10"));
        assert_eq!(store.runs_desc("tech").len(), 1);
    }

    #[test]
    fn test_load_run_by_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for (d, ts) in [("2024-01-08", 8), ("2024-01-09", 9), ("2024-01-10", 10)] {
            let snapshot = Snapshot {
                timestamp: ts,
                items: Vec::new(),
            };
            store.save_snapshot("main", date(d), &snapshot).unwrap();
        }
        assert_eq!(store.load_run_by_offset("main", 0).timestamp, 10);
        assert_eq!(store.load_run_by_offset("main", -1).timestamp, 9);
        assert_eq!(store.load_run_by_offset("main", -2).timestamp, 8);
        assert_eq!(store.load_run_by_offset("main", -9).timestamp, 0);
    }

    #[test]
    fn test_prune_group_removes_old_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for d in ["2024-01-01", "2024-01-05", "2024-01-10"] {
            store.save_snapshot("main", date(d), &Snapshot::default()).unwrap();
        }
        let removed = store.prune_group("main", date("2024-01-10"), 5).unwrap();
        assert_eq!(removed, 1);
        let dates: Vec<_> = store.runs_desc("main").into_iter().map(|(d, _)| d).collect();
        assert_eq!(dates, [date("2024-01-10"), date("2024-01-05")]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let store = HistoryStore::new(PathBuf::from("/nonexistent/history"));
        assert!(store.latest_run("main").is_none());
        assert!(store.load_run_by_offset("main", 0).items.is_empty());
    }
}
