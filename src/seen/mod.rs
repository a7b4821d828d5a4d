//! Append-only binary log of seen article hashes.
//!
//! Each record is exactly 12 bytes: a `u32` little-endian timestamp followed
//! by a `u64` little-endian hash. The file is insertion-ordered. Any file
//! whose size is not a multiple of 12 is considered corrupt, deleted, and
//! the store restarts empty.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, warn};

use crate::app::Result;

const RECORD_LEN: usize = 12;
const SECONDS_PER_DAY: i64 = 86_400;

pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Loads every recorded hash. A missing file yields an empty set; a
    /// corrupt file is deleted and also yields an empty set.
    pub fn load(&self) -> HashSet<u64> {
        match self.read_records() {
            Ok(records) => records.into_iter().map(|(_, hash)| hash).collect(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read seen store");
                HashSet::new()
            }
        }
    }

    /// Appends `(now, hash)` records. A failed append means an article may
    /// be shown a second time, so callers treat errors as warnings.
    pub fn append(&self, hashes: &[u64]) -> Result<()> {
        self.append_at(Utc::now().timestamp(), hashes)
    }

    pub fn append_at(&self, now: i64, hashes: &[u64]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let ts = now.clamp(0, u32::MAX as i64) as u32;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        let mut buf = Vec::with_capacity(hashes.len() * RECORD_LEN);
        for &hash in hashes {
            buf.extend_from_slice(&ts.to_le_bytes());
            buf.extend_from_slice(&hash.to_le_bytes());
        }
        file.write_all(&buf)?;
        Ok(())
    }

    /// Drops records older than `retention_days`. Entries at exactly the
    /// cutoff are kept. When nothing is dropped the file is left untouched.
    pub fn prune(&self, retention_days: u32) -> Result<()> {
        self.prune_at(Utc::now().timestamp(), retention_days)
    }

    pub fn prune_at(&self, now: i64, retention_days: u32) -> Result<()> {
        let cutoff = now - i64::from(retention_days) * SECONDS_PER_DAY;
        if cutoff <= 0 {
            return Ok(());
        }
        // The read handle is released before the rewrite opens the file.
        let records = self.read_records()?;
        let kept: Vec<&(u32, u64)> = records
            .iter()
            .filter(|(ts, _)| i64::from(*ts) >= cutoff)
            .collect();
        if kept.len() == records.len() {
            return Ok(());
        }
        debug!(
            dropped = records.len() - kept.len(),
            kept = kept.len(),
            "pruning seen store"
        );
        let mut file = fs::File::create(&self.path)?;
        let mut buf = Vec::with_capacity(kept.len() * RECORD_LEN);
        for (ts, hash) in kept {
            buf.extend_from_slice(&ts.to_le_bytes());
            buf.extend_from_slice(&hash.to_le_bytes());
        }
        file.write_all(&buf)?;
        Ok(())
    }

    fn read_records(&self) -> std::io::Result<Vec<(u32, u64)>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        if bytes.len() % RECORD_LEN != 0 {
            warn!(
                path = %self.path.display(),
                size = bytes.len(),
                "seen store size is not a record multiple, discarding"
            );
            let _ = fs::remove_file(&self.path);
            return Ok(Vec::new());
        }
        let mut records = Vec::with_capacity(bytes.len() / RECORD_LEN);
        for chunk in bytes.chunks_exact(RECORD_LEN) {
            let ts = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let hash = u64::from_le_bytes([
                chunk[4], chunk[5], chunk[6], chunk[7], chunk[8], chunk[9], chunk[10], chunk[11],
            ]);
            records.push((ts, hash));
        }
        Ok(records)
    }
}
