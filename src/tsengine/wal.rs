//! Write-ahead log: a flat, append-only record of every write, committed
//! before the memtable mutation so a crash between the two never loses an
//! acknowledged write.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Labels;
use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub series_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub tags: Labels,
}

/// One JSON object per line. `sync_writes` controls whether every `append`
/// fsyncs immediately or only `flush_to_disk` does.
pub struct Wal {
    path: PathBuf,
    file: File,
    sync_writes: bool,
}

impl Wal {
    pub fn open(directory: &Path, sync_writes: bool) -> MonitorResult<Self> {
        std::fs::create_dir_all(directory)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("creating wal dir: {e}")))?;
        let path = directory.join("wal.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("opening wal: {e}")))?;
        Ok(Self { path, file, sync_writes })
    }

    pub fn append(&mut self, record: &WalRecord) -> MonitorResult<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("encoding wal record: {e}")))?;
        writeln!(self.file, "{line}")
            .map_err(|e| MonitorError::StorageWriteFailed(format!("writing wal record: {e}")))?;
        if self.sync_writes {
            self.file
                .sync_all()
                .map_err(|e| MonitorError::StorageWriteFailed(format!("fsyncing wal: {e}")))?;
        }
        Ok(())
    }

    pub fn flush_to_disk(&mut self) -> MonitorResult<()> {
        self.file
            .sync_all()
            .map_err(|e| MonitorError::StorageWriteFailed(format!("fsyncing wal: {e}")))
    }

    /// Replays every record currently on disk, e.g. after a restart before
    /// SSTables caught up. Not wired into startup automatically in this
    /// crate; exposed for callers that want crash recovery.
    pub fn replay(&self) -> MonitorResult<Vec<WalRecord>> {
        let file = File::open(&self.path)
            .map_err(|e| MonitorError::StorageReadFailed(format!("opening wal for replay: {e}")))?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| MonitorError::StorageReadFailed(format!("reading wal line: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: WalRecord = serde_json::from_str(&line)
                .map_err(|e| MonitorError::ParseError(format!("decoding wal record: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Truncates the log. Called after every memtable the log covers has
    /// been durably flushed to an SSTable.
    pub fn truncate(&mut self) -> MonitorResult<()> {
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("truncating wal: {e}")))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Wal::open(dir.path(), true).unwrap();
        let record = WalRecord {
            series_id: "cpu{}".to_string(),
            timestamp: Utc::now(),
            value: 42.0,
            tags: Labels::new(),
        };
        wal.append(&record).unwrap();
        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].value, 42.0);
    }

    #[test]
    fn truncate_clears_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Wal::open(dir.path(), false).unwrap();
        wal.append(&WalRecord {
            series_id: "cpu{}".to_string(),
            timestamp: Utc::now(),
            value: 1.0,
            tags: Labels::new(),
        })
        .unwrap();
        wal.truncate().unwrap();
        assert!(wal.replay().unwrap().is_empty());
    }
}
