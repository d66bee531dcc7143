//! Record store: one JSON document per domain.
//!
//! Every operation reads the file fresh; nothing is cached between calls.
//! Writes replace the whole file (unique temp file + fsync + rename), so a crash
//! mid-append loses the new record but never leaves a half-written file.
//!
//! A per-store mutex is held across the whole load-modify-save cycle, so
//! concurrent appends from several threads never lose each other's records.

use crate::datadir;
use crate::error::Result;
use crate::record::{HistoryFile, HistoryRecord, Retention, DATE_FORMAT};
use chrono::{Duration, Local, NaiveDateTime};
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// What `append` did with the new record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Folded into the last record of the same time bucket
    Merged,
}

pub struct RecordStore<R> {
    path: PathBuf,
    retention: Retention,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: HistoryRecord> RecordStore<R> {
    /// Store for `R` inside `data_dir`, using the domain's default retention
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(R::FILE_NAME),
            retention: R::DEFAULT_RETENTION,
            lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Override the retention; unbounded domains stay unbounded
    pub fn with_retention_days(mut self, days: u32) -> Self {
        if let Retention::TrailingDays(_) = self.retention {
            self.retention = Retention::TrailingDays(days);
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// All records, oldest first. Never fails: unreadable or corrupt
    /// history comes back empty.
    pub fn load(&self) -> Vec<R> {
        let _guard = self.guard();
        match self.read_records() {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "History unreadable, using empty history");
                Vec::new()
            }
        }
    }

    /// Load, merge-or-append, trim to retention, persist.
    ///
    /// A read error other than "not found" is returned rather than
    /// overwriting a file we could not read.
    pub fn append(&self, record: R, now: NaiveDateTime) -> Result<AppendOutcome> {
        let _guard = self.guard();
        let mut records = self.read_records()?;

        let merged = match records.last_mut() {
            Some(last) => record.merge_into(last),
            None => false,
        };
        let outcome = if merged {
            AppendOutcome::Merged
        } else {
            records.push(record);
            AppendOutcome::Appended
        };

        let dropped = prune(&mut records, self.retention, now);
        if dropped > 0 {
            debug!(path = %self.path.display(), dropped, "Pruned records outside retention");
        }

        self.write_records(&records)?;
        Ok(outcome)
    }

    /// Replace the whole history
    pub fn save(&self, records: &[R]) -> Result<()> {
        let _guard = self.guard();
        self.write_records(records)
    }

    /// Delete the backing file
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_records(&self) -> Result<Vec<R>> {
        // Bytes, not a String: invalid UTF-8 is corruption, not an I/O failure
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<HistoryFile<R>>(&content) {
            Ok(file) => Ok(file.records),
            Err(e) => {
                self.quarantine(&e);
                Ok(Vec::new())
            }
        }
    }

    /// Move a corrupt file aside so the next write starts clean
    fn quarantine(&self, cause: &serde_json::Error) {
        let target = quarantine_target(&self.path, &Local::now().format("%Y%m%d%H%M%S").to_string());

        match fs::rename(&self.path, &target) {
            Ok(()) => warn!(
                path = %self.path.display(),
                moved_to = %target.display(),
                error = %cause,
                "Corrupt history quarantined, starting empty"
            ),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %cause,
                rename_error = %e,
                "Corrupt history could not be moved aside, starting empty"
            ),
        }
    }

    fn write_records(&self, records: &[R]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            datadir::ensure(parent)?;
        }

        let doc = HistoryFile {
            records: records.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.path, &data)?;

        debug!(path = %self.path.display(), records = records.len(), "History saved");
        Ok(())
    }
}

/// Drop records dated before `now - days`; returns how many were dropped
pub fn prune<R: HistoryRecord>(records: &mut Vec<R>, retention: Retention, now: NaiveDateTime) -> usize {
    let Retention::TrailingDays(days) = retention else {
        return 0;
    };
    let cutoff = (now.date() - Duration::days(i64::from(days)))
        .format(DATE_FORMAT)
        .to_string();

    let before = records.len();
    records.retain(|r| r.date() >= cutoff.as_str());
    before - records.len()
}

/// `<path>.corrupt-<stamp>`, suffixed `-1`, `-2`, ... when an earlier
/// quarantine already took that name
fn quarantine_target(path: &Path, stamp: &str) -> PathBuf {
    let mut base = path.as_os_str().to_owned();
    base.push(format!(".corrupt-{}", stamp));

    let mut target = PathBuf::from(&base);
    let mut n = 0u32;
    while target.exists() {
        n += 1;
        let mut name = base.clone();
        name.push(format!("-{}", n));
        target = PathBuf::from(name);
    }
    target
}

/// Write to a uniquely named sibling temp file, fsync, then rename over `path`
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    // A failed persist drops the temp file, which removes it
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
