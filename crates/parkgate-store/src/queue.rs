//! # Offline Queue
//!
//! Durable FIFO of entry records the server has not confirmed.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Offline Queue Lifecycle                              │
//! │                                                                         │
//! │   (no file)  ──append──►  [r1]  ──append──►  [r1, r2]  ──append──► ...  │
//! │       ▲                                          │                      │
//! │       │                                          │ drain reads [r1, r2] │
//! │       │                                          │ meanwhile: append r3 │
//! │       │                                          ▼                      │
//! │       │                                    [r1, r2, r3]                 │
//! │       │                                          │                      │
//! │       │                         server accepted  │ remove_synced(r1,r2) │
//! │       │                                          ▼                      │
//! │       └──────────── nothing left ◄────────── [r3]                      │
//! │                                                                         │
//! │  FAILED DRAIN: file untouched, retried later                           │
//! │  CORRUPT FILE: load_all → QueueCorrupt; append quarantines it and      │
//! │                starts a fresh queue holding the new record             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## File Format
//! A pretty-printed JSON array of [`EntryRecord`], replaced wholesale on
//! every mutation through [`crate::atomic::write_atomic`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use parkgate_core::validation::missing_document_fields;
use parkgate_core::EntryRecord;

use crate::atomic::{read_optional, remove_durable, write_atomic};
use crate::error::{StoreError, StoreResult};
use crate::COUNTER_FILE_NAME;

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Queue length after the append.
    pub queued: usize,

    /// Where a corrupt queue was moved before this append, if it was.
    pub quarantined: Option<PathBuf>,
}

/// A queued document that fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIssue {
    /// Position in the queue file.
    pub index: usize,

    /// Ticket number, when the document has one.
    pub ticket_number: Option<String>,

    /// Required fields that are absent or blank.
    pub missing: Vec<&'static str>,

    /// Parse failure for documents that have every field but still do not
    /// load (e.g. an unknown `jenis`).
    pub reason: Option<String>,
}

/// Diagnostic view of the queue file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueInspection {
    /// Whether the queue file exists.
    pub exists: bool,

    /// Number of documents in the file (0 when corrupt).
    pub total: usize,

    /// Documents that would not pass validation.
    pub issues: Vec<DocumentIssue>,

    /// Why the file as a whole cannot be read, if it cannot.
    pub corrupt: Option<String>,
}

impl QueueInspection {
    /// True when the file is readable and every document is well-formed.
    pub fn is_healthy(&self) -> bool {
        self.corrupt.is_none() && self.issues.is_empty()
    }
}

// =============================================================================
// Offline Queue
// =============================================================================

/// File-backed offline queue.
///
/// Not internally synchronized; the caller holds the only handle.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    path: PathBuf,
}

impl OfflineQueue {
    /// Opens the queue at `path`. Nothing is read or created yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        OfflineQueue { path: path.into() }
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the ticket counter that lives next to the queue.
    pub fn counter_path(&self) -> PathBuf {
        self.path.with_file_name(COUNTER_FILE_NAME)
    }

    /// Returns every queued record in arrival order.
    ///
    /// A missing or empty file is an empty queue. Anything unparsable is
    /// [`StoreError::QueueCorrupt`].
    pub fn load_all(&self) -> StoreResult<Vec<EntryRecord>> {
        let Some(data) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|e| StoreError::queue_corrupt(&self.path, e))
    }

    /// Number of queued records.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.load_all()?.len())
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Appends a record to the tail.
    ///
    /// The previous snapshot stays on disk until the new one has been fully
    /// written. If the current file is corrupt it is renamed aside first and
    /// the record starts a fresh queue.
    pub fn append(&self, record: EntryRecord) -> StoreResult<AppendOutcome> {
        let (mut records, quarantined) = match self.load_all() {
            Ok(records) => (records, None),
            Err(StoreError::QueueCorrupt { reason, .. }) => {
                let moved_to = self.quarantine()?;
                error!(
                    path = %self.path.display(),
                    quarantined = %moved_to.display(),
                    %reason,
                    "Offline queue corrupt; starting a fresh queue"
                );
                (Vec::new(), Some(moved_to))
            }
            Err(e) => return Err(e),
        };

        let ticket_number = record.ticket_number.clone();
        records.push(record);
        self.write_snapshot(&records)?;

        debug!(ticket_number = %ticket_number, queued = records.len(), "Appended offline record");

        Ok(AppendOutcome {
            queued: records.len(),
            quarantined,
        })
    }

    /// Removes the records whose ticket numbers were accepted by the server.
    ///
    /// Records appended after the batch was read are kept. Returns the number
    /// of records left; the file is deleted when none are.
    pub fn remove_synced(&self, ticket_numbers: &[String]) -> StoreResult<usize> {
        let synced: HashSet<&str> = ticket_numbers.iter().map(String::as_str).collect();
        let mut records = self.load_all()?;
        let before = records.len();
        records.retain(|r| !synced.contains(r.ticket_number.as_str()));

        if records.len() == before {
            return Ok(before);
        }

        if records.is_empty() {
            remove_durable(&self.path)?;
        } else {
            self.write_snapshot(&records)?;
        }

        debug!(
            removed = before - records.len(),
            remaining = records.len(),
            "Removed synced records"
        );
        Ok(records.len())
    }

    /// Removes every record. Returns whether a file existed.
    pub fn clear(&self) -> StoreResult<bool> {
        let removed = remove_durable(&self.path)?;
        if removed {
            info!(path = %self.path.display(), "Offline queue cleared");
        }
        Ok(removed)
    }

    /// A record is well-formed when plate, vehicle type, ticket number and
    /// entry time are populated.
    pub fn validate(record: &EntryRecord) -> bool {
        record.check().is_ok()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Scans the file document by document without failing on bad entries.
    pub fn inspect(&self) -> StoreResult<QueueInspection> {
        let Some(data) = read_optional(&self.path)? else {
            return Ok(QueueInspection::default());
        };

        let mut inspection = QueueInspection {
            exists: true,
            ..Default::default()
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(inspection);
        }

        let documents: Vec<serde_json::Value> = match serde_json::from_slice(&data) {
            Ok(docs) => docs,
            Err(e) => {
                inspection.corrupt = Some(e.to_string());
                return Ok(inspection);
            }
        };

        inspection.total = documents.len();
        for (index, doc) in documents.into_iter().enumerate() {
            let ticket_number = doc
                .get("ticket_number")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string);
            let missing = missing_document_fields(&doc);

            let reason = if missing.is_empty() {
                match serde_json::from_value::<EntryRecord>(doc).map(|r| r.check()) {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(e) => Some(e.to_string()),
                }
            } else {
                None
            };

            inspection.issues.push(DocumentIssue {
                index,
                ticket_number,
                missing,
                reason,
            });
        }

        Ok(inspection)
    }

    /// Rewrites the queue keeping only documents that load and validate.
    ///
    /// Returns how many documents were dropped. Fails with `QueueCorrupt`
    /// when the file is not a JSON array at all.
    pub fn retain_valid(&self) -> StoreResult<usize> {
        let Some(data) = read_optional(&self.path)? else {
            return Ok(0);
        };

        let documents: Vec<serde_json::Value> =
            serde_json::from_slice(&data).map_err(|e| StoreError::queue_corrupt(&self.path, e))?;
        let total = documents.len();

        let valid: Vec<EntryRecord> = documents
            .into_iter()
            .filter_map(|doc| serde_json::from_value::<EntryRecord>(doc).ok())
            .filter(|record| match record.check() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed offline record");
                    false
                }
            })
            .collect();

        let dropped = total - valid.len();
        if dropped == 0 {
            return Ok(0);
        }

        if valid.is_empty() {
            remove_durable(&self.path)?;
        } else {
            self.write_snapshot(&valid)?;
        }

        warn!(dropped, kept = valid.len(), "Removed invalid offline records");
        Ok(dropped)
    }

    /// Copies the queue file verbatim into `dir` (default: next to the queue).
    ///
    /// Returns the backup path, or `None` when there is no queue file.
    pub fn backup(&self, dir: Option<&Path>) -> StoreResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(&dir)?;
        }

        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let mut target = dir.join(format!("offline_data_backup_{}.json", stamp));
        let mut n = 1;
        while target.exists() {
            target = dir.join(format!("offline_data_backup_{}_{}.json", stamp, n));
            n += 1;
        }

        fs::copy(&self.path, &target)?;
        info!(backup = %target.display(), "Offline queue backed up");
        Ok(Some(target))
    }

    /// Files this queue was moved to after being found corrupt.
    pub fn quarantined_files(&self) -> StoreResult<Vec<PathBuf>> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let prefix = format!("{}.corrupt-", self.stem());

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn write_snapshot(&self, records: &[EntryRecord]) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &data)?;
        Ok(())
    }

    fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("offline_data")
    }

    /// Moves the current file aside so a fresh queue can be started.
    fn quarantine(&self) -> StoreResult<PathBuf> {
        let stem = self.stem();
        let stamp = Utc::now().format("%Y%m%d%H%M%S");

        let mut target = self.path.with_file_name(format!("{}.corrupt-{}.json", stem, stamp));
        let mut n = 1;
        while target.exists() {
            target = self
                .path
                .with_file_name(format!("{}.corrupt-{}-{}.json", stem, stamp, n));
            n += 1;
        }

        fs::rename(&self.path, &target)?;
        Ok(target)
    }
}

// =============================================================================
// Tests
// =============================================================================
