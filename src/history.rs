//! Recent-conversion history: the last ten saved PDFs, newest first.
//!
//! The store is a small JSON file rewritten atomically on every mutation.
//! A missing or corrupt file loads as an empty history; this state is
//! display data, never worth failing a conversion over. Entries are
//! deduplicated by output path before insertion, so re-converting the same
//! document moves it to the top instead of listing it twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Maximum number of retained entries; the oldest is evicted beyond this.
pub const MAX_ENTRIES: usize = 10;

/// One saved conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    pub pdf_path: PathBuf,
    pub page_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub has_summary: bool,
}

impl HistoryEntry {
    /// Human-readable age relative to `now`: "just now", "5m ago", "2h ago",
    /// "3d ago", "1w ago".
    pub fn relative_age(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.timestamp).num_seconds().max(0);
        match seconds {
            s if s < 60 => "just now".to_string(),
            s if s < 3_600 => format!("{}m ago", s / 60),
            s if s < 86_400 => format!("{}h ago", s / 3_600),
            s if s < 604_800 => format!("{}d ago", s / 86_400),
            s => format!("{}w ago", s / 604_800),
        }
    }
}

/// File-backed history of recent conversions.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryStore {
    /// Load history from `path`; missing or corrupt data becomes empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<HistoryEntry>>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("history state unreadable, starting empty: {e}");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Record a saved conversion at the top of the history.
    pub fn record(&self, name: &str, pdf_path: &Path, page_count: usize) {
        let entry = HistoryEntry {
            name: name.to_string(),
            pdf_path: pdf_path.to_path_buf(),
            page_count,
            timestamp: Utc::now(),
            has_summary: false,
        };
        let mut entries = self.entries.lock().expect("history poisoned");
        entries.retain(|e| e.pdf_path != entry.pdf_path);
        entries.insert(0, entry);
        entries.truncate(MAX_ENTRIES);
        self.save(&entries);
    }

    /// All entries, newest first.
    pub fn all(&self) -> Vec<HistoryEntry> {
        self.entries.lock().expect("history poisoned").clone()
    }

    /// The `count` most recent entries.
    pub fn recent(&self, count: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().expect("history poisoned");
        entries.iter().take(count).cloned().collect()
    }

    /// Drop the entry for `pdf_path`, if present.
    pub fn remove(&self, pdf_path: &Path) {
        let mut entries = self.entries.lock().expect("history poisoned");
        let before = entries.len();
        entries.retain(|e| e.pdf_path != pdf_path);
        if entries.len() != before {
            self.save(&entries);
        }
    }

    /// Flag the entry for `pdf_path` as summarised.
    pub fn mark_summarized(&self, pdf_path: &Path) {
        let mut entries = self.entries.lock().expect("history poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.pdf_path == pdf_path) {
            entry.has_summary = true;
            self.save(&entries);
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("history poisoned");
        entries.clear();
        self.save(&entries);
    }

    /// Atomic replace: serialise next to the live file, then rename over it.
    fn save(&self, entries: &[HistoryEntry]) {
        let bytes = match serde_json::to_vec_pretty(entries) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("could not serialise history: {e}");
                return;
            }
        };
        let parent = match self.path.parent() {
            Some(parent) => parent,
            None => {
                warn!("history path has no parent directory");
                return;
            }
        };
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("could not create history directory: {e}");
            return;
        }
        let result = tempfile::NamedTempFile::new_in(parent)
            .and_then(|mut tmp| {
                use std::io::Write;
                tmp.write_all(&bytes)?;
                tmp.persist(&self.path).map_err(|e| e.error)
            })
            .map(drop);
        if let Err(e) = result {
            warn!("could not persist history: {e}");
        }
    }
}
