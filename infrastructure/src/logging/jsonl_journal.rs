//! Epoch journal on disk, one JSON object per line
//!
//! The coordinator reports its lifecycle here: `epoch_opened`,
//! `proposal_submitted`, `proposal_committed`, `proposal_withdrawn`,
//! `phase_transition` and `epoch_closed`. Each line carries the event's
//! payload fields flattened next to `type` and an RFC 3339 `timestamp`, so a
//! run can be replayed or followed with `tail -f` while it is still going.

use liminal_application::{EpochJournal, JournalEvent};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// [`EpochJournal`] backed by a JSONL file
///
/// Every event is flushed as soon as it is written. I/O failures are logged
/// and the event is dropped; the coordinator never sees them.
pub struct JsonlEpochJournal {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEpochJournal {
    /// Start a fresh journal at `path`, truncating any previous run
    ///
    /// Missing parent directories are created. Returns `None` (after a
    /// warning) when the file cannot be opened, so a run can go on without a
    /// journal.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create journal directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create journal file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn to_record(event: JournalEvent) -> Value {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        // Object payloads are flattened; anything else nests under `data`
        let mut map = match event.payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        map.insert(
            "type".to_string(),
            Value::String(event.event_type.to_string()),
        );
        map.insert("timestamp".to_string(), Value::String(timestamp));
        Value::Object(map)
    }
}

impl EpochJournal for JsonlEpochJournal {
    fn record(&self, event: JournalEvent) {
        let event_type = event.event_type;
        let line = match serde_json::to_string(&Self::to_record(event)) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not serialize journal event {}: {}", event_type, e);
                return;
            }
        };

        let Ok(mut writer) = self.writer.lock() else {
            warn!("Journal writer lock poisoned, dropping {}", event_type);
            return;
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(
                "Could not write journal event {} to {}: {}",
                event_type,
                self.path.display(),
                e
            );
        }
    }
}

impl Drop for JsonlEpochJournal {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
