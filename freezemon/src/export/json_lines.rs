//! JSON Lines freeze log
//!
//! Appends each event as a single JSON object followed by `\n`, so a log
//! survives crashes up to the last complete line and can be tailed while the
//! application runs.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use freezemon_common::UiFreezeEvent;

use crate::domain::ExportError;
use crate::logging::FreezeLogger;

/// Freeze logger appending to a `.jsonl` file
pub struct JsonLinesLogger {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesLogger {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, writer: Mutex::new(BufWriter::new(file)) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &UiFreezeEvent) -> Result<(), ExportError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl FreezeLogger for JsonLinesLogger {
    fn log(&self, event: &UiFreezeEvent) -> anyhow::Result<()> {
        self.append(event)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json-lines"
    }
}

/// Read back every event from a JSON Lines freeze log. Blank lines are skipped.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is not a valid event
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<UiFreezeEvent>, ExportError> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .map_err(|e| ExportError::ParseFailed(format!("line {}: {e}", idx + 1)))?;
        events.push(event);
    }
    Ok(events)
}
