//! # Input Recorder
//!
//! Writes raw controller events and dispatched commands to JSON Lines
//! files with rotation.
//!
//! Each line is one record with an RFC 3339 `timestamp` and either an
//! `event` or an `action`/`value` pair:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123+00:00","event":{"type":"button_down","button":0}}
//! {"timestamp":"2024-05-01T12:00:00.124+00:00","action":"Key.space","value":1.0}
//! ```
//!
//! A new file is started after `max_records_per_file` records and only the
//! newest `max_files_to_keep` files are retained.

use chrono::{Local, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::controller::event::RawEvent;
use crate::error::Result;
use crate::mapping::action::ActionCommand;

const FILE_PREFIX: &str = "inputs-";
const FILE_SUFFIX: &str = ".jsonl";

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    event: &'a RawEvent,
}

#[derive(Serialize)]
struct CommandRecord {
    timestamp: String,
    action: String,
    value: f64,
}

/// Rotating JSON Lines writer.
pub struct InputRecorder {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    sequence: u32,
}

impl InputRecorder {
    /// Creates a recorder writing into `dir` (created if missing).
    ///
    /// No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    /// Appends a raw event.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` if the record cannot be written.
    pub fn record_event(&mut self, event: &RawEvent) -> Result<()> {
        self.write_record(&EventRecord {
            timestamp: Utc::now().to_rfc3339(),
            event,
        })
    }

    /// Appends a dispatched command.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` if the record cannot be written.
    pub fn record_command(&mut self, command: &ActionCommand) -> Result<()> {
        self.write_record(&CommandRecord {
            timestamp: Utc::now().to_rfc3339(),
            action: command.action.to_string(),
            value: command.value.as_f64(),
        })
    }

    /// Flushes buffered records to disk.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// File currently being written, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }
        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.sequence += 1;

        let name = format!(
            "{}{}-{:04}{}",
            FILE_PREFIX,
            Local::now().format("%Y%m%d-%H%M%S"),
            self.sequence,
            FILE_SUFFIX
        );
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        info!("Recording inputs to {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;
        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
            })
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            debug!("Removing old recording {}", path.display());
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

impl Drop for InputRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush input recording: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::action::{ActionTarget, ActionValue};
    use tempfile::tempdir;

    fn recordings(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_no_file_until_first_record() {
        let dir = tempdir().unwrap();
        let recorder = InputRecorder::new(dir.path(), 10, 3).unwrap();

        assert!(recorder.current_path().is_none());
        assert!(recordings(dir.path()).is_empty());
    }

    #[test]
    fn test_records_are_json_lines() {
        let dir = tempdir().unwrap();
        let mut recorder = InputRecorder::new(dir.path(), 10, 3).unwrap();

        recorder.record_event(&RawEvent::ButtonDown { button: 2 }).unwrap();
        recorder
            .record_command(&ActionCommand::new(ActionTarget::parse("Key.space"), ActionValue::Edge(true)))
            .unwrap();
        recorder.flush().unwrap();

        let path = recorder.current_path().unwrap().to_path_buf();
        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"]["type"], "button_down");
        assert_eq!(lines[0]["event"]["button"], 2);
        assert!(lines[0]["timestamp"].as_str().unwrap().contains('T'));
        assert_eq!(lines[1]["action"], "Key.space");
        assert_eq!(lines[1]["value"], 1.0);
    }

    #[test]
    fn test_rotation_after_max_records() {
        let dir = tempdir().unwrap();
        let mut recorder = InputRecorder::new(dir.path(), 2, 10).unwrap();

        for button in 0..5 {
            recorder.record_event(&RawEvent::ButtonDown { button }).unwrap();
        }
        recorder.flush().unwrap();

        let files = recordings(dir.path());
        assert_eq!(files.len(), 3);
        let line_counts: Vec<usize> = files
            .iter()
            .map(|path| fs::read_to_string(path).unwrap().lines().count())
            .collect();
        assert_eq!(line_counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_keeps_only_newest_files() {
        let dir = tempdir().unwrap();
        let mut recorder = InputRecorder::new(dir.path(), 1, 2).unwrap();

        for button in 0..4 {
            recorder.record_event(&RawEvent::ButtonDown { button }).unwrap();
        }
        recorder.flush().unwrap();

        let files = recordings(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(files.last(), recorder.current_path().map(Path::to_path_buf).as_ref());
    }

    #[test]
    fn test_unrelated_files_are_kept() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let mut recorder = InputRecorder::new(dir.path(), 1, 1).unwrap();

        for button in 0..3 {
            recorder.record_event(&RawEvent::ButtonUp { button }).unwrap();
        }

        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut recorder = InputRecorder::new(&nested, 5, 5).unwrap();
        recorder.record_event(&RawEvent::DeviceAdded { id: 1 }).unwrap();
        assert!(nested.is_dir());
    }
}
