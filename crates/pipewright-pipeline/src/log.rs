//! Structured event log.
//!
//! [`EventLog`] is process-wide: an optional JSONL file plus a
//! [`tokio::sync::broadcast`] channel for live observers. [`RunLog`] is the
//! per-run [`EventSink`] that stamps the run id, keeps the run's events in memory,
//! and mirrors each one to `tracing`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use pipewright_types::{EventSink, LogEvent, Result};

/// Shared sink for every run in the process.
pub struct EventLog {
    file: Option<Mutex<File>>,
    sender: broadcast::Sender<LogEvent>,
}

impl EventLog {
    /// In-memory only: events go to subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { file: None, sender }
    }

    /// Append events as JSON lines to `path`, creating parent directories.
    pub fn with_file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, _) = broadcast::channel(1024);
        Ok(Self {
            file: Some(Mutex::new(file)),
            sender,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    /// Write one event. The whole line is written under the file lock so
    /// concurrent runs never interleave within an entry.
    ///
    /// The append is a blocking `std::fs` write on the calling thread. Entries
    /// are single short lines, so this stays inline rather than going through a
    /// writer task.
    pub fn record(&self, event: &LogEvent) {
        if let Some(ref file) = self.file {
            let mut line = event.to_json_line();
            line.push('\n');
            match file.lock() {
                Ok(mut f) => {
                    if let Err(e) = f.write_all(line.as_bytes()) {
                        tracing::warn!(error = %e, "Failed to append to event log");
                    }
                }
                Err(_) => tracing::warn!("Event log lock poisoned; dropping entry"),
            }
        }
        let _ = self.sender.send(event.clone());
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// The event sink handed to a single run.
pub struct RunLog {
    run_id: String,
    shared: Arc<EventLog>,
    events: Mutex<Vec<LogEvent>>,
}

impl RunLog {
    pub fn new(run_id: impl Into<String>, shared: Arc<EventLog>) -> Self {
        Self {
            run_id: run_id.into(),
            shared,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Events recorded so far, in emission order.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for RunLog {
    fn emit(&self, event: &str, data: serde_json::Value) {
        let entry = LogEvent::new(event, data).for_run(self.run_id.clone());
        match event {
            "pipeline:failed" | "call_failed" => {
                tracing::error!(run_id = %self.run_id, event, data = %entry.data, "pipeline event")
            }
            "node:error" | "node:missing" | "call_error" | "circuit_open" => {
                tracing::warn!(run_id = %self.run_id, event, data = %entry.data, "pipeline event")
            }
            "pipeline:start" | "pipeline:completed" | "node:completed" | "provider:mock" => {
                tracing::info!(run_id = %self.run_id, event, data = %entry.data, "pipeline event")
            }
            _ => tracing::debug!(run_id = %self.run_id, event, data = %entry.data, "pipeline event"),
        }
        self.shared.record(&entry);
        if let Ok(mut events) = self.events.lock() {
            events.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn run_log_stamps_run_id_and_broadcasts() {
        let shared = Arc::new(EventLog::new());
        let mut rx = shared.subscribe();
        let log = RunLog::new("run-1", shared.clone());

        log.emit("node:start", json!({"nodeId": "n1"}));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "node:start");
        assert_eq!(received.run_id.as_deref(), Some("run-1"));
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn file_log_writes_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/events.jsonl");
        let shared = Arc::new(EventLog::with_file(&path).unwrap());
        let log = RunLog::new("r", shared);

        log.emit("pipeline:start", json!({"nodeCount": 2}));
        log.emit("pipeline:completed", json!({}));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "pipeline:start");
        assert_eq!(first["runId"], "r");
        assert_eq!(first["data"]["nodeCount"], 2);
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let shared = Arc::new(EventLog::with_file(&path).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let log = RunLog::new(format!("run-{t}"), shared);
                    for i in 0..50 {
                        log.emit("node:start", json!({"i": i, "pad": "x".repeat(200)}));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        for line in lines {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }
}
