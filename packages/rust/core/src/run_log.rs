//! Append-only structured run log.
//!
//! Every fetch and summarization step is recorded as a [`RunEvent`]
//! (thought / action / observation / final answer + metadata). The JSON-lines
//! sink writes one object per line; each line is written under a lock so
//! concurrent writers never interleave.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use starbrief_shared::{Result, StarbriefError};

/// One structured run-log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    pub thought: Option<String>,
    pub action: Option<String>,
    pub observation: Option<String>,
    pub final_answer: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Default for RunEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl RunEvent {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            thought: None,
            action: None,
            observation: None,
            final_answer: None,
            metadata: Map::new(),
        }
    }

    pub fn thought(mut self, text: impl Into<String>) -> Self {
        self.thought = Some(text.into());
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    pub fn observation(mut self, text: impl Into<String>) -> Self {
        self.observation = Some(text.into());
        self
    }

    pub fn final_answer(mut self, text: impl Into<String>) -> Self {
        self.final_answer = Some(text.into());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Metadata value as a string, if present.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Append-only event sink shared by all run components.
pub trait RunLogger: Send + Sync {
    /// Record one event. Sinks never fail the caller; write errors are traced.
    fn log(&self, event: RunEvent);
}

// ---------------------------------------------------------------------------
// JSON-lines file sink
// ---------------------------------------------------------------------------

/// Writes events as JSON lines to a file.
pub struct JsonlRunLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlRunLogger {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StarbriefError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StarbriefError::io(&path, e))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Open a fresh `run_<UTC stamp>.jsonl` file under `log_dir`.
    pub fn for_run(log_dir: &Path) -> Result<Self> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        Self::open(log_dir.join(format!("run_{stamp}.jsonl")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLogger for JsonlRunLogger {
    fn log(&self, event: RunEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode run event");
                return;
            }
        };

        {
            let mut file = self.file.lock().unwrap_or_else(|p| p.into_inner());
            if let Err(e) = writeln!(file, "{line}") {
                warn!(path = %self.path.display(), error = %e, "failed to append run event");
                return;
            }
        }

        debug!(target: "starbrief::run_log", "{line}");
    }
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Keeps events in memory (dry runs and tests).
#[derive(Default)]
pub struct MemoryRunLogger {
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryRunLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events logged so far, in write order.
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl RunLogger for MemoryRunLogger {
    fn log(&self, event: RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_log(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sb-runlog-{tag}-{}", uuid::Uuid::now_v7()))
            .join("run.jsonl")
    }

    #[test]
    fn event_builder_and_shape() {
        let event = RunEvent::new()
            .thought("Need the Aries text")
            .action("fetch")
            .meta("sign", "Aries")
            .meta("attempt", 1);

        assert_eq!(event.meta_str("sign"), Some("Aries"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "fetch");
        assert_eq!(json["observation"], Value::Null);
        assert_eq!(json["final_answer"], Value::Null);
        assert_eq!(json["metadata"]["attempt"], 1);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn jsonl_appends_one_line_per_event() {
        let path = temp_log("append");
        let logger = JsonlRunLogger::open(&path).unwrap();
        logger.log(RunEvent::new().action("fetch"));
        logger.log(RunEvent::new().observation("done"));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: RunEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.observation.as_deref(), Some("done"));

        // Reopening appends rather than truncating.
        drop(logger);
        let logger = JsonlRunLogger::open(&path).unwrap();
        logger.log(RunEvent::new().final_answer("ok"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let path = temp_log("concurrent");
        let logger = Arc::new(JsonlRunLogger::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let logger = Arc::clone(&logger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        logger.log(
                            RunEvent::new()
                                .observation("x".repeat(200))
                                .meta("thread", t)
                                .meta("i", i),
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let mut count = 0;
        for line in content.lines() {
            let _: RunEvent = serde_json::from_str(line).expect("every line is one event");
            count += 1;
        }
        assert_eq!(count, 400);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn for_run_names_file_by_stamp() {
        let dir = std::env::temp_dir().join(format!("sb-runlog-dir-{}", uuid::Uuid::now_v7()));
        let logger = JsonlRunLogger::for_run(&dir).unwrap();
        let name = logger.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run_"));
        assert!(name.ends_with(".jsonl"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn memory_logger_keeps_order() {
        let logger = MemoryRunLogger::new();
        logger.log(RunEvent::new().action("a"));
        logger.log(RunEvent::new().action("b"));
        let actions: Vec<_> = logger
            .events()
            .into_iter()
            .filter_map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["a", "b"]);
    }
}
