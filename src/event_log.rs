//! Event log for one execution
//!
//! Provides a full audit trail of what the pipeline read, invoked and wrote.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: execution-level, descriptor-level and persistence variants
//! - EventLog: thread-safe, append-only log

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since execution start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types
///
/// `subject` is the descriptor name, resource id or view id the event is about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // EXECUTION LEVEL
    // ═══════════════════════════════════════════
    ExecutionStarted {
        algorithm: String,
        arguments: String,
        descriptor_count: usize,
    },
    ExecutionCompleted {
        updated: Vec<String>,
        total_duration_ms: u64,
    },
    ExecutionFailed {
        error: String,
    },

    // ═══════════════════════════════════════════
    // BINDING + INVOCATION
    // ═══════════════════════════════════════════
    DescriptorResolved {
        subject: Arc<str>,
        /// "value", "table" or "record"
        kind: String,
    },
    AlgorithmInvoked {
        algorithm: String,
        inputs: Vec<String>,
    },
    AlgorithmReturned {
        algorithm: String,
        outputs: Vec<String>,
        duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // RECONCILIATION + PERSISTENCE
    // ═══════════════════════════════════════════
    ValueUpdated {
        subject: Arc<str>,
        value: Value,
    },
    ResourcePersisted {
        subject: Arc<str>,
        schema_preserved: bool,
    },
    ArgumentsPersisted {
        path: String,
    },

    // ═══════════════════════════════════════════
    // VIEWS
    // ═══════════════════════════════════════════
    ViewRendered {
        subject: Arc<str>,
        resources: Vec<String>,
    },
    ArtefactExported {
        subject: Arc<str>,
        path: String,
    },
}

impl EventKind {
    /// Extract the subject if the event is about one descriptor/resource/view
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::DescriptorResolved { subject, .. }
            | Self::ValueUpdated { subject, .. }
            | Self::ResourcePersisted { subject, .. }
            | Self::ViewRendered { subject, .. }
            | Self::ArtefactExported { subject, .. } => Some(subject),
            Self::ExecutionStarted { .. }
            | Self::ExecutionCompleted { .. }
            | Self::ExecutionFailed { .. }
            | Self::AlgorithmInvoked { .. }
            | Self::AlgorithmReturned { .. }
            | Self::ArgumentsPersisted { .. } => None,
        }
    }

    /// Check if this event records a write to the datapackage
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::ResourcePersisted { .. }
                | Self::ArgumentsPersisted { .. }
                | Self::ArtefactExported { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at execution start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by subject
    pub fn filter_subject(&self, subject: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.subject() == Some(subject))
            .collect()
    }

    /// Events that wrote something to the datapackage
    pub fn writes(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_write())
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.events())?)
    }

    /// Write the log as JSON lines (one event per line)
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for event in self.events.read().iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eventkind_subject_extraction() {
        let resolved = EventKind::DescriptorResolved {
            subject: "k".into(),
            kind: "value".into(),
        };
        assert_eq!(resolved.subject(), Some("k"));

        let started = EventKind::ExecutionStarted {
            algorithm: "fit".into(),
            arguments: "default".into(),
            descriptor_count: 2,
        };
        assert_eq!(started.subject(), None);
    }

    #[test]
    fn eventkind_serializes_with_type_tag() {
        let kind = EventKind::ValueUpdated {
            subject: "k".into(),
            value: json!(4),
        };

        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "value_updated");
        assert_eq!(json["subject"], "k");
        assert_eq!(json["value"], 4);
    }

    #[test]
    fn eventkind_deserializes_from_tagged_json() {
        let json = json!({
            "type": "resource_persisted",
            "subject": "points",
            "schema_preserved": true
        });

        let kind: EventKind = serde_json::from_value(json).unwrap();
        assert_eq!(
            kind,
            EventKind::ResourcePersisted {
                subject: "points".into(),
                schema_preserved: true,
            }
        );
    }

    #[test]
    fn eventlog_emit_returns_monotonic_ids() {
        let log = EventLog::new();
        assert!(log.is_empty());

        let id1 = log.emit(EventKind::ExecutionFailed { error: "a".into() });
        let id2 = log.emit(EventKind::ExecutionFailed { error: "b".into() });

        assert_eq!(id1, 0);
        assert_eq!(id2, 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn eventlog_writes_only_persistence_events() {
        let log = EventLog::new();
        log.emit(EventKind::DescriptorResolved {
            subject: "points".into(),
            kind: "table".into(),
        });
        log.emit(EventKind::ResourcePersisted {
            subject: "points".into(),
            schema_preserved: false,
        });
        log.emit(EventKind::ArgumentsPersisted {
            path: "arguments/fit.default.json".into(),
        });

        assert_eq!(log.writes().len(), 2);
        assert_eq!(log.filter_subject("points").len(), 2);
    }

    #[test]
    fn eventlog_is_clone() {
        let log = EventLog::new();
        let cloned = log.clone();

        // Cloned shares the same underlying data (Arc)
        log.emit(EventKind::ExecutionFailed { error: "x".into() });
        assert_eq!(cloned.len(), 1);
    }

    #[test]
    fn eventlog_write_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let log = EventLog::new();
        log.emit(EventKind::ArtefactExported {
            subject: "plot".into(),
            path: "views/plot.png".into(),
        });
        log.emit(EventKind::ExecutionFailed { error: "x".into() });
        log.write_jsonl(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"]["type"], "artefact_exported");
    }

    #[test]
    fn eventlog_to_json_is_an_array() {
        let log = EventLog::new();
        log.emit(EventKind::ArgumentsPersisted {
            path: "arguments/fit.default.json".into(),
        });

        let json = log.to_json().unwrap();
        assert_eq!(json[0]["kind"]["type"], "arguments_persisted");
        assert_eq!(json.as_array().unwrap().len(), 1);
    }
}
