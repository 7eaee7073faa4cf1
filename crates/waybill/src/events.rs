//! Audit events for dispatch runs.
//!
//! Every run appends its progress to a JSONL event log in the state
//! directory, so an operator can reconstruct what a past run did to
//! which order, independently of the summary file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waybill_types::BookingPhase;

/// Default events file name.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Order id used for run-level events.
pub const RUN_SCOPE: &str = "run";

/// Get the events file path for a state directory.
pub fn events_path(state_dir: &Path) -> PathBuf {
    state_dir.join(EVENTS_FILE)
}

/// One audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub timestamp: DateTime<Utc>,
    /// The order this event belongs to, or [`RUN_SCOPE`].
    pub order_id: String,
    #[serde(flatten)]
    pub kind: DispatchEventKind,
}

impl DispatchEvent {
    pub fn now(order_id: impl Into<String>, kind: DispatchEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            order_id: order_id.into(),
            kind,
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEventKind {
    RunStarted {
        run_id: String,
        selector: String,
        order_count: usize,
    },
    PhaseEntered {
        phase: BookingPhase,
    },
    /// The portal reported a logged-out state mid-run; one re-auth
    /// pass was attempted.
    SessionReauth,
    OrderBooked {
        tracking_number: String,
        duration_ms: u64,
    },
    OrderFailed {
        reason: String,
    },
    OrderIndeterminate {
        detail: String,
    },
    CallbackDelivered {
        accepted: bool,
    },
    RunFinished {
        succeeded: usize,
        failed: usize,
        indeterminate: usize,
    },
}

/// Append-only event log for dispatch runs.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<DispatchEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Record a new event.
    pub fn record(&mut self, event: DispatchEvent) {
        self.events.push(event);
    }

    /// Write all recorded events to a file in JSONL format, appending
    /// if the file already exists.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create events dir {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);

        for event in &self.events {
            let line = serde_json::to_string(event).context("failed to serialize event")?;
            writeln!(writer, "{line}").context("failed to write event line")?;
        }
        writer.flush().context("failed to flush events file")?;
        Ok(())
    }

    /// Read all events from a JSONL file. Missing file means an empty
    /// log.
    pub fn read_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let file = File::open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.with_context(|| {
                format!("failed to read line from events file {}", path.display())
            })?;
            let event: DispatchEvent = serde_json::from_str(&line)
                .with_context(|| format!("failed to parse event JSON from line: {line}"))?;
            events.push(event);
        }
        Ok(Self { events })
    }

    /// Drop buffered events after a successful write.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// All buffered events.
    pub fn events(&self) -> &[DispatchEvent] {
        &self.events
    }

    /// Events belonging to one order.
    pub fn events_for_order(&self, order_id: &str) -> Vec<&DispatchEvent> {
        self.events
            .iter()
            .filter(|e| e.order_id == order_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_roundtrip_through_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = events_path(dir.path());

        let mut log = EventLog::new();
        log.record(DispatchEvent::now(
            RUN_SCOPE,
            DispatchEventKind::RunStarted {
                run_id: "abc123".to_string(),
                selector: "all ready-to-ship orders".to_string(),
                order_count: 2,
            },
        ));
        log.record(DispatchEvent::now(
            "ORD-1",
            DispatchEventKind::OrderBooked {
                tracking_number: "JT123456".to_string(),
                duration_ms: 1200,
            },
        ));
        log.write_to_file(&path).expect("write");
        log.clear();
        assert!(log.events().is_empty());

        // Appends rather than truncating.
        log.record(DispatchEvent::now(
            "ORD-2",
            DispatchEventKind::OrderFailed {
                reason: "auth failed".to_string(),
            },
        ));
        log.write_to_file(&path).expect("append");

        let read = EventLog::read_from_file(&path).expect("read");
        assert_eq!(read.events().len(), 3);
        assert_eq!(read.events_for_order("ORD-1").len(), 1);
        assert!(matches!(
            read.events()[2].kind,
            DispatchEventKind::OrderFailed { .. }
        ));
    }

    #[test]
    fn missing_file_reads_as_empty_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EventLog::read_from_file(&events_path(dir.path())).expect("read");
        assert!(log.events().is_empty());
    }

    #[test]
    fn event_wire_format_is_tagged() {
        let event = DispatchEvent::now(
            "ORD-9",
            DispatchEventKind::PhaseEntered {
                phase: BookingPhase::Submitting,
            },
        );
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"event\":\"phase_entered\""));
        assert!(json.contains("\"phase\":\"submitting\""));
    }
}
