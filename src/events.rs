//! Event output for external integrations.
//!
//! Applied, reverted and discarded mutations are emitted as JSON lines to
//! stdout or a configured file. This is how a UI shell learns about a
//! rolled-back write and shows its notification.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "journey.event.v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStatusChanged,
    TaskStatusReverted,
    GoalAdded,
    GoalAddReverted,
    MilestoneUpdated,
    MilestoneUpdateReverted,
    ProgressRecomputed,
    ProgressRecomputeReverted,
    JourneyResynced,
    /// The write finished after the engine was unmounted; nothing was applied.
    WriteDiscarded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event_id: String,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(event: EventKind) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event_id: Ulid::new().to_string(),
            event,
            timestamp: Utc::now(),
            data: None,
        }
    }

    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// JSONL writer for [`Event`]s.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

impl EventSink {
    pub fn stdout() -> Self {
        Self::from_writer(std::io::stdout())
    }

    /// Append to `path`, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}
