//! Task status lifecycle.
//!
//! Four states, every state reachable from every other. The legacy
//! `completed` flag is carried next to the status inside [`Lifecycle`],
//! whose fields are private: [`Lifecycle::apply`] is the only way to move a
//! task, so the pair can never drift apart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Board column / lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Stuck,
    Completed,
}

impl TaskStatus {
    /// Column order on the board.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Stuck,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Stuck => "stuck",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Stuck => "Stuck",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn is_completed(self) -> bool {
        self == TaskStatus::Completed
    }

    /// Position of this status in [`TaskStatus::ALL`].
    pub fn column_index(self) -> usize {
        match self {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Stuck => 2,
            TaskStatus::Completed => 3,
        }
    }

    /// Lenient parse used for loosely-typed input.
    ///
    /// Case, surrounding whitespace and `-`/space separators are ignored, so
    /// `"In Progress"`, `"in-progress"` and `"inprogress"` all resolve.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "todo" => Some(TaskStatus::Todo),
            "inprogress" => Some(TaskStatus::InProgress),
            "stuck" => Some(TaskStatus::Stuck),
            "completed" | "complete" | "done" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::parse_loose(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown task status '{}' (expected todo|in_progress|stuck|completed)",
                s.trim()
            ))
        })
    }
}

/// The `status`/`completed` pair of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    status: TaskStatus,
    completed: bool,
}

impl Lifecycle {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            completed: status.is_completed(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Move to `next`, updating both fields together.
    pub fn apply(&mut self, next: TaskStatus) -> StatusTransition {
        let previous = *self;
        *self = Lifecycle::new(next);
        debug_assert!(self.is_coherent());
        StatusTransition {
            previous,
            current: *self,
        }
    }

    fn is_coherent(&self) -> bool {
        self.completed == self.status.is_completed()
    }
}

/// Record of one [`Lifecycle::apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: Lifecycle,
    pub current: Lifecycle,
}

impl StatusTransition {
    /// Whether the task moved into or out of `completed`.
    pub fn crosses_completion(&self) -> bool {
        self.previous.completed != self.current.completed
    }

    pub fn is_noop(&self) -> bool {
        self.previous == self.current
    }
}
