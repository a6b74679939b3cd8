//! Board gestures to status transitions.
//!
//! A gesture that does not name a valid target column maps to `None`, and
//! nothing is dispatched. Column ids are the status names.

use serde::Serialize;

use crate::status::TaskStatus;

/// Column order on the board, left to right.
pub const COLUMN_ORDER: [TaskStatus; 4] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::Stuck,
    TaskStatus::Completed,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardGesture {
    /// Drag released over `target`, or outside any column when `None`.
    Drop {
        task_id: String,
        target: Option<TaskStatus>,
    },
    Start {
        task_id: String,
    },
    Complete {
        task_id: String,
    },
    Reopen {
        task_id: String,
    },
    MarkStuck {
        task_id: String,
    },
    /// Keyboard move to the neighbouring column.
    ShiftColumn {
        task_id: String,
        current: TaskStatus,
        direction: Direction,
    },
}

/// A status change to hand to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionCommand {
    pub task_id: String,
    pub status: TaskStatus,
}

impl TransitionCommand {
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
        }
    }
}

pub fn map_gesture(gesture: &BoardGesture) -> Option<TransitionCommand> {
    match gesture {
        BoardGesture::Drop { task_id, target } => {
            target.map(|status| TransitionCommand::new(task_id.as_str(), status))
        }
        BoardGesture::Start { task_id } => {
            Some(TransitionCommand::new(task_id.as_str(), TaskStatus::InProgress))
        }
        BoardGesture::Complete { task_id } => {
            Some(TransitionCommand::new(task_id.as_str(), TaskStatus::Completed))
        }
        BoardGesture::Reopen { task_id } => {
            Some(TransitionCommand::new(task_id.as_str(), TaskStatus::Todo))
        }
        BoardGesture::MarkStuck { task_id } => {
            Some(TransitionCommand::new(task_id.as_str(), TaskStatus::Stuck))
        }
        BoardGesture::ShiftColumn {
            task_id,
            current,
            direction,
        } => neighbour_column(*current, *direction)
            .map(|status| TransitionCommand::new(task_id.as_str(), status)),
    }
}

/// Column next to `current`, or `None` at the board edge.
pub fn neighbour_column(current: TaskStatus, direction: Direction) -> Option<TaskStatus> {
    let idx = COLUMN_ORDER.iter().position(|status| *status == current)?;
    let next = match direction {
        Direction::Left => idx.checked_sub(1)?,
        Direction::Right => idx + 1,
    };
    COLUMN_ORDER.get(next).copied()
}

/// Resolve a drop-target column id. Unknown ids count as a release outside
/// every column.
pub fn parse_column_id(raw: &str) -> Option<TaskStatus> {
    COLUMN_ORDER
        .iter()
        .copied()
        .find(|status| status.as_str() == raw.trim())
}
