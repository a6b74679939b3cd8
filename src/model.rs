//! Canonical journey graph: goals, milestones and tasks.
//!
//! These types only implement `Serialize`. Loosely-typed documents enter
//! through [`crate::normalize`], which is the sole constructor of a
//! populated graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::{Lifecycle, StatusTransition, TaskStatus};

pub const DEFAULT_TASK_TITLE: &str = "Untitled Task";
pub const DEFAULT_ESTIMATED_DURATION: &str = "30 min";
pub const DEFAULT_TASK_CATEGORY: &str = "execution";
pub const DEFAULT_TIME_OF_DAY: &str = "morning";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl EnergyLevel {
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(EnergyLevel::Low),
            "medium" => Some(EnergyLevel::Medium),
            "high" => Some(EnergyLevel::High),
            _ => None,
        }
    }
}

/// A canonical task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub estimated_duration: String,
    pub energy_level_required: EnergyLevel,
    pub category: String,
    pub optimal_time_of_day: BTreeSet<String>,
    pub goal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<String>,
    /// Fields of the stored record the engine does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Build a task with every optional field at its default.
    pub fn new(
        id: impl Into<String>,
        goal_id: impl Into<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TASK_TITLE.to_string(),
            description: String::new(),
            lifecycle: Lifecycle::new(status),
            due_date: None,
            estimated_duration: DEFAULT_ESTIMATED_DURATION.to_string(),
            energy_level_required: EnergyLevel::default(),
            category: DEFAULT_TASK_CATEGORY.to_string(),
            optimal_time_of_day: BTreeSet::from([DEFAULT_TIME_OF_DAY.to_string()]),
            goal_id: goal_id.into(),
            milestone_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.lifecycle.status()
    }

    pub fn is_completed(&self) -> bool {
        self.lifecycle.completed()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Run the status state machine on this task.
    pub fn apply_status(&mut self, next: TaskStatus) -> StatusTransition {
        self.lifecycle.apply(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_date: String,
    pub completed: bool,
    pub completion_criteria: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub progress: u8,
    pub target_completion: String,
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<Task>,
    pub blueprint_alignment: BTreeSet<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Goal {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: String::new(),
            progress: 0,
            target_completion: String::new(),
            milestones: Vec::new(),
            tasks: Vec::new(),
            blueprint_alignment: BTreeSet::new(),
            extra: Map::new(),
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    pub fn milestone(&self, milestone_id: &str) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|milestone| milestone.id == milestone_id)
    }

    pub fn milestone_mut(&mut self, milestone_id: &str) -> Option<&mut Milestone> {
        self.milestones
            .iter_mut()
            .find(|milestone| milestone.id == milestone_id)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_completed()).count()
    }

    /// Progress implied by the task list, `None` when the goal has no tasks.
    pub fn derived_progress(&self) -> Option<u8> {
        progress_for(self.completed_count(), self.tasks.len())
    }

    /// Recompute `progress` from the tasks. Goals without tasks keep the
    /// caller-supplied value.
    pub fn recompute_progress(&mut self) -> u8 {
        if let Some(progress) = self.derived_progress() {
            self.progress = progress;
        }
        self.progress
    }

    pub fn progress_is_consistent(&self) -> bool {
        self.derived_progress()
            .map(|expected| expected == self.progress)
            .unwrap_or(true)
    }
}

/// `round(100 * completed / total)`, rounding halves up.
pub fn progress_for(completed: usize, total: usize) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    let rounded = (200 * completed + total) / (2 * total);
    Some(rounded as u8)
}

/// Location of a task inside a [`Journey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPosition {
    pub goal: usize,
    pub task: usize,
}

/// The whole in-memory graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Journey {
    pub current_goals: Vec<Goal>,
}

impl Journey {
    pub fn new(current_goals: Vec<Goal>) -> Self {
        Self { current_goals }
    }

    pub fn goal(&self, goal_id: &str) -> Option<&Goal> {
        self.current_goals.iter().find(|goal| goal.id == goal_id)
    }

    pub fn goal_mut(&mut self, goal_id: &str) -> Option<&mut Goal> {
        self.current_goals.iter_mut().find(|goal| goal.id == goal_id)
    }

    /// First task with `task_id`, searching goals in order.
    pub fn locate_task(&self, task_id: &str) -> Option<TaskPosition> {
        self.current_goals
            .iter()
            .enumerate()
            .find_map(|(goal_idx, goal)| {
                goal.tasks
                    .iter()
                    .position(|task| task.id == task_id)
                    .map(|task_idx| TaskPosition {
                        goal: goal_idx,
                        task: task_idx,
                    })
            })
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.locate_task(task_id)
            .map(|pos| &self.current_goals[pos.goal].tasks[pos.task])
    }

    /// All tasks across goals, in goal order then task order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.current_goals.iter().flat_map(|goal| goal.tasks.iter())
    }

    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
