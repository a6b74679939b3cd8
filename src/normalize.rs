//! Normalization of loosely-typed journey documents.
//!
//! Every field has a total default, so these functions never fail. They
//! must run on every read of the stored document; nothing here caches.

use std::collections::{BTreeSet, HashSet};

use serde_json::{Map, Value};

use crate::model::{
    EnergyLevel, Goal, Journey, Milestone, Task, DEFAULT_ESTIMATED_DURATION,
    DEFAULT_TASK_CATEGORY, DEFAULT_TASK_TITLE, DEFAULT_TIME_OF_DAY,
};
use crate::status::TaskStatus;

pub const DEFAULT_GOAL_TITLE: &str = "Untitled Goal";
pub const DEFAULT_GOAL_CATEGORY: &str = "general";

const GOAL_FIELDS: [&str; 9] = [
    "id",
    "title",
    "description",
    "category",
    "progress",
    "target_completion",
    "milestones",
    "tasks",
    "blueprint_alignment",
];

const MILESTONE_FIELDS: [&str; 6] = [
    "id",
    "title",
    "description",
    "target_date",
    "completed",
    "completion_criteria",
];

const TASK_FIELDS: [&str; 12] = [
    "id",
    "title",
    "description",
    "status",
    "completed",
    "due_date",
    "estimated_duration",
    "energy_level_required",
    "category",
    "optimal_time_of_day",
    "goal_id",
    "milestone_id",
];

/// Normalize a `{ current_goals: [...] }` document.
pub fn normalize_journey(document: &Value) -> Journey {
    let goals = document
        .get("current_goals")
        .and_then(Value::as_array)
        .map(|raw_goals| {
            raw_goals
                .iter()
                .enumerate()
                .map(|(index, raw)| normalize_goal(raw, index))
                .collect()
        })
        .unwrap_or_default();
    Journey::new(goals)
}

/// Normalize one goal. `index` is its position in `current_goals` and only
/// matters when the goal carries no id of its own.
pub fn normalize_goal(raw: &Value, index: usize) -> Goal {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    let goal_id = id_field(obj, "id").unwrap_or_else(|| format!("goal-{index}"));

    let milestones: Vec<Milestone> = obj
        .get("milestones")
        .and_then(Value::as_array)
        .map(|raw_milestones| {
            raw_milestones
                .iter()
                .enumerate()
                .map(|(idx, raw)| normalize_milestone(raw, &goal_id, idx))
                .collect()
        })
        .unwrap_or_default();

    let mut tasks = normalize_tasks(raw, &goal_id);
    let milestone_ids: HashSet<&str> = milestones.iter().map(|m| m.id.as_str()).collect();
    for task in &mut tasks {
        let dangling = task
            .milestone_id
            .as_deref()
            .map(|id| !milestone_ids.contains(id))
            .unwrap_or(false);
        if dangling {
            tracing::debug!(
                task_id = %task.id,
                goal_id = %goal_id,
                milestone_id = ?task.milestone_id,
                "dropping milestone reference that does not resolve"
            );
            task.milestone_id = None;
        }
    }

    Goal {
        id: goal_id,
        title: text_field(obj, "title").unwrap_or_else(|| DEFAULT_GOAL_TITLE.to_string()),
        description: text_field(obj, "description").unwrap_or_default(),
        category: text_field(obj, "category")
            .unwrap_or_else(|| DEFAULT_GOAL_CATEGORY.to_string()),
        progress: progress_field(obj.get("progress")),
        target_completion: text_field(obj, "target_completion").unwrap_or_default(),
        milestones,
        tasks,
        blueprint_alignment: string_set(obj.get("blueprint_alignment")).unwrap_or_default(),
        extra: extra_fields(obj, &GOAL_FIELDS),
    }
}

/// Canonical tasks of a raw goal, each stamped with `goal_id`.
///
/// Stored task ids are always kept. Missing ids are `{goal_id}-{index}`,
/// so repeated passes over the same document yield the same ids and tasks of
/// different goals never share a synthesized id.
pub fn normalize_tasks(raw_goal: &Value, goal_id: &str) -> Vec<Task> {
    raw_goal
        .get("tasks")
        .and_then(Value::as_array)
        .map(|raw_tasks| {
            raw_tasks
                .iter()
                .enumerate()
                .map(|(index, raw)| normalize_task(raw, goal_id, index))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_task(raw: &Value, goal_id: &str, index: usize) -> Task {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let status = if bool_field(obj.get("completed")) {
        TaskStatus::Completed
    } else {
        obj.get("status")
            .and_then(Value::as_str)
            .and_then(TaskStatus::parse_loose)
            .unwrap_or(TaskStatus::Todo)
    };
    let id = id_field(obj, "id").unwrap_or_else(|| format!("{goal_id}-{index}"));

    let mut task = Task::new(id, goal_id, status);
    task.title = text_field(obj, "title").unwrap_or_else(|| DEFAULT_TASK_TITLE.to_string());
    task.description = text_field(obj, "description").unwrap_or_default();
    task.due_date = text_field(obj, "due_date");
    task.estimated_duration = text_field(obj, "estimated_duration")
        .unwrap_or_else(|| DEFAULT_ESTIMATED_DURATION.to_string());
    task.energy_level_required = obj
        .get("energy_level_required")
        .and_then(Value::as_str)
        .and_then(EnergyLevel::parse_loose)
        .unwrap_or_default();
    task.category =
        text_field(obj, "category").unwrap_or_else(|| DEFAULT_TASK_CATEGORY.to_string());
    task.optimal_time_of_day = string_set(obj.get("optimal_time_of_day"))
        .unwrap_or_else(|| BTreeSet::from([DEFAULT_TIME_OF_DAY.to_string()]));
    task.milestone_id = id_field(obj, "milestone_id");
    task.extra = extra_fields(obj, &TASK_FIELDS);
    task
}

fn normalize_milestone(raw: &Value, goal_id: &str, index: usize) -> Milestone {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    Milestone {
        id: id_field(obj, "id").unwrap_or_else(|| format!("{goal_id}-milestone-{index}")),
        title: text_field(obj, "title").unwrap_or_default(),
        description: text_field(obj, "description").unwrap_or_default(),
        target_date: text_field(obj, "target_date").unwrap_or_default(),
        completed: bool_field(obj.get("completed")),
        completion_criteria: obj
            .get("completion_criteria")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        extra: extra_fields(obj, &MILESTONE_FIELDS),
    }
}

/// Ids may arrive as strings or numbers; blank strings count as missing.
fn id_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

fn bool_field(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn progress_field(value: Option<&Value>) -> u8 {
    value
        .and_then(Value::as_f64)
        .filter(|number| number.is_finite())
        .map(|number| number.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

/// `None` when the value is not an array.
fn string_set(value: Option<&Value>) -> Option<BTreeSet<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn extra_fields(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_task_gets_every_default() {
        let raw = json!({ "id": "g1", "tasks": [{}] });
        let tasks = normalize_tasks(&raw, "g1");
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.id, "g1-0");
        assert_eq!(task.title, DEFAULT_TASK_TITLE);
        assert_eq!(task.description, "");
        assert_eq!(task.status(), TaskStatus::Todo);
        assert!(!task.is_completed());
        assert_eq!(task.estimated_duration, "30 min");
        assert_eq!(task.energy_level_required, EnergyLevel::Medium);
        assert_eq!(task.category, "execution");
        assert_eq!(
            task.optimal_time_of_day,
            BTreeSet::from(["morning".to_string()])
        );
        assert_eq!(task.goal_id, "g1");
        assert!(task.due_date.is_none());
    }

    #[test]
    fn completed_flag_wins_over_status() {
        let raw = json!({ "id": "g1", "tasks": [
            { "id": "a", "status": "in_progress", "completed": true },
            { "id": "b", "status": "stuck", "completed": false },
            { "id": "c", "status": "completed" },
        ]});
        let tasks = normalize_tasks(&raw, "g1");
        assert_eq!(tasks[0].status(), TaskStatus::Completed);
        assert!(tasks[0].is_completed());
        assert_eq!(tasks[1].status(), TaskStatus::Stuck);
        assert_eq!(tasks[2].status(), TaskStatus::Completed);
        assert!(tasks[2].is_completed());
    }

    #[test]
    fn synthesized_ids_use_the_resolved_goal_id() {
        let raw = json!({ "tasks": [{ "title": "one" }, { "id": "kept" }] });
        let tasks = normalize_tasks(&raw, "goal-3");
        assert_eq!(tasks[0].id, "goal-3-0");
        assert_eq!(tasks[1].id, "kept");
        assert_eq!(tasks[0].goal_id, "goal-3");
    }

    #[test]
    fn non_array_time_of_day_defaults_to_morning() {
        let raw = json!({ "id": "g", "tasks": [
            { "optimal_time_of_day": "evening" },
            { "optimal_time_of_day": ["evening", "evening", "night"] },
        ]});
        let tasks = normalize_tasks(&raw, "g");
        assert_eq!(tasks[0].optimal_time_of_day, BTreeSet::from(["morning".to_string()]));
        assert_eq!(
            tasks[1].optimal_time_of_day,
            BTreeSet::from(["evening".to_string(), "night".to_string()])
        );
    }

    #[test]
    fn dangling_milestone_reference_is_dropped() {
        let raw = json!({
            "id": "g1",
            "milestones": [{ "id": "m1", "title": "Base" }],
            "tasks": [
                { "id": "a", "milestone_id": "m1" },
                { "id": "b", "milestone_id": "gone" },
            ],
        });
        let goal = normalize_goal(&raw, 0);
        assert_eq!(goal.tasks[0].milestone_id.as_deref(), Some("m1"));
        assert!(goal.tasks[1].milestone_id.is_none());
    }

    #[test]
    fn goal_defaults_and_unknown_fields_survive() {
        let raw = json!({
            "progress": 140.2,
            "created_at": "2024-01-01",
            "milestones": [{}],
        });
        let goal = normalize_goal(&raw, 2);
        assert_eq!(goal.id, "goal-2");
        assert_eq!(goal.title, DEFAULT_GOAL_TITLE);
        assert_eq!(goal.progress, 100);
        assert_eq!(goal.milestones[0].id, "goal-2-milestone-0");
        assert_eq!(goal.extra.get("created_at"), Some(&json!("2024-01-01")));
    }

    #[test]
    fn garbage_document_yields_empty_journey() {
        assert!(normalize_journey(&json!("nope")).current_goals.is_empty());
        assert!(normalize_journey(&json!({ "current_goals": 7 })).current_goals.is_empty());
        let journey = normalize_journey(&json!({ "current_goals": [null, 3] }));
        assert_eq!(journey.current_goals.len(), 2);
        assert_eq!(journey.current_goals[1].id, "goal-1");
    }

    #[test]
    fn renormalizing_canonical_output_is_stable() {
        let raw = json!({ "current_goals": [{
            "id": "g1",
            "title": "Learn Rust",
            "milestones": [{ "id": "m1", "title": "Basics" }],
            "tasks": [
                { "title": "Read the book", "milestone_id": "m1", "extra": 1 },
                { "id": "t2", "completed": true, "due_date": "2024-03-15" },
            ],
        }]});
        let once = normalize_journey(&raw);
        let twice = normalize_journey(&once.to_document().expect("json"));
        assert_eq!(once, twice);
    }
}
