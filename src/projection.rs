//! Read-only views over the canonical journey graph.
//!
//! Every projection borrows tasks from the graph it was computed from and
//! never clones them, so the board, the list and the calendar cannot drift
//! apart after a mutation: recompute them from the same [`Journey`] instead.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::Serialize;

use crate::model::{Goal, Journey, Milestone, Task};
use crate::session::{resolve_session, SessionResolver, SessionType};
use crate::status::TaskStatus;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMAT: &str = "%Y-%m-%d";

// =========================================================================
// Milestone scope
// =========================================================================

/// How tasks are attached to a milestone when scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneMatch {
    /// Only tasks whose `milestone_id` equals the milestone id.
    Strict,
    /// Strict matching, plus the legacy heuristic: a task without a
    /// `milestone_id` whose title contains the first word of the milestone
    /// title is included too.
    KeywordFallback,
}

impl MilestoneMatch {
    pub fn from_flag(keyword_fallback: bool) -> Self {
        if keyword_fallback {
            MilestoneMatch::KeywordFallback
        } else {
            MilestoneMatch::Strict
        }
    }
}

/// Restrict `tasks` to one milestone. No milestone means no filtering.
pub fn scope_tasks<'a, I>(
    tasks: I,
    milestone: Option<&Milestone>,
    matching: MilestoneMatch,
) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let Some(milestone) = milestone else {
        return tasks.into_iter().collect();
    };
    let keyword = match matching {
        MilestoneMatch::Strict => None,
        MilestoneMatch::KeywordFallback => milestone_keyword(&milestone.title),
    };
    tasks
        .into_iter()
        .filter(|task| match task.milestone_id.as_deref() {
            Some(id) => id == milestone.id,
            None => keyword
                .as_deref()
                .map(|keyword| task.title.to_lowercase().contains(keyword))
                .unwrap_or(false),
        })
        .collect()
}

fn milestone_keyword(title: &str) -> Option<String> {
    title
        .split_whitespace()
        .next()
        .map(|word| word.to_lowercase())
}

// =========================================================================
// Kanban
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct KanbanColumn<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
}

/// Tasks partitioned into the four status columns, in [`TaskStatus::ALL`]
/// order. Within a column tasks keep their source order.
#[derive(Debug, Clone, Serialize)]
pub struct KanbanBoard<'a> {
    pub columns: [KanbanColumn<'a>; 4],
}

impl<'a> KanbanBoard<'a> {
    pub fn column(&self, status: TaskStatus) -> &KanbanColumn<'a> {
        &self.columns[status.column_index()]
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(|column| column.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a resolved session to every card.
    pub fn with_sessions(&self, resolver: &dyn SessionResolver) -> SessionBoard<'a> {
        let columns = self
            .columns
            .iter()
            .map(|column| SessionColumn {
                status: column.status,
                cards: column
                    .tasks
                    .iter()
                    .map(|&task| TaskCard {
                        task,
                        session: resolve_session(resolver, task),
                    })
                    .collect(),
            })
            .collect();
        SessionBoard { columns }
    }
}

pub fn group_by_status<'a, I>(tasks: I) -> KanbanBoard<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut columns = TaskStatus::ALL.map(|status| KanbanColumn {
        status,
        tasks: Vec::new(),
    });
    for task in tasks {
        columns[task.status().column_index()].tasks.push(task);
    }
    KanbanBoard { columns }
}

/// Board for one goal, optionally scoped to one of its milestones.
pub fn goal_board<'a>(
    goal: &'a Goal,
    milestone_id: Option<&str>,
    matching: MilestoneMatch,
) -> KanbanBoard<'a> {
    let milestone = milestone_id.and_then(|id| goal.milestone(id));
    if milestone_id.is_some() && milestone.is_none() {
        tracing::debug!(goal_id = %goal.id, milestone_id = ?milestone_id, "milestone not found; board is empty");
        return group_by_status(std::iter::empty());
    }
    group_by_status(scope_tasks(&goal.tasks, milestone, matching))
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskCard<'a> {
    pub task: &'a Task,
    pub session: SessionType,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionColumn<'a> {
    pub status: TaskStatus,
    pub cards: Vec<TaskCard<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionBoard<'a> {
    pub columns: Vec<SessionColumn<'a>>,
}

// =========================================================================
// Flat list
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry<'a> {
    pub goal_id: &'a str,
    pub goal_title: &'a str,
    pub task: &'a Task,
}

/// Every task across goals, optionally restricted to one status.
pub fn list_tasks(journey: &Journey, status: Option<TaskStatus>) -> Vec<ListEntry<'_>> {
    journey
        .current_goals
        .iter()
        .flat_map(|goal| {
            goal.tasks.iter().map(move |task| ListEntry {
                goal_id: goal.id.as_str(),
                goal_title: goal.title.as_str(),
                task,
            })
        })
        .filter(|entry| status.map(|s| entry.task.status() == s).unwrap_or(true))
        .collect()
}

// =========================================================================
// Calendar
// =========================================================================

/// Parse a stored due date. Returns `None` for anything unparsable.
///
/// Accepts RFC 3339 timestamps, naive date-times (read in `offset`) and bare
/// `YYYY-MM-DD` dates (midnight in `offset`).
pub fn parse_due_date(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&offset));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return offset.from_local_datetime(&naive).single();
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| offset.from_local_datetime(&naive).single())
}

/// Inclusive `[startOfDay, endOfDay]` of `day` in `offset`.
pub fn day_bounds(
    day: NaiveDate,
    offset: FixedOffset,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let start = offset
        .from_local_datetime(&day.and_hms_opt(0, 0, 0)?)
        .single()?;
    let end = offset
        .from_local_datetime(&day.and_hms_milli_opt(23, 59, 59, 999)?)
        .single()?;
    Some((start, end))
}

pub fn tasks_due_on<'a, I>(tasks: I, day: NaiveDate, offset: FixedOffset) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let Some((start, end)) = day_bounds(day, offset) else {
        return Vec::new();
    };
    tasks
        .into_iter()
        .filter(|task| {
            task.due_date
                .as_deref()
                .and_then(|raw| parse_due_date(raw, offset))
                .map(|due| due >= start && due <= end)
                .unwrap_or(false)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<&'a Task>,
}

/// One bucket per day for `days` consecutive days starting at `start`.
/// Tasks due outside the span, or with no usable due date, are left out.
pub fn calendar_range<'a, I>(
    tasks: I,
    start: NaiveDate,
    days: u32,
    offset: FixedOffset,
) -> Vec<CalendarDay<'a>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut buckets: BTreeMap<NaiveDate, Vec<&'a Task>> = start
        .iter_days()
        .take(days as usize)
        .map(|date| (date, Vec::new()))
        .collect();
    for task in tasks {
        let Some(due) = task
            .due_date
            .as_deref()
            .and_then(|raw| parse_due_date(raw, offset))
        else {
            continue;
        };
        if let Some(bucket) = buckets.get_mut(&due.date_naive()) {
            bucket.push(task);
        }
    }
    buckets
        .into_iter()
        .map(|(date, tasks)| CalendarDay { date, tasks })
        .collect()
}

// =========================================================================
// Goal summaries
// =========================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub todo: usize,
    pub in_progress: usize,
    pub stuck: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Todo => self.todo,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Stuck => self.stuck,
            TaskStatus::Completed => self.completed,
        }
    }

    fn bump(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Stuck => self.stuck += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalSummary<'a> {
    pub goal_id: &'a str,
    pub title: &'a str,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_progress: Option<u8>,
    pub progress_consistent: bool,
    pub total_tasks: usize,
    pub milestones_completed: usize,
    pub milestones_total: usize,
    pub counts: StatusCounts,
}

pub fn summarize_goal(goal: &Goal) -> GoalSummary<'_> {
    let mut counts = StatusCounts::default();
    for task in &goal.tasks {
        counts.bump(task.status());
    }
    GoalSummary {
        goal_id: &goal.id,
        title: &goal.title,
        progress: goal.progress,
        derived_progress: goal.derived_progress(),
        progress_consistent: goal.progress_is_consistent(),
        total_tasks: goal.tasks.len(),
        milestones_completed: goal.milestones.iter().filter(|m| m.completed).count(),
        milestones_total: goal.milestones.len(),
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("utc")
    }

    fn milestone(id: &str, title: &str) -> Milestone {
        Milestone {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            target_date: String::new(),
            completed: false,
            completion_criteria: Vec::new(),
            extra: Map::new(),
        }
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        Task::new(id, "g1", status)
    }

    #[test]
    fn kanban_keeps_source_order_within_columns() {
        let tasks = vec![
            task("a", TaskStatus::Todo),
            task("b", TaskStatus::Completed),
            task("c", TaskStatus::Todo),
            task("d", TaskStatus::Stuck),
        ];
        let board = group_by_status(&tasks);
        let todo: Vec<&str> = board
            .column(TaskStatus::Todo)
            .tasks
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(todo, vec!["a", "c"]);
        assert_eq!(board.column(TaskStatus::InProgress).tasks.len(), 0);
        assert_eq!(board.len(), 4);
    }

    #[test]
    fn kanban_borrows_rather_than_clones() {
        let tasks = vec![task("a", TaskStatus::Todo)];
        let board = group_by_status(&tasks);
        assert!(std::ptr::eq(board.column(TaskStatus::Todo).tasks[0], &tasks[0]));
    }

    #[test]
    fn scope_without_milestone_is_identity() {
        let tasks = vec![task("a", TaskStatus::Todo), task("b", TaskStatus::Todo)];
        assert_eq!(scope_tasks(&tasks, None, MilestoneMatch::Strict).len(), 2);
    }

    #[test]
    fn keyword_fallback_only_applies_to_unassigned_tasks() {
        let target = milestone("m1", "Research phase");
        let mut assigned = task("a", TaskStatus::Todo);
        assigned.milestone_id = Some("m1".to_string());
        let mut other = task("b", TaskStatus::Todo).with_title("Research competitors");
        other.milestone_id = Some("m2".to_string());
        let loose = task("c", TaskStatus::Todo).with_title("Do RESEARCH on pricing");
        let unrelated = task("d", TaskStatus::Todo).with_title("Write copy");
        let tasks = vec![assigned, other, loose, unrelated];

        let strict: Vec<&str> = scope_tasks(&tasks, Some(&target), MilestoneMatch::Strict)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(strict, vec!["a"]);

        let fallback: Vec<&str> =
            scope_tasks(&tasks, Some(&target), MilestoneMatch::KeywordFallback)
                .iter()
                .map(|t| t.id.as_str())
                .collect();
        assert_eq!(fallback, vec!["a", "c"]);
    }

    #[test]
    fn empty_milestone_title_never_keyword_matches() {
        let target = milestone("m1", "   ");
        let tasks = vec![task("a", TaskStatus::Todo)];
        assert!(scope_tasks(&tasks, Some(&target), MilestoneMatch::KeywordFallback).is_empty());
    }

    #[test]
    fn calendar_puts_task_on_its_day_only() {
        let mut due = task("a", TaskStatus::Todo);
        due.due_date = Some("2024-03-15T10:00:00Z".to_string());
        let mut garbage = task("b", TaskStatus::Todo);
        garbage.due_date = Some("not-a-date".to_string());
        let tasks = vec![due, garbage, task("c", TaskStatus::Todo)];

        let day = NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");
        let hits = tasks_due_on(&tasks, day, utc());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        for other in [day.pred_opt().expect("prev"), day.succ_opt().expect("next")] {
            assert!(tasks_due_on(&tasks, other, utc()).is_empty());
        }
    }

    #[test]
    fn calendar_respects_offset() {
        let mut late = task("a", TaskStatus::Todo);
        late.due_date = Some("2024-03-15T23:30:00Z".to_string());
        let tasks = vec![late];
        let plus_two = FixedOffset::east_opt(2 * 3600).expect("offset");
        let next_day = NaiveDate::from_ymd_opt(2024, 3, 16).expect("date");
        assert_eq!(tasks_due_on(&tasks, next_day, plus_two).len(), 1);
    }

    #[test]
    fn parse_due_date_accepts_supported_shapes() {
        assert!(parse_due_date("2024-03-15", utc()).is_some());
        assert!(parse_due_date("2024-03-15T08:30:00", utc()).is_some());
        assert!(parse_due_date("2024-03-15T08:30:00.000+05:00", utc()).is_some());
        assert!(parse_due_date("15/03/2024", utc()).is_none());
        assert!(parse_due_date("", utc()).is_none());
    }

    #[test]
    fn calendar_range_builds_empty_buckets_too() {
        let mut due = task("a", TaskStatus::Todo);
        due.due_date = Some("2024-03-16".to_string());
        let tasks = vec![due];
        let start = NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");
        let days = calendar_range(&tasks, start, 3, utc());
        assert_eq!(days.len(), 3);
        assert!(days[0].tasks.is_empty());
        assert_eq!(days[1].tasks.len(), 1);
        assert!(days[2].tasks.is_empty());
    }

    #[test]
    fn summary_counts_statuses() {
        let mut goal = Goal::new("g1", "Goal");
        goal.tasks = vec![
            task("a", TaskStatus::Todo),
            task("b", TaskStatus::Completed),
            task("c", TaskStatus::Completed),
        ];
        goal.progress = 10;
        let summary = summarize_goal(&goal);
        assert_eq!(summary.counts.completed, 2);
        assert_eq!(summary.counts.get(TaskStatus::Todo), 1);
        assert_eq!(summary.derived_progress, Some(67));
        assert!(!summary.progress_consistent);
    }

    #[test]
    fn list_filters_by_status_and_carries_goal() {
        let mut goal = Goal::new("g1", "Fitness");
        goal.tasks = vec![task("a", TaskStatus::Todo), task("b", TaskStatus::Stuck)];
        let journey = Journey::new(vec![goal]);
        let stuck = list_tasks(&journey, Some(TaskStatus::Stuck));
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].goal_title, "Fitness");
        assert_eq!(list_tasks(&journey, None).len(), 2);
    }
}
