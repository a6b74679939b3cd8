//! Read-only views: board, list and calendar.

use chrono::NaiveDate;
use serde::Serialize;

use super::CommandContext;
use crate::error::{Error, Result};
use crate::model::Journey;
use crate::normalize::normalize_journey;
use crate::output::{emit_success, task_line, TextReport};
use crate::projection::{self, CalendarDay, ListEntry, SessionBoard};
use crate::session::StatusSessionResolver;
use crate::status::TaskStatus;
use crate::store::JourneyStore;

pub struct BoardOptions {
    pub goal: Option<String>,
    pub milestone: Option<String>,
}

pub struct ListOptions {
    pub goal: Option<String>,
    pub status: Option<String>,
}

pub struct CalendarOptions {
    pub date: String,
    pub days: u32,
}

#[derive(Serialize)]
struct BoardReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    goal: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone: Option<&'a str>,
    total: usize,
    board: SessionBoard<'a>,
}

#[derive(Serialize)]
struct ListReport<'a> {
    total: usize,
    tasks: Vec<ListEntry<'a>>,
}

#[derive(Serialize)]
struct CalendarReport<'a> {
    start: NaiveDate,
    days: Vec<CalendarDay<'a>>,
}

pub(crate) async fn load_journey(ctx: &CommandContext) -> Result<Journey> {
    let document = ctx.store().get_journey().await?;
    Ok(normalize_journey(&document))
}

pub async fn run_board(ctx: &CommandContext, options: BoardOptions) -> Result<()> {
    let journey = load_journey(ctx).await?;
    let matching = ctx.config.projection.milestone_match();

    let board = match options.goal.as_deref() {
        Some(goal_id) => {
            let goal = journey
                .goal(goal_id)
                .ok_or_else(|| Error::GoalNotFound(goal_id.to_string()))?;
            if let Some(milestone_id) = options.milestone.as_deref() {
                if goal.milestone(milestone_id).is_none() {
                    return Err(Error::MilestoneNotFound {
                        goal: goal_id.to_string(),
                        milestone: milestone_id.to_string(),
                    });
                }
            }
            projection::goal_board(goal, options.milestone.as_deref(), matching)
        }
        None => projection::group_by_status(journey.tasks()),
    };

    let resolver = StatusSessionResolver::new(&journey);
    let report = BoardReport {
        goal: options.goal.as_deref(),
        milestone: options.milestone.as_deref(),
        total: board.len(),
        board: board.with_sessions(&resolver),
    };

    let mut text = TextReport::new(match options.goal.as_deref() {
        Some(goal) => format!("journey board: {goal}"),
        None => "journey board".to_string(),
    });
    if let Some(milestone) = options.milestone.as_deref() {
        text.fact("milestone", milestone);
    }
    text.fact("tasks", report.total).board(&report.board);
    if report.total == 0 {
        text.warn("no tasks to show");
    }

    emit_success(ctx.output, "board", &report, &text)
}

pub async fn run_list(ctx: &CommandContext, options: ListOptions) -> Result<()> {
    let journey = load_journey(ctx).await?;
    let status = options
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    if let Some(goal_id) = options.goal.as_deref() {
        if journey.goal(goal_id).is_none() {
            return Err(Error::GoalNotFound(goal_id.to_string()));
        }
    }

    let tasks: Vec<ListEntry<'_>> = projection::list_tasks(&journey, status)
        .into_iter()
        .filter(|entry| {
            options
                .goal
                .as_deref()
                .map(|goal_id| entry.goal_id == goal_id)
                .unwrap_or(true)
        })
        .collect();
    let report = ListReport {
        total: tasks.len(),
        tasks,
    };

    let mut text = TextReport::new("journey list");
    text.fact("tasks", report.total);
    for entry in &report.tasks {
        text.line(format!("{}  ({})", task_line(entry.task), entry.goal_title));
    }

    emit_success(ctx.output, "list", &report, &text)
}

pub async fn run_calendar(ctx: &CommandContext, options: CalendarOptions) -> Result<()> {
    let start = NaiveDate::parse_from_str(options.date.trim(), "%Y-%m-%d").map_err(|_| {
        Error::InvalidArgument(format!(
            "invalid date '{}' (expected YYYY-MM-DD)",
            options.date
        ))
    })?;
    if options.days == 0 || options.days > 366 {
        return Err(Error::InvalidArgument(
            "--days must be between 1 and 366".to_string(),
        ));
    }
    let offset = ctx.offset()?;
    let journey = load_journey(ctx).await?;

    let report = CalendarReport {
        start,
        days: projection::calendar_range(journey.tasks(), start, options.days, offset),
    };

    let due: usize = report.days.iter().map(|day| day.tasks.len()).sum();
    let mut text = TextReport::new(format!("journey calendar: {start}"));
    text.fact("days", report.days.len())
        .fact("due", due)
        .fact("utc offset", offset)
        .calendar(&report.days);

    emit_success(ctx.output, "calendar", &report, &text)
}
