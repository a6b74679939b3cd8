//! Status-changing commands: move, drop and milestone toggles.

use serde::Serialize;

use super::CommandContext;
use crate::coordinator::{Coordinator, TransitionOutcome};
use crate::error::{Error, Result};
use crate::gesture::{map_gesture, parse_column_id, BoardGesture, TransitionCommand};
use crate::output::{emit_success, progress_bar, TextReport};
use crate::status::TaskStatus;
use crate::store::JourneyStore;

pub struct MoveOptions {
    pub task: String,
    pub status: String,
}

pub struct DropOptions {
    pub task: String,
    pub column: Option<String>,
}

pub struct MilestoneOptions {
    pub goal: String,
    pub milestone: String,
    pub completed: bool,
}

#[derive(Serialize)]
struct TransitionReport {
    task_id: String,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    #[serde(flatten)]
    outcome: TransitionOutcome,
}

#[derive(Serialize)]
struct DropReport {
    task_id: String,
    dispatched: bool,
}

#[derive(Serialize)]
struct MilestoneReport {
    goal_id: String,
    milestone_id: String,
    completed: bool,
    #[serde(flatten)]
    outcome: TransitionOutcome,
}

pub async fn run_move(ctx: &CommandContext, options: MoveOptions) -> Result<()> {
    let status: TaskStatus = options.status.parse()?;
    let coordinator = ctx.coordinator().await?;
    let command = TransitionCommand::new(options.task, status);
    apply_command(ctx, &coordinator, command, "move").await
}

pub async fn run_drop(ctx: &CommandContext, options: DropOptions) -> Result<()> {
    let gesture = BoardGesture::Drop {
        task_id: options.task.clone(),
        target: options.column.as_deref().and_then(parse_column_id),
    };
    let Some(command) = map_gesture(&gesture) else {
        tracing::debug!(task_id = %options.task, column = ?options.column, "drop outside any column");
        let mut text = TextReport::new(format!("journey drop: {}", options.task));
        text.fact("result", "released outside any column; nothing changed");
        let report = DropReport {
            task_id: options.task,
            dispatched: false,
        };
        return emit_success(ctx.output, "drop", &report, &text);
    };
    let coordinator = ctx.coordinator().await?;
    apply_command(ctx, &coordinator, command, "drop").await
}

async fn apply_command<S: JourneyStore>(
    ctx: &CommandContext,
    coordinator: &Coordinator<S>,
    command: TransitionCommand,
    name: &str,
) -> Result<()> {
    let outcome = coordinator.dispatch(command.clone()).await;
    let (goal_id, progress) = coordinator.with_journey(|journey| {
        journey
            .locate_task(&command.task_id)
            .map(|pos| {
                let goal = &journey.current_goals[pos.goal];
                (Some(goal.id.clone()), Some(goal.progress))
            })
            .unwrap_or((None, None))
    });

    match &outcome {
        TransitionOutcome::NotFound => return Err(Error::TaskNotFound(command.task_id)),
        TransitionOutcome::Reverted { reason, .. } => {
            return Err(Error::WriteReverted(reason.clone()))
        }
        TransitionOutcome::Detached => {
            return Err(Error::OperationFailed(
                "journey engine detached before the write settled".to_string(),
            ))
        }
        TransitionOutcome::Applied | TransitionOutcome::Unchanged => {}
    }

    let mut text = TextReport::new(format!(
        "journey {name}: {} -> {}",
        command.task_id, command.status
    ));
    text.outcome(&outcome);
    if let Some(goal_id) = &goal_id {
        text.fact("goal", goal_id)
            .suggest(format!("journey board --goal {goal_id}"));
    }
    if let Some(progress) = progress {
        text.fact("progress", progress_bar(progress));
    }

    let report = TransitionReport {
        task_id: command.task_id,
        status: command.status,
        goal_id,
        progress,
        outcome,
    };
    emit_success(ctx.output, name, &report, &text)
}

pub async fn run_milestone(ctx: &CommandContext, options: MilestoneOptions) -> Result<()> {
    let coordinator = ctx.coordinator().await?;
    let outcome = coordinator
        .set_milestone_completed(&options.goal, &options.milestone, options.completed)
        .await;
    let command = if options.completed {
        "milestone done"
    } else {
        "milestone undone"
    };

    match &outcome {
        TransitionOutcome::NotFound => {
            return Err(if coordinator.with_journey(|j| j.goal(&options.goal).is_none()) {
                Error::GoalNotFound(options.goal)
            } else {
                Error::MilestoneNotFound {
                    goal: options.goal,
                    milestone: options.milestone,
                }
            })
        }
        TransitionOutcome::Reverted { reason, .. } => {
            return Err(Error::WriteReverted(reason.clone()))
        }
        TransitionOutcome::Detached => {
            return Err(Error::OperationFailed(
                "journey engine detached before the write settled".to_string(),
            ))
        }
        TransitionOutcome::Applied | TransitionOutcome::Unchanged => {}
    }

    let mut text = TextReport::new(format!(
        "journey {command}: {}/{}",
        options.goal, options.milestone
    ));
    text.fact("completed", options.completed).outcome(&outcome);

    let report = MilestoneReport {
        goal_id: options.goal,
        milestone_id: options.milestone,
        completed: options.completed,
        outcome,
    };
    emit_success(ctx.output, command, &report, &text)
}
