//! Goal-level commands: progress, goal add and normalize.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::view::load_journey;
use super::CommandContext;
use crate::coordinator::TransitionOutcome;
use crate::decompose::{adopt_decomposition, DecompositionRequest, PreparedDecomposition};
use crate::error::{Error, Result};
use crate::normalize::normalize_journey;
use crate::output::{emit_success, progress_bar, TextReport};
use crate::projection::{summarize_goal, GoalSummary};
use crate::store::{merge_goals, JourneyStore};

pub struct ProgressOptions {
    pub goal: Option<String>,
    pub recompute: bool,
}

pub struct AddOptions {
    pub file: PathBuf,
}

pub struct NormalizeOptions {
    pub dry_run: bool,
}

#[derive(Serialize)]
struct ProgressReport<'a> {
    goals: Vec<GoalSummary<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recomputed: Vec<String>,
}

#[derive(Serialize)]
struct NormalizeReport {
    goals: usize,
    tasks: usize,
    written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<Value>,
}

pub async fn run_progress(ctx: &CommandContext, options: ProgressOptions) -> Result<()> {
    let mut recomputed = Vec::new();
    let journey = if options.recompute {
        let coordinator = ctx.coordinator().await?;
        let goal_ids: Vec<String> = coordinator.with_journey(|journey| {
            journey
                .current_goals
                .iter()
                .filter(|goal| options.goal.as_deref().map(|id| goal.id == id).unwrap_or(true))
                .map(|goal| goal.id.clone())
                .collect()
        });
        for goal_id in goal_ids {
            match coordinator.recompute_progress(&goal_id).await {
                TransitionOutcome::Applied => recomputed.push(goal_id),
                TransitionOutcome::Reverted { reason, .. } => {
                    return Err(Error::WriteReverted(reason))
                }
                _ => {}
            }
        }
        coordinator.snapshot()
    } else {
        load_journey(ctx).await?
    };

    if let Some(goal_id) = options.goal.as_deref() {
        if journey.goal(goal_id).is_none() {
            return Err(Error::GoalNotFound(goal_id.to_string()));
        }
    }

    let goals: Vec<GoalSummary<'_>> = journey
        .current_goals
        .iter()
        .filter(|goal| options.goal.as_deref().map(|id| goal.id == id).unwrap_or(true))
        .map(summarize_goal)
        .collect();

    let mut text = TextReport::new("journey progress");
    for summary in &goals {
        text.line(format!(
            "{}  {}/{} tasks  {}",
            progress_bar(summary.progress),
            summary.counts.completed,
            summary.total_tasks,
            summary.title
        ));
        if !summary.progress_consistent {
            text.warn(format!(
                "{}: stored progress {}% does not match tasks",
                summary.goal_id, summary.progress
            ));
        }
    }
    for goal_id in &recomputed {
        text.fact("recomputed", goal_id);
    }
    if goals.iter().any(|summary| !summary.progress_consistent) {
        text.suggest("journey progress --recompute");
    }

    let report = ProgressReport { goals, recomputed };
    emit_success(ctx.output, "progress", &report, &text)
}

pub async fn run_add(ctx: &CommandContext, options: AddOptions) -> Result<()> {
    let raw = read_goal_file(&options.file)?;
    let request = DecompositionRequest {
        description: raw
            .get("description")
            .or_else(|| raw.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        timeframe: raw
            .get("target_completion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        category: raw
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        blueprint_context: Value::Null,
    };
    let coordinator = ctx.coordinator().await?;
    let adoption =
        adopt_decomposition(&coordinator, &PreparedDecomposition::new(raw), &request).await?;

    match &adoption.outcome {
        TransitionOutcome::Reverted { reason, .. } => {
            return Err(Error::WriteReverted(reason.clone()))
        }
        TransitionOutcome::Detached => {
            return Err(Error::OperationFailed(
                "journey engine detached before the write settled".to_string(),
            ))
        }
        _ => {}
    }

    let mut text = TextReport::new(format!("journey goal add: {}", adoption.goal_id));
    text.fact("tasks", adoption.tasks)
        .fact("milestones", adoption.milestones)
        .outcome(&adoption.outcome)
        .suggest(format!("journey board --goal {}", adoption.goal_id));
    if adoption.outcome == TransitionOutcome::Unchanged {
        text.warn("a goal with this id already exists; nothing added");
    }

    emit_success(ctx.output, "goal add", &adoption, &text)
}

fn read_goal_file(path: &Path) -> Result<Value> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    let value: Value = serde_json::from_str(&content).map_err(|err| {
        Error::InvalidArgument(format!("{}: invalid goal JSON: {err}", path.display()))
    })?;
    Ok(value)
}

pub async fn run_normalize(ctx: &CommandContext, options: NormalizeOptions) -> Result<()> {
    let store = ctx.store();
    let document = store.get_journey().await?;
    let journey = normalize_journey(&document);
    let goals = journey.current_goals.len();
    let tasks = journey.tasks().count();

    let report = if options.dry_run {
        let mut canonical = document.clone();
        merge_goals(&mut canonical, &journey)?;
        NormalizeReport {
            goals,
            tasks,
            written: false,
            document: Some(canonical),
        }
    } else {
        store.update_journey(&journey).await?;
        tracing::info!(goals, tasks, path = %store.path().display(), "journey normalized");
        NormalizeReport {
            goals,
            tasks,
            written: true,
            document: None,
        }
    };

    let mut text = TextReport::new("journey normalize");
    text.fact("goals", goals)
        .fact("tasks", tasks)
        .fact("written", report.written);
    if let Some(document) = &report.document {
        text.line(serde_json::to_string_pretty(document)?);
    }

    emit_success(ctx.output, "normalize", &report, &text)
}
