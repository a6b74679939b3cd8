//! Terminal and JSON rendering for journey commands.
//!
//! Every command produces one [`TextReport`] for people and one serializable
//! payload for `--json`. The JSON form is wrapped in a versioned envelope
//! shared by successes and errors.

use std::fmt::Write as _;

use serde::Serialize;

use crate::coordinator::TransitionOutcome;
use crate::error::{Error, Result};
use crate::model::Task;
use crate::projection::{CalendarDay, SessionBoard};

pub const SCHEMA_VERSION: &str = "journey.v1";

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human-readable result of a command.
#[derive(Debug, Clone, Default)]
pub struct TextReport {
    title: String,
    facts: Vec<(String, String)>,
    body: Vec<String>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
}

impl TextReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn fact(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.facts.push((key.into(), value.to_string()));
        self
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.body.push(text.into());
        self
    }

    pub fn warn(&mut self, text: impl Into<String>) -> &mut Self {
        self.warnings.push(text.into());
        self
    }

    /// A follow-up command worth running next.
    pub fn suggest(&mut self, command: impl Into<String>) -> &mut Self {
        self.suggestions.push(command.into());
        self
    }

    /// One block per column, cards indented under their column.
    pub fn board(&mut self, board: &SessionBoard<'_>) -> &mut Self {
        for column in &board.columns {
            self.body
                .push(format!("{} ({})", column.status.label(), column.cards.len()));
            for card in &column.cards {
                self.body.push(format!(
                    "  {}  <{}>",
                    task_line(card.task),
                    card.session.as_str()
                ));
            }
        }
        self
    }

    pub fn calendar(&mut self, days: &[CalendarDay<'_>]) -> &mut Self {
        for day in days {
            if day.tasks.is_empty() {
                self.body.push(format!("{}  nothing due", day.date));
                continue;
            }
            self.body.push(day.date.to_string());
            for task in &day.tasks {
                self.body.push(format!("  {}", task_line(task)));
            }
        }
        self
    }

    pub fn outcome(&mut self, outcome: &TransitionOutcome) -> &mut Self {
        let text = match outcome {
            TransitionOutcome::Applied => "saved".to_string(),
            TransitionOutcome::Unchanged => "already set; nothing written".to_string(),
            TransitionOutcome::NotFound => "not found; nothing changed".to_string(),
            TransitionOutcome::Reverted { reason, restored } => {
                if *restored {
                    format!("store rejected the write ({reason}); change undone")
                } else {
                    format!("store rejected the write ({reason}); a newer change is pending")
                }
            }
            TransitionOutcome::Detached => "discarded after shutdown".to_string(),
        };
        self.fact("result", text)
    }

    pub fn render(&self) -> String {
        let mut out = self.title.clone();
        let width = self.facts.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in &self.facts {
            let _ = write!(out, "\n  {key:<width$}  {value}");
        }
        if !self.body.is_empty() {
            out.push('\n');
            for line in &self.body {
                let _ = write!(out, "\n{line}");
            }
        }
        if !self.warnings.is_empty() || !self.suggestions.is_empty() {
            out.push('\n');
        }
        for warning in &self.warnings {
            let _ = write!(out, "\nwarning: {warning}");
        }
        for command in &self.suggestions {
            let _ = write!(out, "\nnext: {command}");
        }
        out
    }
}

/// `id [status] title`
pub fn task_line(task: &Task) -> String {
    format!("{} [{}] {}", task.id, task.status(), task.title)
}

/// `[#####---------------]  25%`
pub fn progress_bar(progress: u8) -> String {
    let filled = usize::from(progress.min(100)) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {progress:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Body<'a, T: Serialize> {
    Success { data: &'a T },
    Error { error: ErrorBody },
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    #[serde(flatten)]
    body: Body<'a, T>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    text: &TextReport,
) -> Result<()> {
    if options.json {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            body: Body::Success { data },
            warnings: &text.warnings,
            next_steps: &text.suggestions,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if !options.quiet {
        println!("{}", text.render());
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        let envelope: Envelope<'_, ()> = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            body: Body::Error {
                error: ErrorBody {
                    message: err.to_string(),
                    code: err.exit_code(),
                    kind: error_kind(err),
                    details: err.details(),
                },
            },
            warnings: &[],
            next_steps: &next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    for step in &next_steps {
        eprintln!("hint: {step}");
    }
    Ok(())
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "write_reverted",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    let step = match err {
        Error::TaskNotFound(_) => "journey list".to_string(),
        Error::GoalNotFound(_) => "journey progress".to_string(),
        Error::MilestoneNotFound { goal, .. } => format!("journey board --goal {goal}"),
        Error::WriteReverted(_) => "retry once the journey store accepts writes".to_string(),
        Error::LockFailed(_) => "retry; another process holds the journey lock".to_string(),
        Error::InvalidConfig(_) => "fix .journey.toml then retry".to_string(),
        _ => return Vec::new(),
    };
    vec![step]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Journey;
    use crate::normalize::normalize_journey;
    use crate::projection::group_by_status;
    use crate::session::StatusSessionResolver;
    use serde_json::json;

    fn journey() -> Journey {
        normalize_journey(&json!({ "current_goals": [{
            "id": "g1",
            "tasks": [
                { "id": "t1", "title": "Write outline" },
                { "id": "t2", "title": "Book venue", "completed": true }
            ]
        }]}))
    }

    #[test]
    fn render_aligns_facts_and_skips_empty_parts() {
        let mut text = TextReport::new("journey move: t1 -> completed");
        text.fact("goal", "g1").fact("progress", progress_bar(100));
        text.suggest("journey board --goal g1");

        assert_eq!(
            text.render(),
            "journey move: t1 -> completed\n  goal      g1\n  progress  [####################] 100%\n\nnext: journey board --goal g1"
        );
    }

    #[test]
    fn board_lists_every_column_with_sessions() {
        let journey = journey();
        let resolver = StatusSessionResolver::new(&journey);
        let board = group_by_status(journey.tasks()).with_sessions(&resolver);

        let mut text = TextReport::new("journey board");
        text.board(&board);
        let rendered = text.render();
        assert!(rendered.contains("To Do (1)\n  t1 [todo] Write outline  <START_SESSION>"));
        assert!(rendered.contains("Stuck (0)"));
        assert!(rendered.contains("Completed (1)\n  t2 [completed] Book venue  <REVIEW_SESSION>"));
    }

    #[test]
    fn outcome_describes_reverts() {
        let mut text = TextReport::new("journey move");
        text.outcome(&TransitionOutcome::Reverted {
            reason: "offline".to_string(),
            restored: false,
        });
        assert!(text.render().contains("a newer change is pending"));
    }

    #[test]
    fn progress_bar_scales_to_width() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", "-".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]  50%", "#".repeat(10), "-".repeat(10)));
    }

    #[test]
    fn error_envelope_carries_kind_and_hint() {
        let err = Error::TaskNotFound("t9".into());
        let envelope: Envelope<'_, ()> = Envelope {
            schema_version: SCHEMA_VERSION,
            command: "move",
            body: Body::Error {
                error: ErrorBody {
                    message: err.to_string(),
                    code: err.exit_code(),
                    kind: error_kind(&err),
                    details: None,
                },
            },
            warnings: &[],
            next_steps: &error_next_steps(&err),
        };
        let value = serde_json::to_value(&envelope).expect("json");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["kind"], "user_error");
        assert_eq!(value["next_steps"][0], "journey list");
        assert!(value.get("warnings").is_none());
        assert_eq!(error_kind(&Error::WriteReverted("x".into())), "write_reverted");
        assert!(error_next_steps(&Error::OperationFailed("x".into())).is_empty());
    }
}
