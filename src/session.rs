//! Session-type resolution for task cards.
//!
//! The resolver is an external collaborator that may fail for any single
//! task. Failures are isolated per task and fall back to
//! [`SessionType::NoSession`].

use serde::Serialize;

use crate::model::Task;
use crate::status::TaskStatus;

/// Coaching-interaction state of a task, used to pick a card's action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    #[default]
    NoSession,
    StartSession,
    ResumeSession,
    ReviewSession,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::NoSession => "NO_SESSION",
            SessionType::StartSession => "START_SESSION",
            SessionType::ResumeSession => "RESUME_SESSION",
            SessionType::ReviewSession => "REVIEW_SESSION",
        }
    }
}

pub trait SessionResolver {
    fn resolve(&self, task_id: &str, goal_id: Option<&str>) -> anyhow::Result<SessionType>;
}

impl<F> SessionResolver for F
where
    F: Fn(&str, Option<&str>) -> anyhow::Result<SessionType>,
{
    fn resolve(&self, task_id: &str, goal_id: Option<&str>) -> anyhow::Result<SessionType> {
        self(task_id, goal_id)
    }
}

/// Resolver that never offers a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessionResolver;

impl SessionResolver for NoSessionResolver {
    fn resolve(&self, _task_id: &str, _goal_id: Option<&str>) -> anyhow::Result<SessionType> {
        Ok(SessionType::NoSession)
    }
}

/// Resolver that derives the session from the task's current status.
#[derive(Debug, Clone, Copy)]
pub struct StatusSessionResolver<'a> {
    journey: &'a crate::model::Journey,
}

impl<'a> StatusSessionResolver<'a> {
    pub fn new(journey: &'a crate::model::Journey) -> Self {
        Self { journey }
    }
}

impl SessionResolver for StatusSessionResolver<'_> {
    fn resolve(&self, task_id: &str, _goal_id: Option<&str>) -> anyhow::Result<SessionType> {
        let task = self
            .journey
            .task(task_id)
            .ok_or_else(|| anyhow::anyhow!("task not found: {task_id}"))?;
        Ok(match task.status() {
            TaskStatus::Todo | TaskStatus::Stuck => SessionType::StartSession,
            TaskStatus::InProgress => SessionType::ResumeSession,
            TaskStatus::Completed => SessionType::ReviewSession,
        })
    }
}

/// Resolve one task, isolating any failure.
pub fn resolve_session(resolver: &dyn SessionResolver, task: &Task) -> SessionType {
    match resolver.resolve(&task.id, Some(task.goal_id.as_str())) {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(
                task_id = %task.id,
                goal_id = %task.goal_id,
                error = %err,
                "session resolution failed; defaulting to NO_SESSION"
            );
            SessionType::NoSession
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Goal, Journey};

    #[test]
    fn failing_resolver_defaults_to_no_session() {
        let task = Task::new("t1", "g1", TaskStatus::Todo);
        let resolver = |_: &str, _: Option<&str>| -> anyhow::Result<SessionType> {
            anyhow::bail!("backend unavailable")
        };
        assert_eq!(resolve_session(&resolver, &task), SessionType::NoSession);
    }

    #[test]
    fn status_resolver_maps_each_status() {
        let mut goal = Goal::new("g1", "Goal");
        for (id, status) in [
            ("a", TaskStatus::Todo),
            ("b", TaskStatus::InProgress),
            ("c", TaskStatus::Stuck),
            ("d", TaskStatus::Completed),
        ] {
            goal.tasks.push(Task::new(id, "g1", status));
        }
        let journey = Journey::new(vec![goal]);
        let resolver = StatusSessionResolver::new(&journey);
        let sessions: Vec<SessionType> = journey
            .tasks()
            .map(|task| resolve_session(&resolver, task))
            .collect();
        assert_eq!(
            sessions,
            vec![
                SessionType::StartSession,
                SessionType::ResumeSession,
                SessionType::StartSession,
                SessionType::ReviewSession,
            ]
        );
        assert!(resolver.resolve("missing", None).is_err());
    }

    #[test]
    fn serializes_screaming_case() {
        let value = serde_json::to_value(SessionType::NoSession).expect("json");
        assert_eq!(value, "NO_SESSION");
    }
}
