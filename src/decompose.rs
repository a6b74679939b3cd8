//! Goal decomposition seam.
//!
//! A decomposer turns a free-form goal description into a goal with
//! milestones and tasks. Its output shape is not trusted: adoption runs it
//! through the normalizer before handing it to the coordinator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::coordinator::{Coordinator, TransitionOutcome};
use crate::error::{Error, Result};
use crate::model::Goal;
use crate::normalize::normalize_goal;
use crate::store::JourneyStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionRequest {
    pub description: String,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub blueprint_context: Value,
}

#[async_trait]
pub trait GoalDecomposer: Send + Sync {
    /// Produce a raw goal document for `request`.
    async fn decompose(&self, request: &DecompositionRequest) -> anyhow::Result<Value>;
}

/// Decomposer that always returns the same prepared goal document.
#[derive(Debug, Clone)]
pub struct PreparedDecomposition {
    goal: Value,
}

impl PreparedDecomposition {
    pub fn new(goal: Value) -> Self {
        Self { goal }
    }
}

#[async_trait]
impl GoalDecomposer for PreparedDecomposition {
    async fn decompose(&self, _request: &DecompositionRequest) -> anyhow::Result<Value> {
        Ok(self.goal.clone())
    }
}

/// Result of adopting a decomposed goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adoption {
    pub goal_id: String,
    pub tasks: usize,
    pub milestones: usize,
    pub outcome: TransitionOutcome,
}

/// Normalize a raw decomposed goal so it can join `existing` goals.
///
/// A goal without an id, or whose id is already taken, gets a fresh
/// `goal-<ulid>` id before normalization so its synthesized task ids are
/// unique too. Progress is derived from the tasks.
pub fn prepare_goal<'a>(raw: &Value, existing: impl IntoIterator<Item = &'a str>) -> Goal {
    let existing: Vec<&str> = existing.into_iter().collect();
    let mut raw = raw.clone();
    if let Value::Object(obj) = &mut raw {
        let taken = match obj.get("id").and_then(Value::as_str).map(str::trim) {
            Some(id) if !id.is_empty() => existing.contains(&id),
            _ => true,
        };
        if taken {
            let fresh = format!("goal-{}", Ulid::new().to_string().to_lowercase());
            obj.insert("id".to_string(), Value::String(fresh));
        }
    }
    let mut goal = normalize_goal(&raw, existing.len());
    goal.recompute_progress();
    goal
}

/// Ask `decomposer` for a goal and add it through `coordinator`.
pub async fn adopt_decomposition<S, D>(
    coordinator: &Coordinator<S>,
    decomposer: &D,
    request: &DecompositionRequest,
) -> Result<Adoption>
where
    S: JourneyStore,
    D: GoalDecomposer + ?Sized,
{
    let raw = decomposer.decompose(request).await?;
    if !raw.is_object() {
        return Err(Error::InvalidArgument(
            "decomposed goal must be a JSON object".to_string(),
        ));
    }
    let goal = coordinator.with_journey(|journey| {
        prepare_goal(
            &raw,
            journey.current_goals.iter().map(|goal| goal.id.as_str()),
        )
    });
    let goal_id = goal.id.clone();
    let tasks = goal.tasks.len();
    let milestones = goal.milestones.len();
    tracing::debug!(goal_id = %goal_id, tasks, milestones, "adopting decomposed goal");
    let outcome = coordinator.add_goal(goal).await;
    Ok(Adoption {
        goal_id,
        tasks,
        milestones,
        outcome,
    })
}
