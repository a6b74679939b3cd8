//! Optimistic update coordinator.
//!
//! Every mutation is applied to the in-memory graph first, synchronously,
//! then written to the [`JourneyStore`]. Writes of one coordinator go out one
//! at a time, in the order the mutations were made. Each write carries the
//! last persisted journey plus that single mutation, never another
//! mutation that is still waiting.
//!
//! The local graph is always the persisted journey with every pending
//! mutation replayed on top. A rejected write drops its mutation and the
//! fields it touched fall back to the persisted value, unless a newer
//! pending mutation owns them. Once [`Coordinator::unmount`] has been
//! called, completions are dropped without touching state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::events::{Event, EventKind, EventSink};
use crate::gesture::TransitionCommand;
use crate::model::{Goal, Journey};
use crate::normalize::normalize_journey;
use crate::status::TaskStatus;
use crate::store::JourneyStore;

/// Result of one optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// Applied locally and accepted by the store.
    Applied,
    /// Nothing to do: the target already had the requested value.
    Unchanged,
    /// The target does not exist; nothing was applied.
    NotFound,
    /// The store rejected the write. `restored` is false when a newer
    /// pending mutation owns the field and the local value was left alone.
    Reverted { reason: String, restored: bool },
    /// The engine was unmounted before the write settled.
    Detached,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, TransitionOutcome::Reverted { .. })
    }
}

/// A value in the graph that a mutation writes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Task { goal_id: String, task_id: String },
    Progress(String),
    Milestone { goal_id: String, milestone_id: String },
    Goal(String),
}

/// One optimistic change, replayable on any copy of the graph.
#[derive(Debug, Clone)]
enum Mutation {
    Status {
        goal_id: String,
        task_id: String,
        status: TaskStatus,
    },
    Milestone {
        goal_id: String,
        milestone_id: String,
        completed: bool,
    },
    Progress {
        goal_id: String,
    },
    AddGoal(Goal),
}

impl Mutation {
    /// Fields written by this mutation. The first is the one it was made for.
    fn fields(&self) -> Vec<Field> {
        match self {
            Mutation::Status {
                goal_id, task_id, ..
            } => vec![
                Field::Task {
                    goal_id: goal_id.clone(),
                    task_id: task_id.clone(),
                },
                Field::Progress(goal_id.clone()),
            ],
            Mutation::Milestone {
                goal_id,
                milestone_id,
                ..
            } => vec![Field::Milestone {
                goal_id: goal_id.clone(),
                milestone_id: milestone_id.clone(),
            }],
            Mutation::Progress { goal_id } => vec![Field::Progress(goal_id.clone())],
            Mutation::AddGoal(goal) => vec![Field::Goal(goal.id.clone())],
        }
    }

    fn touches(&self, field: &Field) -> bool {
        self.fields().contains(field)
    }

    /// Replay onto `journey`. Targets that are gone are skipped.
    fn apply(&self, journey: &mut Journey) {
        match self {
            Mutation::Status {
                goal_id,
                task_id,
                status,
            } => {
                let Some(goal) = journey.goal_mut(goal_id) else {
                    return;
                };
                let Some(task) = goal.task_mut(task_id) else {
                    return;
                };
                task.apply_status(*status);
                goal.recompute_progress();
            }
            Mutation::Milestone {
                goal_id,
                milestone_id,
                completed,
            } => {
                if let Some(milestone) = journey
                    .goal_mut(goal_id)
                    .and_then(|goal| goal.milestone_mut(milestone_id))
                {
                    milestone.completed = *completed;
                }
            }
            Mutation::Progress { goal_id } => {
                if let Some(goal) = journey.goal_mut(goal_id) {
                    goal.recompute_progress();
                }
            }
            Mutation::AddGoal(goal) => {
                if journey.goal(&goal.id).is_none() {
                    journey.current_goals.push(goal.clone());
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    /// What the graph looks like to readers.
    journey: Journey,
    /// The journey as last accepted by the store.
    persisted: Journey,
    /// Mutations whose write has not settled, by sequence number.
    pending: BTreeMap<u64, Mutation>,
}

impl EngineState {
    fn stage(&mut self, seq: u64, mutation: Mutation) {
        mutation.apply(&mut self.journey);
        self.pending.insert(seq, mutation);
    }

    /// The document to send for `seq`.
    fn outgoing(&self, seq: u64) -> Journey {
        let mut next = self.persisted.clone();
        if let Some(mutation) = self.pending.get(&seq) {
            mutation.apply(&mut next);
        }
        next
    }

    fn rebase(&mut self) {
        let mut journey = self.persisted.clone();
        for mutation in self.pending.values() {
            mutation.apply(&mut journey);
        }
        self.journey = journey;
    }

    /// Drop `seq` from the pending set and rebuild the graph. Returns whether
    /// the mutation's own field now shows the persisted value.
    fn settle(&mut self, seq: u64, stored: Option<Journey>) -> bool {
        if let Some(journey) = stored {
            self.persisted = journey;
        }
        let owned = self.pending.remove(&seq).and_then(|mutation| {
            let field = mutation.fields().into_iter().next()?;
            Some(self.pending.values().any(|other| other.touches(&field)))
        });
        self.rebase();
        owned == Some(false)
    }
}

/// How a write finished.
enum Settled {
    Stored,
    Rejected { reason: String, restored: bool },
    Detached,
}

pub struct Coordinator<S> {
    store: S,
    state: Mutex<EngineState>,
    /// Held for the duration of each store call.
    write_turn: tokio::sync::Mutex<()>,
    mounted: AtomicBool,
    next_seq: AtomicU64,
    events: Option<Mutex<EventSink>>,
}

impl<S: JourneyStore> Coordinator<S> {
    /// Wrap an already-normalized journey.
    pub fn new(store: S, journey: Journey) -> Self {
        Self {
            store,
            state: Mutex::new(EngineState {
                persisted: journey.clone(),
                journey,
                pending: BTreeMap::new(),
            }),
            write_turn: tokio::sync::Mutex::new(()),
            mounted: AtomicBool::new(true),
            next_seq: AtomicU64::new(1),
            events: None,
        }
    }

    /// Read and normalize the store's document.
    pub async fn load(store: S) -> Result<Self> {
        let document = store.get_journey().await?;
        let journey = normalize_journey(&document);
        tracing::debug!(goals = journey.current_goals.len(), "journey loaded");
        Ok(Self::new(store, journey))
    }

    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = Some(Mutex::new(sink));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Borrow the current graph. Projections computed inside `f` see one
    /// consistent state.
    pub fn with_journey<R>(&self, f: impl FnOnce(&Journey) -> R) -> R {
        f(&self.state().journey)
    }

    pub fn snapshot(&self) -> Journey {
        self.state().journey.clone()
    }

    /// Number of mutations whose write has not settled.
    pub fn pending_writes(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Stop applying write completions. In-flight writes still run but their
    /// outcomes leave local state untouched.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub async fn dispatch(&self, command: TransitionCommand) -> TransitionOutcome {
        self.transition(&command.task_id, command.status).await
    }

    /// Move a task to `status`, optimistically.
    pub async fn transition(&self, task_id: &str, status: TaskStatus) -> TransitionOutcome {
        if !self.is_mounted() {
            return TransitionOutcome::Detached;
        }

        let (seq, goal_id, from, applied_progress) = {
            let mut state = self.state();
            let Some(pos) = state.journey.locate_task(task_id) else {
                tracing::debug!(task_id, "transition target not found; ignoring");
                return TransitionOutcome::NotFound;
            };
            let goal = &state.journey.current_goals[pos.goal];
            let from = goal.tasks[pos.task].status();
            if from == status {
                return TransitionOutcome::Unchanged;
            }
            let goal_id = goal.id.clone();

            let seq = self.next_seq();
            state.stage(
                seq,
                Mutation::Status {
                    goal_id: goal_id.clone(),
                    task_id: task_id.to_string(),
                    status,
                },
            );
            let applied_progress = state
                .journey
                .goal(&goal_id)
                .map(|goal| goal.progress)
                .unwrap_or_default();
            (seq, goal_id, from, applied_progress)
        };

        match self.persist(seq).await {
            Settled::Detached => {
                self.emit(EventKind::WriteDiscarded, json!({ "task_id": task_id }));
                TransitionOutcome::Detached
            }
            Settled::Stored => {
                tracing::info!(
                    task_id,
                    goal_id = %goal_id,
                    status = %status,
                    progress = applied_progress,
                    "task transition persisted"
                );
                self.emit(
                    EventKind::TaskStatusChanged,
                    json!({
                        "task_id": task_id,
                        "goal_id": goal_id,
                        "from": from,
                        "to": status,
                        "progress": applied_progress,
                    }),
                );
                TransitionOutcome::Applied
            }
            Settled::Rejected { reason, restored } => {
                tracing::warn!(
                    task_id,
                    goal_id = %goal_id,
                    restored,
                    error = %reason,
                    "task transition rejected by store"
                );
                self.emit(
                    EventKind::TaskStatusReverted,
                    json!({
                        "task_id": task_id,
                        "goal_id": goal_id,
                        "attempted": status,
                        "restored": restored,
                        "reason": reason,
                    }),
                );
                TransitionOutcome::Reverted { reason, restored }
            }
        }
    }

    /// Add a goal (e.g. one produced by decomposition). The goal should
    /// already be normalized. Rolled back by removing it again.
    pub async fn add_goal(&self, goal: Goal) -> TransitionOutcome {
        if !self.is_mounted() {
            return TransitionOutcome::Detached;
        }
        let goal_id = goal.id.clone();
        let seq = {
            let mut state = self.state();
            if state.journey.goal(&goal_id).is_some() {
                tracing::debug!(goal_id = %goal_id, "goal already present; not adding");
                return TransitionOutcome::Unchanged;
            }
            let seq = self.next_seq();
            state.stage(seq, Mutation::AddGoal(goal));
            seq
        };

        match self.persist(seq).await {
            Settled::Detached => {
                self.emit(EventKind::WriteDiscarded, json!({ "goal_id": goal_id }));
                TransitionOutcome::Detached
            }
            Settled::Stored => {
                tracing::info!(goal_id = %goal_id, "goal persisted");
                self.emit(EventKind::GoalAdded, json!({ "goal_id": goal_id }));
                TransitionOutcome::Applied
            }
            Settled::Rejected { reason, restored } => {
                tracing::warn!(goal_id = %goal_id, error = %reason, "goal add rejected by store");
                self.emit(
                    EventKind::GoalAddReverted,
                    json!({ "goal_id": goal_id, "reason": reason }),
                );
                TransitionOutcome::Reverted { reason, restored }
            }
        }
    }

    /// Mark a milestone done or not done.
    pub async fn set_milestone_completed(
        &self,
        goal_id: &str,
        milestone_id: &str,
        completed: bool,
    ) -> TransitionOutcome {
        if !self.is_mounted() {
            return TransitionOutcome::Detached;
        }
        let seq = {
            let mut state = self.state();
            let Some(milestone) = state
                .journey
                .goal(goal_id)
                .and_then(|goal| goal.milestone(milestone_id))
            else {
                tracing::debug!(goal_id, milestone_id, "milestone not found; ignoring");
                return TransitionOutcome::NotFound;
            };
            if milestone.completed == completed {
                return TransitionOutcome::Unchanged;
            }
            let seq = self.next_seq();
            state.stage(
                seq,
                Mutation::Milestone {
                    goal_id: goal_id.to_string(),
                    milestone_id: milestone_id.to_string(),
                    completed,
                },
            );
            seq
        };

        match self.persist(seq).await {
            Settled::Detached => {
                self.emit(
                    EventKind::WriteDiscarded,
                    json!({ "goal_id": goal_id, "milestone_id": milestone_id }),
                );
                TransitionOutcome::Detached
            }
            Settled::Stored => {
                self.emit(
                    EventKind::MilestoneUpdated,
                    json!({ "goal_id": goal_id, "milestone_id": milestone_id, "completed": completed }),
                );
                TransitionOutcome::Applied
            }
            Settled::Rejected { reason, restored } => {
                tracing::warn!(goal_id, milestone_id, error = %reason, "milestone update rejected by store");
                self.emit(
                    EventKind::MilestoneUpdateReverted,
                    json!({ "goal_id": goal_id, "milestone_id": milestone_id, "reason": reason }),
                );
                TransitionOutcome::Reverted { reason, restored }
            }
        }
    }

    /// Recompute one goal's progress from its tasks and persist it.
    pub async fn recompute_progress(&self, goal_id: &str) -> TransitionOutcome {
        if !self.is_mounted() {
            return TransitionOutcome::Detached;
        }
        let (seq, previous, applied) = {
            let mut state = self.state();
            let Some(goal) = state.journey.goal(goal_id) else {
                tracing::debug!(goal_id, "goal not found; ignoring recompute");
                return TransitionOutcome::NotFound;
            };
            let previous = goal.progress;
            let applied = goal.derived_progress().unwrap_or(previous);
            if applied == previous {
                return TransitionOutcome::Unchanged;
            }
            let seq = self.next_seq();
            state.stage(
                seq,
                Mutation::Progress {
                    goal_id: goal_id.to_string(),
                },
            );
            (seq, previous, applied)
        };

        match self.persist(seq).await {
            Settled::Detached => {
                self.emit(EventKind::WriteDiscarded, json!({ "goal_id": goal_id }));
                TransitionOutcome::Detached
            }
            Settled::Stored => {
                self.emit(
                    EventKind::ProgressRecomputed,
                    json!({ "goal_id": goal_id, "from": previous, "to": applied }),
                );
                TransitionOutcome::Applied
            }
            Settled::Rejected { reason, restored } => {
                tracing::warn!(goal_id, error = %reason, "progress recompute rejected by store");
                self.emit(
                    EventKind::ProgressRecomputeReverted,
                    json!({ "goal_id": goal_id, "reason": reason }),
                );
                TransitionOutcome::Reverted { reason, restored }
            }
        }
    }

    /// Replace the persisted view with a fresh read of the store. Mutations
    /// still waiting for their write are replayed on top of it.
    pub async fn resync(&self) -> Result<()> {
        let _turn = self.write_turn.lock().await;
        let document = self.store.get_journey().await?;
        if !self.is_mounted() {
            return Ok(());
        }
        let journey = normalize_journey(&document);
        let goals = journey.current_goals.len();
        {
            let mut state = self.state();
            state.persisted = journey;
            state.rebase();
        }
        self.emit(EventKind::JourneyResynced, json!({ "goals": goals }));
        Ok(())
    }

    /// Write the persisted journey plus mutation `seq`, then settle it.
    async fn persist(&self, seq: u64) -> Settled {
        let _turn = self.write_turn.lock().await;
        let outgoing = self.state().outgoing(seq);
        let result = self.store.update_journey(&outgoing).await;

        if !self.is_mounted() {
            return Settled::Detached;
        }
        let mut state = self.state();
        match result {
            Ok(()) => {
                state.settle(seq, Some(outgoing));
                Settled::Stored
            }
            Err(err) => {
                let restored = state.settle(seq, None);
                Settled::Rejected {
                    reason: format!("{err:#}"),
                    restored,
                }
            }
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: EventKind, data: serde_json::Value) {
        let Some(sink) = &self.events else {
            return;
        };
        let event = match Event::new(kind).with_data(data) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build event");
                return;
            }
        };
        let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = sink.emit(&event) {
            tracing::warn!(error = %err, "failed to emit event");
        }
    }
}
