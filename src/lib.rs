//! journey - Journey Task Engine
//!
//! Core of a goal/task coaching board: it turns a loosely-typed journey
//! document into canonical goals and tasks, keeps task status and the legacy
//! `completed` flag in lockstep, derives board, list and calendar views, and
//! applies changes optimistically with rollback when the store rejects them.
//!
//! # Module Organization
//!
//! - `model`: canonical `Goal`, `Milestone`, `Task` and `Journey` types
//! - `status`: task status lifecycle and the only way to change it
//! - `normalize`: raw JSON document to canonical model
//! - `projection`: kanban, milestone scope, flat list, calendar, summaries
//! - `session`: per-task session resolution with failure isolation
//! - `coordinator`: apply-then-confirm-or-revert mutations
//! - `gesture`: board gestures to transition commands
//! - `decompose`: adopting decomposed goals
//! - `store`: the persistence seam and its file/memory implementations
//! - `config`: `.journey.toml` loading
//! - `events`: JSONL change events
//! - `lock`: file locking and atomic writes
//! - `cli`, `output`: command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod decompose;
pub mod error;
pub mod events;
pub mod gesture;
pub mod lock;
pub mod model;
pub mod normalize;
pub mod output;
pub mod projection;
pub mod session;
pub mod status;
pub mod store;

pub use coordinator::{Coordinator, TransitionOutcome};
pub use error::{Error, Result};
pub use model::{Goal, Journey, Milestone, Task};
pub use status::TaskStatus;
