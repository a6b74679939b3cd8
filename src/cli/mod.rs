//! Command-line interface for journey
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands is implemented in its own submodule.

use std::path::PathBuf;

use chrono::FixedOffset;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::events::EventDestination;
use crate::output::OutputOptions;
use crate::store::FileJourneyStore;

mod goal;
mod transition;
mod view;

/// journey - goal and task board engine
///
/// Normalizes a journey document, renders board, list and calendar views of
/// its tasks, and applies status changes with optimistic writes.
#[derive(Parser, Debug)]
#[command(name = "journey")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding `.journey.toml` and the journey document
    #[arg(long, global = true, env = "JOURNEY_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSONL change events ("-" for stdout, or a file path)
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show tasks grouped into status columns
    Board {
        /// Restrict to one goal
        #[arg(long)]
        goal: Option<String>,

        /// Restrict to one milestone of the goal
        #[arg(long, requires = "goal")]
        milestone: Option<String>,
    },

    /// List tasks across all goals
    List {
        /// Restrict to one goal
        #[arg(long)]
        goal: Option<String>,

        /// Restrict to one status (todo, in_progress, stuck, completed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show tasks due on a day, or on a run of days
    Calendar {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Number of days to show
        #[arg(long, default_value_t = 1)]
        days: u32,
    },

    /// Move a task to a status
    Move {
        /// Task id
        task: String,

        /// Target status (todo, in_progress, stuck, completed)
        status: String,
    },

    /// Drop a task on a board column; no column means released outside the board
    Drop {
        /// Task id
        task: String,

        /// Column id (todo, in_progress, stuck, completed)
        column: Option<String>,
    },

    /// Show goal progress, optionally recomputing it from tasks
    Progress {
        /// Restrict to one goal
        #[arg(long)]
        goal: Option<String>,

        /// Recompute and persist progress from task completion
        #[arg(long)]
        recompute: bool,
    },

    /// Goal management
    #[command(subcommand)]
    Goal(GoalCommands),

    /// Milestone management
    #[command(subcommand)]
    Milestone(MilestoneCommands),

    /// Rewrite the journey document in canonical form
    Normalize {
        /// Print the canonical document without writing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GoalCommands {
    /// Adopt a decomposed goal from a JSON file
    Add {
        /// JSON file holding one goal with milestones and tasks ("-" for stdin)
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum MilestoneCommands {
    /// Mark a milestone complete
    Done { goal: String, milestone: String },

    /// Mark a milestone not complete
    Undone { goal: String, milestone: String },
}

impl Commands {
    /// Name reported in the output envelope, e.g. `"milestone done"`.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Board { .. } => "board",
            Commands::List { .. } => "list",
            Commands::Calendar { .. } => "calendar",
            Commands::Move { .. } => "move",
            Commands::Drop { .. } => "drop",
            Commands::Progress { .. } => "progress",
            Commands::Goal(GoalCommands::Add { .. }) => "goal add",
            Commands::Milestone(MilestoneCommands::Done { .. }) => "milestone done",
            Commands::Milestone(MilestoneCommands::Undone { .. }) => "milestone undone",
            Commands::Normalize { .. } => "normalize",
        }
    }
}

/// Resolved settings shared by every command.
pub(crate) struct CommandContext {
    pub dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
    pub events: Option<EventDestination>,
}

impl CommandContext {
    fn resolve(cli: &Cli) -> Result<Self> {
        let dir = cli.dir.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        });
        let config = Config::load_from_dir(&dir)?;
        let events = EventDestination::parse(cli.events.as_deref())
            .or_else(|| config.events.destination());
        Ok(Self {
            dir,
            config,
            output: OutputOptions {
                json: cli.json,
                quiet: cli.quiet,
            },
            events,
        })
    }

    pub fn store(&self) -> FileJourneyStore {
        FileJourneyStore::new(self.config.store_path(&self.dir))
            .with_lock_timeout(self.config.store.lock_timeout_ms)
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        self.config.calendar.offset()
    }

    pub async fn coordinator(&self) -> Result<Coordinator<FileJourneyStore>> {
        let coordinator = Coordinator::load(self.store()).await?;
        match &self.events {
            Some(destination) => Ok(coordinator.with_events(destination.open()?)),
            None => Ok(coordinator),
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = CommandContext::resolve(&self)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(dispatch(self.command, &ctx))
    }
}

async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::Board { goal, milestone } => {
            view::run_board(ctx, view::BoardOptions { goal, milestone }).await
        }
        Commands::List { goal, status } => {
            view::run_list(ctx, view::ListOptions { goal, status }).await
        }
        Commands::Calendar { date, days } => {
            view::run_calendar(ctx, view::CalendarOptions { date, days }).await
        }
        Commands::Move { task, status } => {
            transition::run_move(ctx, transition::MoveOptions { task, status }).await
        }
        Commands::Drop { task, column } => {
            transition::run_drop(ctx, transition::DropOptions { task, column }).await
        }
        Commands::Progress { goal, recompute } => {
            goal::run_progress(ctx, goal::ProgressOptions { goal, recompute }).await
        }
        Commands::Goal(GoalCommands::Add { file }) => {
            goal::run_add(ctx, goal::AddOptions { file }).await
        }
        Commands::Milestone(cmd) => {
            let (goal, milestone, completed) = match cmd {
                MilestoneCommands::Done { goal, milestone } => (goal, milestone, true),
                MilestoneCommands::Undone { goal, milestone } => (goal, milestone, false),
            };
            transition::run_milestone(
                ctx,
                transition::MilestoneOptions {
                    goal,
                    milestone,
                    completed,
                },
            )
            .await
        }
        Commands::Normalize { dry_run } => {
            goal::run_normalize(ctx, goal::NormalizeOptions { dry_run }).await
        }
    }
}
