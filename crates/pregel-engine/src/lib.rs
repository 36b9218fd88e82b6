//! # pregel-engine - a step-synchronous (BSP) dataflow execution engine
//!
//! Execution proceeds in discrete, barrier-synchronized **steps**. Within
//! a step, every ready process runs concurrently against a frozen,
//! read-only view of channel state; at the step boundary, every write
//! produced during the step is applied to the channels, and the next
//! step's ready set is computed from what changed. A run halts when no
//! process is ready.
//!
//! ```text
//!            ┌─────────────────────────────────────┐
//!            │ step N                               │
//!            │  ┌────────┐  ┌────────┐  ┌────────┐  │
//!            │  │proc A  │  │proc B  │  │proc C  │  │  <- concurrent,
//!            │  └───┬────┘  └───┬────┘  └───┬────┘  │     read-only view
//!            └──────┼───────────┼───────────┼───────┘
//!                   ▼           ▼           ▼
//!            apply_writes_and_prepare_next_tasks   <- pregel_engine::planner
//!                   │
//!                   ▼
//!            ┌─────────────────────────────────────┐
//!            │ step N+1 ...                         │
//!            └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`process`] - the two process shapes, `Invoke` and `Batch`.
//! - [`planner`] - the pure write-application / next-task-selection
//!   function at the heart of every step.
//! - [`registry`] - the scoped, per-run channel set.
//! - [`io`] - translating a caller's single `Value` into the channel
//!   writes/reads at the edges of a run.
//! - [`runner`] - concurrent task execution: fan-out, first-failure
//!   cancellation, step timeout.
//! - [`validate`] - construction-time topology checks.
//! - [`engine`] - [`engine::Pregel`], the public façade.
//! - [`error`] - [`error::EngineError`].
//!
//! Channel state containers themselves (`LastValueChannel`,
//! `TopicChannel`, ...) live in `pregel-channels`, re-exported here for
//! convenience.
//!
//! ## See Also
//!
//! - Pregel paper: <https://research.google/pubs/pub37252/>

pub mod engine;
pub mod error;
pub mod io;
pub mod planner;
pub mod process;
pub mod registry;
pub mod runner;
pub mod validate;

pub use engine::{Pregel, RecursionLimitPolicy};
pub use error::{EngineError, Result};
pub use io::ValueShape;
pub use process::{NodeExecutor, Process, RunContext, Subscription};
pub use registry::ChannelRegistry;

pub use pregel_channels::{
    AccumulatorChannel, BinaryOperatorChannel, Channel, InboxChannel, LastValueChannel,
    TopicChannel,
};
