//! Error types for topology construction and run execution.
//!
//! # Error Hierarchy
//!
//! ```text
//! EngineError
//! ├── Topology           - rejected at construction time
//! ├── UserFailure        - a process raised during its own invocation
//! ├── Timeout            - a step exceeded its timeout
//! └── RecursionExhausted - opt-in: recursion_limit reached without halting
//! ```
//!
//! `EmptyChannelRead` and `UnroutedWrite` from the design doc are
//! deliberately absent here: the former is suppressed at the `read`
//! boundary (returns `None`) and at the Planner boundary (skips the
//! process for the step), and the latter is a non-fatal diagnostic logged
//! via `tracing::warn!` in [`crate::planner`] rather than a typed error.
//! Neither ever needs to reach a caller.
//!
//! # Example
//!
//! ```rust
//! use pregel_engine::error::EngineError;
//!
//! fn handle(err: EngineError) {
//!     match err {
//!         EngineError::Topology(msg) => eprintln!("rejected at construction: {msg}"),
//!         EngineError::UserFailure { process, step, source } => {
//!             eprintln!("process '{process}' failed at step {step}: {source}")
//!         }
//!         EngineError::Timeout { step, .. } => eprintln!("step {step} timed out"),
//!         EngineError::RecursionExhausted { limit } => {
//!             eprintln!("recursion_limit ({limit}) exhausted")
//!         }
//!         EngineError::Channel(e) => eprintln!("channel error: {e}"),
//!     }
//! }
//! ```
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by topology construction and run execution.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Construction-time rejection: an unknown channel name referenced by
    /// a process, `input`, or `output`; an isolated process that reads no
    /// input channel; an output never written by any process; or an
    /// `Invoke` subscription mixing the singleton-none key with other
    /// keys.
    #[error("topology error: {0}")]
    Topology(String),

    /// A user process raised during its own invocation. Propagated
    /// verbatim (as its source) after best-effort cancellation of the
    /// other tasks scheduled in the same step.
    #[error("process '{process}' failed at step {step}: {source}")]
    UserFailure {
        /// Name of the failing process.
        process: String,
        /// Step at which the failure occurred.
        step: usize,
        /// The process's own error.
        #[source]
        source: anyhow::Error,
    },

    /// A step did not finish within its configured `step_timeout`. All
    /// inflight tasks for the step were cancelled before this error was
    /// raised.
    #[error("step {step} timed out after {timeout:?}")]
    Timeout {
        /// Step that timed out.
        step: usize,
        /// The configured timeout that was exceeded.
        timeout: Duration,
    },

    /// The run completed `recursion_limit` steps without halting. Only
    /// raised when the engine is configured with
    /// [`crate::engine::RecursionLimitPolicy::Raise`]; the default policy
    /// terminates silently instead (see `DESIGN.md`).
    #[error("recursion limit ({limit}) exhausted without reaching quiescence")]
    RecursionExhausted {
        /// The configured recursion limit.
        limit: usize,
    },

    /// A channel operation failed outside the normal empty-read path
    /// (e.g. a malformed checkpoint restore).
    #[error(transparent)]
    Channel(#[from] pregel_channels::ChannelError),
}
