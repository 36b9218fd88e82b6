//! `Pregel`: the façade that ties a topology (channels + processes) to a
//! runnable engine.
//!
//! Construction validates the topology once (see [`crate::validate`]); the
//! four entry points - [`Pregel::invoke`], [`Pregel::stream`],
//! [`Pregel::transform`], [`Pregel::atransform`] - all drive the same step
//! loop and differ only in what they return to the caller.

use crate::io::ValueShape;
use crate::planner::apply_writes_and_prepare_next_tasks;
use crate::process::Process;
use crate::registry::ChannelRegistry;
use crate::runner::run_step;
use crate::error::{EngineError, Result};
use crate::validate::validate;
use async_stream::try_stream;
use futures::Stream;
use pregel_channels::Channel;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// What the engine does when `recursion_limit` steps elapse without
/// reaching quiescence (no process ready to run).
///
/// The design doc leaves this an open question; this crate defaults to
/// `Silent` (stop and return whatever output is available), with `Raise`
/// as an explicit opt-in for callers that want exhaustion surfaced as an
/// error. See `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecursionLimitPolicy {
    #[default]
    Silent,
    Raise,
}

/// A fully-wired, validated topology, ready to run.
pub struct Pregel {
    channel_templates: HashMap<String, Box<dyn Channel>>,
    processes: Vec<Process>,
    input: ValueShape,
    output: ValueShape,
    recursion_limit: usize,
    recursion_limit_policy: RecursionLimitPolicy,
    step_timeout: Option<Duration>,
}

impl Pregel {
    /// Validates and wraps a topology. Returns
    /// [`EngineError::Topology`] if the wiring is inconsistent; see
    /// [`crate::validate::validate`] for the exact checks.
    pub fn new(
        channels: HashMap<String, Box<dyn Channel>>,
        processes: Vec<Process>,
        input: ValueShape,
        output: ValueShape,
    ) -> Result<Self> {
        validate(&channels, &processes, &input, &output)?;
        Ok(Self {
            channel_templates: channels,
            processes,
            input,
            output,
            recursion_limit: 25,
            recursion_limit_policy: RecursionLimitPolicy::default(),
            step_timeout: None,
        })
    }

    /// Overrides the default recursion limit (25 steps, matching common
    /// BSP defaults observed in practice).
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_recursion_limit_policy(mut self, policy: RecursionLimitPolicy) -> Self {
        self.recursion_limit_policy = policy;
        self
    }

    /// Bounds how long a single step's fan-out may run before every
    /// inflight task is cancelled and [`EngineError::Timeout`] is raised.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Runs to quiescence and returns the final output value.
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        let mut last_output = None;
        let mut stream = Box::pin(self.atransform(input));
        while let Some(chunk) = futures::StreamExt::next(&mut stream).await {
            last_output = Some(chunk?);
        }
        Ok(last_output.unwrap_or(Value::Null))
    }

    /// Runs to quiescence, yielding the output after every step in which
    /// it changed. The async counterpart of [`Pregel::transform`].
    ///
    /// Each iteration: seed/prior-step writes are already applied to
    /// `registry` and `tasks` holds what they made ready. The step runs
    /// against a snapshot taken *after* that application (so a process's
    /// ad-hoc `read` of a channel outside its own subscription sees every
    /// write up to the previous step boundary, per "a write emitted in
    /// step k is visible to every eligible process in step k+1"). Once
    /// the step's own writes come back, they are applied *before* the
    /// output check runs, so a step's output reflects that step's writes
    /// rather than the state from before them.
    pub fn atransform(&self, input: Value) -> impl Stream<Item = Result<Value>> + '_ {
        try_stream! {
            let mut registry = ChannelRegistry::open(&self.channel_templates);
            let seed = self.input.into_writes(input);
            let mut tasks = apply_writes_and_prepare_next_tasks(
                &self.processes,
                registry.channels_mut(),
                seed,
            );
            let mut step = 0usize;

            loop {
                if tasks.is_empty() {
                    break;
                }
                if step >= self.recursion_limit {
                    if self.recursion_limit_policy == RecursionLimitPolicy::Raise {
                        Err(EngineError::RecursionExhausted { limit: self.recursion_limit })?;
                    }
                    break;
                }

                let snapshot = Arc::new(registry.snapshot_values());
                let writes = run_step(tasks, snapshot, step, self.step_timeout).await?;
                let touched: HashSet<String> = writes.iter().map(|(name, _)| name.clone()).collect();

                tasks = apply_writes_and_prepare_next_tasks(
                    &self.processes,
                    registry.channels_mut(),
                    writes,
                );

                if let Some(output) = self.output.read_output(&registry, &touched) {
                    yield output;
                }
                step += 1;
            }

            registry.close();
        }
    }

    /// Synchronous-flavored counterpart of [`Pregel::atransform`]: still
    /// `async fn` under the hood (the step loop always runs on a tokio
    /// runtime), but named to mirror the two-flavor distinction in the
    /// design doc and collect into a `Vec` rather than a lazy stream.
    pub async fn transform(&self, input: Value) -> Result<Vec<Value>> {
        use futures::StreamExt;
        let stream = self.atransform(input);
        tokio::pin!(stream);
        let mut outputs = Vec::new();
        while let Some(chunk) = stream.next().await {
            outputs.push(chunk?);
        }
        Ok(outputs)
    }

    /// Alias for [`Pregel::transform`], matching the design doc's
    /// `stream` entry point (a sequence of intermediate outputs rather
    /// than just the final one).
    pub async fn stream(&self, input: Value) -> Result<Vec<Value>> {
        self.transform(input).await
    }
}
