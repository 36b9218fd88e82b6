//! The concurrent half of a step: fan out every planned task, join on the
//! first failure or the step timeout, and cancel whatever is still
//! inflight either way.
//!
//! Dropping a `Vec<JoinHandle<_>>` does **not** cancel the tasks it spawned
//! - a handle is only a join point, not an owner. Cancellation requires an
//! explicit [`tokio::task::AbortHandle::abort`] call, so this module keeps
//! abort handles alongside the join handles and fires them on every exit
//! path except "everything finished".

use crate::error::{EngineError, Result};
use crate::planner::PlannedTask;
use crate::process::RunContext;
use futures::future::select_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Runs every task planned for one step concurrently, honoring
/// first-failure-cancels-the-rest and an optional per-step timeout.
///
/// Returns the concatenation of every task's writes, in task-completion
/// order (not declaration order - the order two concurrently-finishing
/// tasks' writes interleave is intentionally left to the scheduler, per
/// the design doc's "write ordering across producers is unspecified").
pub async fn run_step(
    tasks: Vec<PlannedTask<'_>>,
    snapshot: Arc<HashMap<String, Value>>,
    step: usize,
    step_timeout: Option<Duration>,
) -> Result<Vec<(String, Value)>> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let ctx = RunContext::new(step, snapshot);
    let mut handles = Vec::with_capacity(tasks.len());
    let mut abort_handles = Vec::with_capacity(tasks.len());
    let mut names = Vec::with_capacity(tasks.len());

    for task in tasks {
        let executor = task.process.executor().clone();
        let input = task.input;
        let ctx = ctx.clone();
        let handle = tokio::spawn(async move { executor.execute(input, ctx).await });
        abort_handles.push(handle.abort_handle());
        names.push(task.process.name().to_string());
        handles.push(handle);
    }

    let run_all = async {
        let mut writes = Vec::new();
        let mut remaining = handles;
        let mut remaining_names = names;
        loop {
            if remaining.is_empty() {
                return Ok(writes);
            }
            let (result, index, rest) = select_all(remaining).await;
            let process = remaining_names.remove(index);
            remaining = rest;

            match result {
                Ok(Ok(task_writes)) => writes.extend(task_writes),
                Ok(Err(source)) => {
                    for abort in &abort_handles {
                        abort.abort();
                    }
                    return Err(EngineError::UserFailure { process, step, source });
                }
                Err(join_err) => {
                    for abort in &abort_handles {
                        abort.abort();
                    }
                    return Err(EngineError::UserFailure {
                        process,
                        step,
                        source: anyhow::Error::from(join_err),
                    });
                }
            }
        }
    };

    match step_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, run_all).await {
            Ok(result) => result,
            Err(_) => {
                for abort in &abort_handles {
                    abort.abort();
                }
                Err(EngineError::Timeout { step, timeout })
            }
        },
        None => run_all.await,
    }
}
