//! Topology validation: the checks a [`crate::engine::Pregel`] runs once,
//! at construction, so that a bad wiring mistake is a construction-time
//! error rather than a run-time surprise three steps in.

use crate::error::{EngineError, Result};
use crate::io::ValueShape;
use crate::process::{Process, Subscription};
use pregel_channels::Channel;
use std::collections::{HashMap, HashSet};

/// Checks a topology for internal consistency.
///
/// - Every channel name referenced by a process, by `input`, or by
///   `output` must exist in `channels`.
/// - At least one process must subscribe to an `input` channel, or the
///   run could never make progress.
/// - Every `output` channel must be written to by at least one process's
///   declared `writes_to`.
/// - An `Invoke` process's [`Subscription::Record`] must not be empty.
pub fn validate(
    channels: &HashMap<String, Box<dyn Channel>>,
    processes: &[Process],
    input: &ValueShape,
    output: &ValueShape,
) -> Result<()> {
    let known: HashSet<&str> = channels.keys().map(String::as_str).collect();

    for name in input.channel_names() {
        if !known.contains(name) {
            return Err(topology(format!("input channel '{name}' is not a known channel")));
        }
    }
    for name in output.channel_names() {
        if !known.contains(name) {
            return Err(topology(format!("output channel '{name}' is not a known channel")));
        }
    }

    let mut written: HashSet<&str> = HashSet::new();
    for process in processes {
        for name in process.reads_from() {
            if !known.contains(name) {
                return Err(topology(format!(
                    "process '{}' reads unknown channel '{name}'",
                    process.name()
                )));
            }
        }
        for name in process.writes_to() {
            if !known.contains(name.as_str()) {
                return Err(topology(format!(
                    "process '{}' writes unknown channel '{name}'",
                    process.name()
                )));
            }
            written.insert(name.as_str());
        }
        if let Process::Invoke { subscription: Subscription::Record(map), .. } = process {
            if map.is_empty() {
                return Err(topology(format!(
                    "process '{}' has an empty record subscription",
                    process.name()
                )));
            }
        }
    }

    let input_names: HashSet<&str> = input.channel_names().into_iter().collect();
    let any_process_reads_input = processes
        .iter()
        .any(|p| p.reads_from().iter().any(|name| input_names.contains(name)));
    if !processes.is_empty() && !any_process_reads_input {
        return Err(topology(
            "no process subscribes to an input channel; the run can never make progress".to_string(),
        ));
    }

    for name in output.channel_names() {
        if !written.contains(name) {
            return Err(topology(format!(
                "output channel '{name}' is never written by any process"
            )));
        }
    }

    Ok(())
}

fn topology(message: String) -> EngineError {
    EngineError::Topology(message)
}
