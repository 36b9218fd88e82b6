//! The pure core of a step: applying writes, then deciding what runs next.
//!
//! This is deliberately a free function over plain data rather than a
//! method on any stateful type - the BSP step loop's correctness rests on
//! this function having no side effects beyond mutating the channels it is
//! handed, and no dependency on wall-clock time, task scheduling, or I/O.
//! [`crate::runner`] is the only caller and owns everything concurrent.

use crate::process::{Process, Subscription};
use pregel_channels::Channel;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One process selected to run in the next step, paired with the input it
/// should receive.
pub struct PlannedTask<'a> {
    pub process: &'a Process,
    pub input: Value,
}

/// Applies `pending_writes` to `channels`, then selects every process that
/// should run as a result.
///
/// # Algorithm
///
/// 1. Group writes by destination channel, preserving arrival order within
///    a channel's group.
/// 2. For each destination, call [`Channel::update`]. A destination naming
///    no known channel is logged via `tracing::warn!` and otherwise
///    ignored - a non-fatal diagnostic, not a topology error, since it
///    cannot be distinguished from a process that intentionally writes
///    conditionally.
/// 3. Record which channel names actually changed (`update` returned
///    `true`).
/// 4. For each process, in declaration order: an `Invoke` runs if any
///    channel in its subscription changed and every subscribed channel
///    currently holds a value (`Channel::is_available`); a `Batch` runs
///    under the same rule applied to its single channel, with the input
///    built by reading that channel's sequence value. A process whose
///    input cannot be assembled (an `EmptyChannel` among its reads) is
///    skipped for the step, not failed.
pub fn apply_writes_and_prepare_next_tasks<'a>(
    processes: &'a [Process],
    channels: &mut HashMap<String, Box<dyn Channel>>,
    pending_writes: Vec<(String, Value)>,
) -> Vec<PlannedTask<'a>> {
    let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
    for (channel, value) in pending_writes {
        grouped.entry(channel).or_default().push(value);
    }

    let mut updated: HashSet<String> = HashSet::new();
    for (name, values) in grouped {
        match channels.get_mut(&name) {
            Some(channel) => match channel.update(values) {
                Ok(true) => {
                    updated.insert(name);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(channel = %name, error = %err, "rejected update");
                }
            },
            None => {
                tracing::warn!(channel = %name, "write to channel with no subscriber");
            }
        }
    }

    processes
        .iter()
        .filter_map(|process| plan_task(process, &mut *channels, &updated))
        .collect()
}

fn plan_task<'a>(
    process: &'a Process,
    channels: &mut HashMap<String, Box<dyn Channel>>,
    updated: &HashSet<String>,
) -> Option<PlannedTask<'a>> {
    match process {
        Process::Invoke { subscription, .. } => {
            let names = subscription.channel_names();
            if !names.iter().any(|n| updated.contains(*n)) {
                return None;
            }
            let input = match subscription {
                Subscription::Raw(name) => channels.get(name)?.get().ok()?,
                Subscription::Record(map) => {
                    let mut record = serde_json::Map::new();
                    for (key, channel_name) in map {
                        record.insert(key.clone(), channels.get(channel_name)?.get().ok()?);
                    }
                    Value::Object(record)
                }
            };
            Some(PlannedTask { process, input })
        }
        Process::Batch { channel, key, .. } => {
            if !updated.contains(channel) {
                return None;
            }
            let sequence = channels.get(channel)?.get().ok()?;
            let items = sequence.as_array()?.clone();
            let input = match key {
                Some(key) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| {
                            let mut record = serde_json::Map::new();
                            record.insert(key.clone(), item);
                            Value::Object(record)
                        })
                        .collect(),
                ),
                None => Value::Array(items),
            };
            // Gives Inbox-backed channels their documented "clears once
            // consumed" behavior; a no-op for every other discipline.
            if let Some(ch) = channels.get_mut(channel) {
                ch.consume();
            }
            Some(PlannedTask { process, input })
        }
    }
}
