//! Translating between the engine's single-`Value` public surface and the
//! channel writes/reads that drive a run internally.
//!
//! A topology's `input` and `output` are each either a single channel name
//! (the caller passes/receives a bare value) or a record of named channels
//! (the caller passes/receives a JSON object). This module is the only
//! place that distinction is resolved.

use crate::registry::ChannelRegistry;
use serde_json::Value;
use std::collections::HashSet;

/// Declares which channels an engine accepts as input or exposes as
/// output.
#[derive(Debug, Clone)]
pub enum ValueShape {
    /// A single channel; the caller's value maps directly onto it.
    Single(String),
    /// Several channels; the caller's value is a JSON object keyed by
    /// channel name.
    Record(Vec<String>),
}

impl ValueShape {
    pub fn channel_names(&self) -> Vec<&str> {
        match self {
            ValueShape::Single(name) => vec![name.as_str()],
            ValueShape::Record(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// Converts a caller-supplied input value into the initial batch of
    /// channel writes.
    ///
    /// For [`ValueShape::Record`], `input` must be a JSON object whose keys
    /// are a subset of the declared channel names; any declared channel
    /// absent from the object simply receives no write for step 0.
    pub fn into_writes(&self, input: Value) -> Vec<(String, Value)> {
        match self {
            ValueShape::Single(name) => vec![(name.clone(), input)],
            ValueShape::Record(names) => match input {
                Value::Object(map) => names
                    .iter()
                    .filter_map(|name| map.get(name).cloned().map(|v| (name.clone(), v)))
                    .collect(),
                other => {
                    tracing::warn!(
                        "record-shaped input expects a JSON object, got {other}; no writes produced"
                    );
                    vec![]
                }
            },
        }
    }

    /// Reads the step's output value out of a registry, if this step's
    /// writes actually touched a name this shape cares about.
    ///
    /// `touched` is the set of channel names targeted by the step's
    /// pending writes (whether or not the write actually changed the
    /// channel's value, or even routed to a known channel) - matching
    /// the design doc's "if any pending write targeted that name, yield
    /// the channel's current value." A channel holding a value left over
    /// from an earlier step, but untouched this step, must not be
    /// re-emitted.
    pub fn read_output(&self, registry: &ChannelRegistry, touched: &HashSet<String>) -> Option<Value> {
        match self {
            ValueShape::Single(name) => {
                if !touched.contains(name) {
                    return None;
                }
                registry.get(name)?.get().ok()
            }
            ValueShape::Record(names) => {
                let mut record = serde_json::Map::new();
                for name in names {
                    if !touched.contains(name) {
                        continue;
                    }
                    if let Some(value) = registry.get(name).and_then(|c| c.get().ok()) {
                        record.insert(name.clone(), value);
                    }
                }
                if record.is_empty() {
                    None
                } else {
                    Some(Value::Object(record))
                }
            }
        }
    }
}
