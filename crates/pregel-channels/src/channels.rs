//! Channel implementations.
//!
//! A channel is a typed, stateful cell with a domain-specific reduction rule.
//! It receives a batch of writes at the end of a step and produces a single
//! current value on read. The step loop never mutates a channel directly;
//! it always goes through [`Channel::update`] so that the reduction
//! discipline is the only thing that decides what "the value" means.
//!
//! Four disciplines are provided out of the box, matching the ones observed
//! in practice:
//!
//! - [`LastValueChannel`] - last write wins, at most one write per step.
//! - [`TopicChannel`] / [`InboxChannel`] - accumulate writes as a list;
//!   `TopicChannel` keeps history forever, `InboxChannel` clears itself once
//!   a subscriber consumes it.
//! - [`AccumulatorChannel`] - monoidal fold seeded with an explicit identity.
//! - [`BinaryOperatorChannel`] - associative reduction with no required
//!   identity; the first write seeds the value.
//!
//! None of this is exhaustive - anything implementing the four-method
//! [`Channel`] contract can be registered. The two guarantees the rest of
//! the engine relies on are: (a) `update` is called with all writes for a
//! step in insertion order, and (b) after a successful `update`, `get` does
//! not fail until the registry is torn down.

use crate::error::{ChannelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Base trait implemented by every channel discipline.
pub trait Channel: Send + Sync + Debug {
    /// Returns the channel's current value.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Empty`] if the channel has never received a
    /// write. Callers in the step loop treat this as "no value yet" rather
    /// than a hard failure.
    fn get(&self) -> Result<serde_json::Value>;

    /// Applies a batch of writes collected during one step.
    ///
    /// Values arrive in insertion order for a single producer, but the
    /// relative order across producers writing to the same channel in the
    /// same step is not guaranteed. Returns `true` if the channel's value
    /// changed as a result.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidUpdate`] if the batch violates the
    /// channel's reduction discipline.
    fn update(&mut self, values: Vec<serde_json::Value>) -> Result<bool>;

    /// Serializes the channel's state for a checkpoint snapshot.
    fn checkpoint(&self) -> Result<serde_json::Value>;

    /// Restores the channel's state from a checkpoint snapshot.
    fn from_checkpoint(&mut self, checkpoint: serde_json::Value) -> Result<()>;

    /// Returns whether the channel currently holds a value.
    fn is_available(&self) -> bool {
        self.get().is_ok()
    }

    /// Notifies the channel that a subscriber just read it this step.
    ///
    /// Most disciplines ignore this. [`InboxChannel`] uses it to clear
    /// itself once consumed. Returns `true` if consuming changed the value.
    fn consume(&mut self) -> bool {
        false
    }

    /// Clones the channel behind a trait object, for seeding a fresh
    /// registry scope from a topology-time template.
    fn clone_box(&self) -> Box<dyn Channel>;
}

/// LastValue channel: the current value is the last write, nothing more.
///
/// Receives at most one value per step - a batch with more than one
/// element is a topology/process bug and is rejected rather than silently
/// picking a winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastValueChannel {
    value: Option<serde_json::Value>,
}

impl LastValueChannel {
    /// Creates an empty LastValue channel.
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Creates a LastValue channel already seeded with `value`.
    pub fn with_value(value: serde_json::Value) -> Self {
        Self { value: Some(value) }
    }
}

impl Default for LastValueChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for LastValueChannel {
    fn get(&self) -> Result<serde_json::Value> {
        self.value.clone().ok_or(ChannelError::Empty)
    }

    fn update(&mut self, values: Vec<serde_json::Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        if values.len() > 1 {
            return Err(ChannelError::InvalidUpdate(
                "LastValue channel can receive only one value per step".to_string(),
            ));
        }
        self.value = values.into_iter().next();
        Ok(true)
    }

    fn checkpoint(&self) -> Result<serde_json::Value> {
        self.value.clone().ok_or(ChannelError::Empty)
    }

    fn from_checkpoint(&mut self, checkpoint: serde_json::Value) -> Result<()> {
        self.value = Some(checkpoint);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Topic channel: append-only log, never cleared by reads.
///
/// Every write is kept for the lifetime of the registry scope. `get`
/// returns the full history as a JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicChannel {
    values: Vec<serde_json::Value>,
}

impl TopicChannel {
    /// Creates an empty Topic channel.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Returns the accumulated values without JSON-wrapping them.
    pub fn get_all(&self) -> &[serde_json::Value] {
        &self.values
    }
}

impl Default for TopicChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for TopicChannel {
    fn get(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Array(self.values.clone()))
    }

    fn update(&mut self, values: Vec<serde_json::Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        self.values.extend(values);
        Ok(true)
    }

    fn checkpoint(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Array(self.values.clone()))
    }

    fn from_checkpoint(&mut self, checkpoint: serde_json::Value) -> Result<()> {
        match checkpoint {
            serde_json::Value::Array(arr) => {
                self.values = arr;
                Ok(())
            }
            _ => Err(ChannelError::Checkpoint(
                "Topic channel checkpoint must be an array".to_string(),
            )),
        }
    }

    fn is_available(&self) -> bool {
        !self.values.is_empty()
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Inbox channel: like [`TopicChannel`], but clears once a subscriber
/// consumes it.
///
/// Useful for a Batch process that should only ever see the writes made
/// since the last time it ran, not the channel's entire history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxChannel {
    values: Vec<serde_json::Value>,
}

impl InboxChannel {
    /// Creates an empty Inbox channel.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }
}

impl Default for InboxChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for InboxChannel {
    fn get(&self) -> Result<serde_json::Value> {
        if self.values.is_empty() {
            return Err(ChannelError::Empty);
        }
        Ok(serde_json::Value::Array(self.values.clone()))
    }

    fn update(&mut self, values: Vec<serde_json::Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        self.values.extend(values);
        Ok(true)
    }

    fn checkpoint(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Array(self.values.clone()))
    }

    fn from_checkpoint(&mut self, checkpoint: serde_json::Value) -> Result<()> {
        match checkpoint {
            serde_json::Value::Array(arr) => {
                self.values = arr;
                Ok(())
            }
            _ => Err(ChannelError::Checkpoint(
                "Inbox channel checkpoint must be an array".to_string(),
            )),
        }
    }

    fn is_available(&self) -> bool {
        !self.values.is_empty()
    }

    fn consume(&mut self) -> bool {
        if self.values.is_empty() {
            false
        } else {
            self.values.clear();
            true
        }
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Reducer function shared by [`AccumulatorChannel`] and
/// [`BinaryOperatorChannel`].
///
/// `Arc`, not `Box`: `clone_box` needs to clone the reducer along with the
/// rest of the channel's state when a fresh registry scope is opened from
/// a topology template, and a boxed closure isn't `Clone`.
pub type ReducerFn = Arc<dyn Fn(serde_json::Value, serde_json::Value) -> serde_json::Value + Send + Sync>;

/// Accumulator channel: a monoidal fold seeded with an explicit identity.
///
/// Unlike [`BinaryOperatorChannel`], the value is never empty - `get`
/// always succeeds and returns the identity until the first write arrives.
#[derive(Clone)]
pub struct AccumulatorChannel {
    identity: serde_json::Value,
    value: serde_json::Value,
    reducer: ReducerFn,
}

impl AccumulatorChannel {
    /// Creates an Accumulator seeded with `identity` and folded with
    /// `reducer`.
    pub fn new<F>(identity: serde_json::Value, reducer: F) -> Self
    where
        F: Fn(serde_json::Value, serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        Self {
            value: identity.clone(),
            identity,
            reducer: Arc::new(reducer),
        }
    }

    /// Numeric sum accumulator, seeded at zero.
    pub fn sum() -> Self {
        Self::new(serde_json::json!(0.0), |a, b| {
            serde_json::json!(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0))
        })
    }

    /// List-append accumulator, seeded at an empty array.
    pub fn append() -> Self {
        Self::new(serde_json::json!([]), append_reduce)
    }
}

fn append_reduce(a: serde_json::Value, b: serde_json::Value) -> serde_json::Value {
    let mut result = match a {
        serde_json::Value::Array(arr) => arr,
        other => vec![other],
    };
    match b {
        serde_json::Value::Array(arr) => result.extend(arr),
        other => result.push(other),
    }
    serde_json::Value::Array(result)
}

impl Debug for AccumulatorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccumulatorChannel")
            .field("identity", &self.identity)
            .field("value", &self.value)
            .finish()
    }
}

impl Channel for AccumulatorChannel {
    fn get(&self) -> Result<serde_json::Value> {
        Ok(self.value.clone())
    }

    fn update(&mut self, values: Vec<serde_json::Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        for val in values {
            self.value = (self.reducer)(self.value.clone(), val);
        }
        Ok(true)
    }

    fn checkpoint(&self) -> Result<serde_json::Value> {
        Ok(self.value.clone())
    }

    fn from_checkpoint(&mut self, checkpoint: serde_json::Value) -> Result<()> {
        self.value = checkpoint;
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// BinaryOperator channel: associative reduction with no required identity.
///
/// The first write seeds the value directly; subsequent writes fold into
/// it with the reducer. `get` fails with [`ChannelError::Empty`] until the
/// first write.
#[derive(Clone)]
pub struct BinaryOperatorChannel {
    value: Option<serde_json::Value>,
    reducer: ReducerFn,
}

impl BinaryOperatorChannel {
    /// Creates a BinaryOperator channel with a custom reducer.
    pub fn new<F>(reducer: F) -> Self
    where
        F: Fn(serde_json::Value, serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        Self {
            value: None,
            reducer: Arc::new(reducer),
        }
    }

    /// Numeric sum reducer (no identity - empty until first write).
    pub fn sum() -> Self {
        Self::new(|a, b| serde_json::json!(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)))
    }

    /// List-append reducer (no identity - empty until first write).
    pub fn append() -> Self {
        Self::new(append_reduce)
    }
}

impl Debug for BinaryOperatorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryOperatorChannel")
            .field("value", &self.value)
            .field("reducer", &"<function>")
            .finish()
    }
}

impl Channel for BinaryOperatorChannel {
    fn get(&self) -> Result<serde_json::Value> {
        self.value.clone().ok_or(ChannelError::Empty)
    }

    fn update(&mut self, values: Vec<serde_json::Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        let reduced = values.into_iter().reduce(|acc, val| (self.reducer)(acc, val));
        if let Some(new_value) = reduced {
            self.value = Some(match self.value.take() {
                Some(current) => (self.reducer)(current, new_value),
                None => new_value,
            });
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn checkpoint(&self) -> Result<serde_json::Value> {
        self.value.clone().ok_or(ChannelError::Empty)
    }

    fn from_checkpoint(&mut self, checkpoint: serde_json::Value) -> Result<()> {
        self.value = Some(checkpoint);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_replaces() {
        let mut channel = LastValueChannel::new();
        assert!(!channel.is_available());
        channel.update(vec![serde_json::json!(42)]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(42));
        channel.update(vec![serde_json::json!(100)]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(100));
    }

    #[test]
    fn last_value_rejects_multiple_writes_per_step() {
        let mut channel = LastValueChannel::new();
        let result = channel.update(vec![serde_json::json!(1), serde_json::json!(2)]);
        assert!(matches!(result, Err(ChannelError::InvalidUpdate(_))));
    }

    #[test]
    fn last_value_empty_update_is_noop() {
        let mut channel = LastValueChannel::new();
        assert!(!channel.update(vec![]).unwrap());
        assert!(!channel.is_available());
    }

    #[test]
    fn topic_accumulates_and_never_clears() {
        let mut channel = TopicChannel::new();
        channel.update(vec![serde_json::json!(1), serde_json::json!(2)]).unwrap();
        channel.update(vec![serde_json::json!(3)]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!([1, 2, 3]));
        assert_eq!(channel.get_all().len(), 3);
    }

    #[test]
    fn inbox_clears_on_consume() {
        let mut channel = InboxChannel::new();
        assert!(matches!(channel.get(), Err(ChannelError::Empty)));
        channel.update(vec![serde_json::json!("a"), serde_json::json!("b")]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(["a", "b"]));
        assert!(channel.consume());
        assert!(matches!(channel.get(), Err(ChannelError::Empty)));
        // Consuming an already-empty inbox is a no-op, not an error.
        assert!(!channel.consume());
    }

    #[test]
    fn accumulator_starts_at_identity() {
        let channel = AccumulatorChannel::sum();
        assert_eq!(channel.get().unwrap(), serde_json::json!(0.0));
    }

    #[test]
    fn accumulator_sum_folds_across_steps() {
        let mut channel = AccumulatorChannel::sum();
        channel
            .update(vec![serde_json::json!(1.0), serde_json::json!(2.0), serde_json::json!(3.0)])
            .unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(6.0));
        channel.update(vec![serde_json::json!(4.0)]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(10.0));
    }

    #[test]
    fn accumulator_append() {
        let mut channel = AccumulatorChannel::append();
        channel.update(vec![serde_json::json!("a")]).unwrap();
        channel.update(vec![serde_json::json!("b"), serde_json::json!("c")]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn binary_operator_empty_until_first_write() {
        let channel = BinaryOperatorChannel::sum();
        assert!(matches!(channel.get(), Err(ChannelError::Empty)));
    }

    #[test]
    fn binary_operator_sum() {
        let mut channel = BinaryOperatorChannel::sum();
        channel
            .update(vec![serde_json::json!(1.0), serde_json::json!(2.0)])
            .unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(3.0));
        channel.update(vec![serde_json::json!(4.0)]).unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!(7.0));
    }

    #[test]
    fn binary_operator_append_mixed_types() {
        let mut channel = BinaryOperatorChannel::append();
        channel
            .update(vec![serde_json::json!([1, "two", true]), serde_json::json!([null, 3.14])])
            .unwrap();
        assert_eq!(channel.get().unwrap(), serde_json::json!([1, "two", true, null, 3.14]));
    }

    #[test]
    fn checkpoint_round_trips_last_value() {
        let mut channel = LastValueChannel::new();
        channel.update(vec![serde_json::json!({"n": 42})]).unwrap();
        let snapshot = channel.checkpoint().unwrap();

        let mut restored = LastValueChannel::new();
        restored.from_checkpoint(snapshot).unwrap();
        assert_eq!(restored.get().unwrap(), serde_json::json!({"n": 42}));
    }

    #[test]
    fn clone_box_independent_from_original() {
        let mut original = LastValueChannel::new();
        original.update(vec![serde_json::json!(1)]).unwrap();
        let mut cloned = original.clone_box();
        cloned.update(vec![serde_json::json!(2)]).unwrap();
        assert_eq!(original.get().unwrap(), serde_json::json!(1));
        assert_eq!(cloned.get().unwrap(), serde_json::json!(2));
    }

    #[test]
    fn accumulator_clone_box_keeps_the_reducer_and_is_independent() {
        let mut original = AccumulatorChannel::sum();
        original.update(vec![serde_json::json!(1.0)]).unwrap();
        let mut cloned = original.clone_box();
        assert_eq!(cloned.get().unwrap(), serde_json::json!(1.0));
        cloned.update(vec![serde_json::json!(2.0)]).unwrap();
        assert_eq!(original.get().unwrap(), serde_json::json!(1.0));
        assert_eq!(cloned.get().unwrap(), serde_json::json!(3.0));
    }

    #[test]
    fn binary_operator_clone_box_keeps_the_reducer_and_is_independent() {
        let mut original = BinaryOperatorChannel::sum();
        original.update(vec![serde_json::json!(1.0)]).unwrap();
        let mut cloned = original.clone_box();
        assert_eq!(cloned.get().unwrap(), serde_json::json!(1.0));
        cloned.update(vec![serde_json::json!(2.0)]).unwrap();
        assert_eq!(original.get().unwrap(), serde_json::json!(1.0));
        assert_eq!(cloned.get().unwrap(), serde_json::json!(3.0));
    }
}
