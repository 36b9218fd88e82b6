//! `ChannelRegistry`: the owned, scoped set of channels for one run.
//!
//! Channels live exactly as long as the registry. Python's source uses a
//! context manager (`with ChannelsManager(...)`, `async with
//! AsyncChannelsManager(...)`) to guarantee release on every exit path,
//! including exceptions. Rust's ownership model gives the same guarantee
//! for free: [`ChannelRegistry`] releases its channels in `Drop`, so a
//! panic, an early return, or a cancelled future all tear it down without
//! any explicit scope-exit code. The two "flavors" in the design doc
//! collapse to one type here; what differs is only whether `close`
//! (fire-and-forget) or `close_async` (awaits a checkpointer) is used.

use crate::error::Result;
use pregel_channels::checkpoint::{snapshot, CheckpointSaver, Snapshot};
use pregel_channels::Channel;
use std::collections::HashMap;

/// The live channel set for one run, instantiated from a topology's
/// channel templates.
pub struct ChannelRegistry {
    channels: HashMap<String, Box<dyn Channel>>,
}

impl ChannelRegistry {
    /// Instantiates a fresh channel for every entry in `templates` by
    /// cloning it (see [`Channel::clone_box`]), so that construction-time
    /// channel instances are never shared across runs.
    pub fn open(templates: &HashMap<String, Box<dyn Channel>>) -> Self {
        let channels = templates
            .iter()
            .map(|(name, template)| (name.clone(), template.clone_box()))
            .collect();
        tracing::debug!(count = templates.len(), "channel registry opened");
        Self { channels }
    }

    /// Looks up a channel by name.
    ///
    /// Unknown names are a topology validation bug, not a lookup-time
    /// concern - by the time a registry exists, every name any process
    /// or the engine's input/output declares has already been checked
    /// against the channel set.
    pub fn get(&self, name: &str) -> Option<&dyn Channel> {
        self.channels.get(name).map(|c| c.as_ref())
    }

    /// Direct mutable access to the underlying channel map, for callers
    /// driving [`crate::planner::apply_writes_and_prepare_next_tasks`]
    /// themselves rather than going through [`crate::engine::Pregel`].
    pub fn channels_mut(&mut self) -> &mut HashMap<String, Box<dyn Channel>> {
        &mut self.channels
    }

    /// Takes an immutable, owned snapshot of every channel's current
    /// value, for handing to concurrently-running tasks within a step.
    /// Empty channels are simply absent from the map.
    pub fn snapshot_values(&self) -> HashMap<String, serde_json::Value> {
        self.channels
            .iter()
            .filter_map(|(name, chan)| chan.get().ok().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Releases the registry without persisting anything.
    pub fn close(self) {
        tracing::debug!(count = self.channels.len(), "channel registry closed");
    }

    /// Releases the registry after persisting a checkpoint snapshot under
    /// `thread_id`. Used by the cooperative-async flavor when a
    /// checkpointer is attached; a no-op saver still pays for the
    /// snapshot but never blocks on real I/O.
    pub async fn close_async(self, thread_id: &str, saver: &dyn CheckpointSaver) -> Result<()> {
        let snap: Snapshot = snapshot(&self.channels);
        saver.save(thread_id, snap).await?;
        tracing::debug!(count = self.channels.len(), thread_id, "channel registry closed (checkpointed)");
        Ok(())
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        // Best-effort: release never raises. Explicit `close`/`close_async`
        // cover the success path; this only fires on panics or early
        // drops (e.g. a cancelled future), matching "releases must not
        // raise; they may log."
        tracing::trace!("channel registry dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregel_channels::LastValueChannel;

    fn templates() -> HashMap<String, Box<dyn Channel>> {
        let mut map: HashMap<String, Box<dyn Channel>> = HashMap::new();
        map.insert("a".to_string(), Box::new(LastValueChannel::new()));
        map
    }

    #[test]
    fn open_instantiates_fresh_channels_per_scope() {
        let templates = templates();
        let mut first = ChannelRegistry::open(&templates);
        first
            .channels_mut()
            .get_mut("a")
            .unwrap()
            .update(vec![serde_json::json!(1)])
            .unwrap();

        let second = ChannelRegistry::open(&templates);
        assert!(second.get("a").unwrap().get().is_err(), "fresh scope starts empty");
        assert_eq!(first.get("a").unwrap().get().unwrap(), serde_json::json!(1));
    }

    #[test]
    fn unknown_name_is_none_not_panic() {
        let registry = ChannelRegistry::open(&templates());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn snapshot_values_omits_empty_channels() {
        let registry = ChannelRegistry::open(&templates());
        assert!(registry.snapshot_values().is_empty());
    }
}
