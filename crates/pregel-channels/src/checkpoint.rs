//! Checkpoint persistence extension point.
//!
//! THE CORE step loop never calls anything in this module - a run is
//! correct whether or not a checkpointer is attached. [`CheckpointSaver`]
//! exists so that a host application can opt into snapshotting channel
//! state between steps (for crash recovery or inspection) without the
//! core engine knowing or caring which storage backend is behind it.
//!
//! [`InMemoryCheckpointSaver`] is the reference implementation, useful for
//! tests and for demonstrating the trait; production backends (a
//! database, an object store) are expected to implement [`CheckpointSaver`]
//! themselves.

use crate::channels::Channel;
use crate::error::{ChannelError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A point-in-time snapshot of every channel's checkpointed value, keyed
/// by channel name.
pub type Snapshot = HashMap<String, serde_json::Value>;

/// Serializes every channel in `channels` into a [`Snapshot`].
///
/// Channels that are still empty (never written to) are skipped rather
/// than causing the whole snapshot to fail.
pub fn snapshot(channels: &HashMap<String, Box<dyn Channel>>) -> Snapshot {
    channels
        .iter()
        .filter_map(|(name, chan)| chan.checkpoint().ok().map(|v| (name.clone(), v)))
        .collect()
}

/// Restores `channels` in place from a previously captured [`Snapshot`].
///
/// Unknown channel names in the snapshot are ignored; channels named in
/// `channels` but absent from the snapshot are left untouched.
pub fn restore(channels: &mut HashMap<String, Box<dyn Channel>>, snapshot: Snapshot) -> Result<()> {
    for (name, value) in snapshot {
        if let Some(chan) = channels.get_mut(&name) {
            chan.from_checkpoint(value)?;
        }
    }
    Ok(())
}

/// Storage backend for checkpoint [`Snapshot`]s, addressed by an
/// application-defined thread/run identifier.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Persists `snapshot` under `thread_id`, replacing any prior value.
    async fn save(&self, thread_id: &str, snapshot: Snapshot) -> Result<()>;

    /// Returns the most recently saved snapshot for `thread_id`, if any.
    async fn load(&self, thread_id: &str) -> Result<Option<Snapshot>>;
}

/// Reference [`CheckpointSaver`] backed by an in-process `HashMap`.
///
/// Snapshots do not survive past the process; this exists for tests and
/// as a template for real backends, not as a production persistence layer.
#[derive(Default)]
pub struct InMemoryCheckpointSaver {
    store: Mutex<HashMap<String, Snapshot>>,
}

impl InMemoryCheckpointSaver {
    /// Creates an empty in-memory checkpoint store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn save(&self, thread_id: &str, snapshot: Snapshot) -> Result<()> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| ChannelError::Checkpoint("checkpoint store lock poisoned".to_string()))?;
        store.insert(thread_id.to_string(), snapshot);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Snapshot>> {
        let store = self
            .store
            .lock()
            .map_err(|_| ChannelError::Checkpoint("checkpoint store lock poisoned".to_string()))?;
        Ok(store.get(thread_id).cloned())
    }
}
