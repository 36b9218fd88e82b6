//! Error types for channel operations.

use thiserror::Error;

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors that can occur while reading, writing, or snapshotting a channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// `get()` was called on a channel that has never received a write.
    ///
    /// The step loop treats this as a normal condition: a process that
    /// reads an empty channel is simply skipped for the step rather than
    /// failing the run. See [`crate::Channel::get`].
    #[error("channel is empty")]
    Empty,

    /// `update()` received a batch of writes that violates the channel's
    /// reduction discipline (e.g. more than one value for a LastValue
    /// channel in a single step).
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// A checkpoint snapshot could not be serialized or restored.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
