//! # pregel-channels - Channel state containers for step-synchronous execution
//!
//! A **channel** is a typed, stateful cell with a domain-specific reduction
//! rule. It is the only way state crosses a step boundary: writes produced
//! during step N are buffered, applied to the relevant channels all at
//! once, and only then become visible to the processes running in step
//! N+1. Channels are immutable for the duration of a step.
//!
//! ## Channel disciplines
//!
//! - [`LastValueChannel`] - last write wins; rejects more than one write
//!   per step.
//! - [`TopicChannel`] - append-only log, kept for the life of the scope.
//! - [`InboxChannel`] - append-only log that clears itself once a
//!   subscriber consumes it.
//! - [`AccumulatorChannel`] - monoidal fold seeded with an explicit
//!   identity (e.g. sum starting at zero).
//! - [`BinaryOperatorChannel`] - associative reduction with no identity;
//!   empty until the first write.
//!
//! All four share the same [`Channel`] trait, so a registry can hold them
//! as trait objects (`Box<dyn Channel>`) without the rest of the engine
//! caring which discipline backs a given name.
//!
//! ## Checkpointing
//!
//! [`checkpoint`] is a designated extension point, not part of THE CORE:
//! a run's correctness never depends on a checkpointer being attached.
//! [`checkpoint::CheckpointSaver`] lets a host application snapshot and
//! restore channel state between steps for its own purposes (crash
//! recovery, inspection).
//!
//! ## See Also
//!
//! - Pregel paper: <https://research.google/pubs/pub37252/>

pub mod channels;
pub mod checkpoint;
pub mod error;

pub use channels::{
    AccumulatorChannel, BinaryOperatorChannel, Channel, InboxChannel, LastValueChannel, ReducerFn,
    TopicChannel,
};
pub use checkpoint::{CheckpointSaver, InMemoryCheckpointSaver, Snapshot};
pub use error::{ChannelError, Result};
