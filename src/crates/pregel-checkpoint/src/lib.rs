//! # pregel-checkpoint - Channels and state persistence for superstep graphs
//!
//! This crate holds the two state-bearing halves of the pregel-rs engine:
//!
//! - **Channels** - typed value cells with per-variant update semantics.
//!   Channels are the only medium nodes communicate through; visibility is
//!   step-quantized (writes from step *n* are readable from step *n+1*).
//! - **Checkpoints** - immutable snapshots of all channel state at the end
//!   of a committed step, keyed by thread id, plus the [`CheckpointSaver`]
//!   store interface and an in-memory reference backend.
//!
//! ## Channel variants
//!
//! | Variant | Read value | Update rule |
//! |---|---|---|
//! | [`LastValueChannel`] | last written value | at most one write per step |
//! | [`TopicChannel`] | sequence of values | appends; many writes per step |
//! | [`BinaryOperatorChannel`] | fold of writes into a seed | combines via an associative op |
//! | [`ContextChannel`] | run-scoped resource | not writable |
//!
//! Every variant implements the four-method [`Channel`] contract
//! (`get`/`update`/`checkpoint`/`restore`) behind one object-safe trait, so
//! new kinds slot in without touching the engine.
//!
//! ## Checkpoint protocol
//!
//! After each committed step the engine snapshots channels into a
//! [`Checkpoint`] and hands it to the configured [`CheckpointSaver`].
//! Stores are keyed by `thread_id`; each thread is a linear history that a
//! later invocation can resume, rewind, or fork. [`InMemorySaver`] is the
//! reference implementation; SQL or other persistent backends implement the
//! same two-method trait and use the [`serializer`] protocol for their byte
//! encoding.

pub mod channels;
pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use channels::{
    BinaryOperatorChannel, Channel, ContextChannel, LastValueChannel, ReducerFn, ScopedResource,
    TopicChannel,
};
pub use checkpoint::{ChannelVersion, ChannelVersions, Checkpoint, CheckpointConfig, VersionsSeen};
pub use error::{CheckpointError, Result};
pub use memory::InMemorySaver;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::CheckpointSaver;
