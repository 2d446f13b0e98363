//! Checkpoint store interface
//!
//! [`CheckpointSaver`] is the one stateful dependency of the superstep
//! engine. Backends implement `put`/`get` keyed by thread id; the engine
//! treats every backend identically, whether it keeps checkpoints in memory,
//! an embedded SQL database, or anything else.
//!
//! ## Contract
//!
//! - `put` must be atomic; concurrent puts against the same thread resolve
//!   to last-put-wins.
//! - Within a thread, the committed sequence of checkpoints is strictly
//!   monotonic in `step`. Interleaving of concurrent runs on one thread is
//!   undefined at the application layer; the store only guarantees each
//!   individual `put` lands whole.
//! - `get` with only a `thread_id` returns the latest checkpoint for that
//!   thread; a pinned `step` selects a specific historical one.
//!
//! A persistent backend stores one record per
//! `(thread_id, step, channel_name, value_blob, version)` and reassembles
//! the latest step's full record set into a [`Checkpoint`] on read. The blob
//! encoding is channel-defined (see
//! [`Channel::checkpoint`](crate::channels::Channel::checkpoint)); the
//! [`serializer`](crate::serializer) module covers whole-checkpoint
//! encodings for such backends.

use crate::checkpoint::{Checkpoint, CheckpointConfig};
use crate::error::Result;
use async_trait::async_trait;

/// Storage backend for checkpoints, keyed by thread
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch a checkpoint
    ///
    /// Returns the latest checkpoint for `config.thread_id`, or the one at
    /// `config.step` when pinned. `None` when the thread has no history.
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>>;

    /// Persist a checkpoint atomically
    ///
    /// Last put wins per thread. A failed put must leave the previously
    /// stored history unchanged.
    async fn put(&self, config: &CheckpointConfig, checkpoint: Checkpoint) -> Result<()>;
}
