//! # pregel-core - Superstep execution for channel-connected graphs
//!
//! A runtime for executing computation graphs as repeated, synchronous
//! supersteps in the Pregel/BSP style. Named nodes (pure or effectful
//! transducers) communicate exclusively through named channels: on each
//! step, every node whose subscribed channels received an update in the
//! previous step runs in parallel, and its outputs become channel updates
//! visible only in the next step.
//!
//! The pieces:
//!
//! - [`node`] - the node contract: subscriptions, triggers, callables,
//!   writers, declared through [`node::NodeBuilder`]
//! - [`pregel`] - the engine: planner, parallel executor, run loop, and the
//!   caller-facing [`pregel::Pregel`] application type with
//!   `invoke`/`batch`/`stream`
//! - [`config`] - per-invocation [`RunConfig`]
//! - [`reserved`] - engine-owned channel names (`is_last_step`, defaults)
//!
//! Channel variants and checkpoint persistence live in the companion
//! `pregel-checkpoint` crate and are re-exported here for convenience.
//! Higher-level graph builders compile their node/edge declarations down to
//! the same primitives: one channel per state field, one node per unit of
//! work; the engine is unaware of anything above channels and nodes.

pub mod config;
pub mod error;
pub mod node;
pub mod pregel;
pub mod reserved;

pub use config::RunConfig;
pub use error::{GraphError, Result};
pub use node::{NodeBuilder, NodeExecutor, NodeSpec};
pub use pregel::{Pregel, PregelBuilder, DEFAULT_RECURSION_LIMIT};

pub use pregel_checkpoint::{
    BinaryOperatorChannel, Channel, ChannelVersion, Checkpoint, CheckpointConfig,
    CheckpointSaver, ContextChannel, InMemorySaver, LastValueChannel, ScopedResource,
    TopicChannel,
};
