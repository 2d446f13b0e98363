//! Checkpoint data structures
//!
//! A [`Checkpoint`] is an immutable snapshot of every channel's state at the
//! end of a committed superstep, keyed by a thread. Within a thread the
//! sequence of checkpoints is strictly monotonic in `step`, which makes a
//! thread a linear, resumable history: a run can be paused after any step,
//! resumed later, forked onto a new thread id, or retried after an error
//! against the last successfully committed state.
//!
//! Besides the channel snapshots, a checkpoint records two version maps:
//!
//! - `channel_versions` - a monotonic counter per channel, bumped whenever a
//!   committed frame touches the channel
//! - `versions_seen` - per node, the trigger-channel versions that node last
//!   ran against
//!
//! The planner compares the two to decide which nodes have new data and are
//! therefore runnable in the next step. Both maps must survive persistence,
//! otherwise a resumed run could not tell which nodes already consumed which
//! updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Monotonic version counter for a single channel
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ChannelVersion(pub u64);

impl ChannelVersion {
    /// The next version in sequence
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Mapping from channel name to version
pub type ChannelVersions = HashMap<String, ChannelVersion>;

/// Mapping from node name to the channel versions it last ran against
pub type VersionsSeen = HashMap<String, ChannelVersions>;

/// Snapshot of all channel state at the end of a committed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version (currently 1)
    pub v: u32,

    /// Step index this checkpoint was committed at; strictly monotonic
    /// within a thread
    pub step: u64,

    /// Timestamp of the commit
    pub ts: DateTime<Utc>,

    /// Channel-defined snapshots, keyed by channel name
    ///
    /// Channels with nothing to persist (empty, or unpersistable variants
    /// like context channels) are absent.
    pub channel_values: HashMap<String, serde_json::Value>,

    /// Version of each channel at commit time
    pub channel_versions: ChannelVersions,

    /// Per-node record of the trigger versions already consumed
    pub versions_seen: VersionsSeen,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a checkpoint from the state committed at `step`
    pub fn new(
        step: u64,
        channel_values: HashMap<String, serde_json::Value>,
        channel_versions: ChannelVersions,
        versions_seen: VersionsSeen,
    ) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            step,
            ts: Utc::now(),
            channel_values,
            channel_versions,
            versions_seen,
        }
    }

    /// Create an empty checkpoint at step zero
    pub fn empty() -> Self {
        Self::new(0, HashMap::new(), HashMap::new(), HashMap::new())
    }
}

/// Identifies a checkpoint (or the latest one) within a thread
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Thread the checkpoint belongs to; required for store operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Pin a specific step; `None` selects the latest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
}

impl CheckpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread id
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Pin a specific step
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_increments() {
        let v = ChannelVersion::default();
        assert_eq!(v.next(), ChannelVersion(1));
        assert_eq!(v.next().next(), ChannelVersion(2));
        assert!(v.next() > v);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let mut values = HashMap::new();
        values.insert("output".to_string(), json!(3));
        let mut versions = HashMap::new();
        versions.insert("output".to_string(), ChannelVersion(2));
        let mut seen = HashMap::new();
        seen.insert("one".to_string(), versions.clone());

        let checkpoint = Checkpoint::new(4, values, versions, seen);
        let encoded = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.v, Checkpoint::CURRENT_VERSION);
        assert_eq!(decoded.step, 4);
        assert_eq!(decoded.channel_values["output"], json!(3));
        assert_eq!(decoded.channel_versions["output"], ChannelVersion(2));
        assert_eq!(decoded.versions_seen["one"]["output"], ChannelVersion(2));
    }

    #[test]
    fn test_checkpoint_config_builder() {
        let config = CheckpointConfig::new().with_thread_id("thread-1").with_step(7);
        assert_eq!(config.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(config.step, Some(7));
    }
}
