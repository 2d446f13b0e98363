//! Planning and write application
//!
//! The two halves of the superstep barrier:
//!
//! - [`plan_runnable`] decides which nodes run next, by comparing each
//!   trigger channel's current version against the version the node last
//!   ran against (`versions_seen`). On a fresh run only the input channels
//!   have versions, so exactly the nodes triggered by input wake first.
//! - [`apply_writes`] validates a step's pending frame against trial copies
//!   of the touched channels. The caller swaps the trial copies in only
//!   when every channel accepted its writes, which is what makes a step
//!   atomic: an invalid update or node failure commits nothing.

use crate::error::{GraphError, Result};
use crate::node::NodeSpec;
use crate::pregel::types::PlannedNode;
use pregel_checkpoint::{Channel, ChannelVersion, ChannelVersions, VersionsSeen};
use serde_json::Value;
use std::collections::HashMap;

/// Compute the runnable set for the next step
///
/// A node is runnable iff at least one of its trigger channels has a
/// version newer than what the node has seen. Nodes are emitted in
/// declaration order, which keeps scheduling deterministic; ordering is
/// irrelevant for correctness because all writes are buffered until the
/// barrier.
pub(crate) fn plan_runnable(
    nodes: &[(String, NodeSpec)],
    versions: &ChannelVersions,
    seen: &VersionsSeen,
) -> Vec<PlannedNode> {
    let null_version = ChannelVersion::default();
    let mut runnable = Vec::new();

    for (name, spec) in nodes {
        let node_seen = seen.get(name);
        let mut triggered = false;
        let mut triggers_seen = ChannelVersions::new();

        for channel in spec.triggers() {
            let current = versions.get(&channel).copied().unwrap_or(null_version);
            let last_seen = node_seen
                .and_then(|m| m.get(&channel))
                .copied()
                .unwrap_or(null_version);
            if current > last_seen {
                triggered = true;
            }
            triggers_seen.insert(channel, current);
        }

        if triggered {
            runnable.push(PlannedNode {
                name: name.clone(),
                triggers_seen,
            });
        }
    }

    runnable
}

/// Validate a pending frame against trial copies of the touched channels
///
/// Writes are grouped by target channel (in first-write order) and each
/// group is applied to a clone of the live channel, so `update` runs at
/// most once per channel per step. Returns the trial copies that changed;
/// the live channel map is never mutated here.
///
/// # Errors
///
/// [`GraphError::InvalidUpdate`] if any channel rejects its writes; the
/// returned error names the channel and nothing is committed.
pub(crate) fn apply_writes(
    channels: &HashMap<String, Box<dyn Channel>>,
    writes: &[(String, Value)],
) -> Result<HashMap<String, Box<dyn Channel>>> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<Value>> = HashMap::new();
    for (channel, value) in writes {
        let entry = grouped.entry(channel.as_str()).or_default();
        if entry.is_empty() {
            order.push(channel.as_str());
        }
        entry.push(value.clone());
    }

    let mut committed: HashMap<String, Box<dyn Channel>> = HashMap::new();
    for channel_name in order {
        let values = grouped.remove(channel_name).unwrap_or_default();
        let Some(live) = channels.get(channel_name) else {
            return Err(GraphError::Validation(format!(
                "write targets unknown channel '{channel_name}'"
            )));
        };
        let mut trial = live.clone_box();
        match trial.update(values) {
            Ok(true) => {
                committed.insert(channel_name.to_string(), trial);
            }
            Ok(false) => {}
            Err(err) => return Err(GraphError::channel_update(channel_name, err)),
        }
    }

    Ok(committed)
}

/// The version assigned to every channel touched in the next commit
pub(crate) fn next_version(versions: &ChannelVersions) -> ChannelVersion {
    versions
        .values()
        .max()
        .copied()
        .unwrap_or_default()
        .next()
}
