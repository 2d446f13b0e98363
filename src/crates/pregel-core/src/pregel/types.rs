//! Execution-unit types for one superstep

use crate::node::{ChannelWrite, NodeExecutor};
use pregel_checkpoint::ChannelVersions;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A node picked by the planner for the next step, with the trigger
/// versions it is running against
#[derive(Debug, Clone)]
pub(crate) struct PlannedNode {
    pub name: String,
    /// trigger channel -> version at planning time; recorded into
    /// `versions_seen` once the step commits
    pub triggers_seen: ChannelVersions,
}

/// One dispatchable unit of work
///
/// A fanout-each subscription expands into several tasks sharing the same
/// node name, one per input element.
pub(crate) struct PregelTask {
    pub node: String,
    pub input: Value,
    pub executor: Arc<dyn NodeExecutor>,
    pub writers: Vec<ChannelWrite>,
    pub fanout_writes: bool,
}

impl fmt::Debug for PregelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PregelTask")
            .field("node", &self.node)
            .field("input", &self.input)
            .field("writers", &self.writers)
            .field("fanout_writes", &self.fanout_writes)
            .finish()
    }
}

/// Writes emitted by one completed task, tagged by target channel
#[derive(Debug, Clone)]
pub(crate) struct TaskWrites {
    pub node: String,
    pub writes: Vec<(String, Value)>,
}
