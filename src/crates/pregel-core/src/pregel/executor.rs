//! Task preparation and parallel dispatch
//!
//! Once the planner has picked the runnable set, [`prepare_tasks`] snapshots
//! each node's subscribed channels into an immutable input (expanding
//! fanout-each subscriptions into one task per element), and
//! [`execute_tasks`] runs every task on the worker pool, collecting each
//! task's writes into a private outbox. Workers never touch channel state:
//! they receive a snapshot and return writes, and the run loop applies the
//! frame after the barrier.

use crate::error::{GraphError, Result};
use crate::node::{NodeSpec, Subscription};
use crate::pregel::io;
use crate::pregel::types::{PlannedNode, PregelTask, TaskWrites};
use futures::future::join_all;
use pregel_checkpoint::Channel;
use serde_json::Value;
use std::collections::HashMap;

/// Snapshot inputs for the runnable set and expand fanout reads
pub(crate) fn prepare_tasks(
    planned: &[PlannedNode],
    nodes: &[(String, NodeSpec)],
    channels: &HashMap<String, Box<dyn Channel>>,
) -> Result<Vec<PregelTask>> {
    let mut tasks = Vec::with_capacity(planned.len());

    for plan in planned {
        let Some((_, spec)) = nodes.iter().find(|(name, _)| name == &plan.name) else {
            return Err(GraphError::Execution(format!(
                "planned node '{}' is not part of the graph",
                plan.name
            )));
        };

        match &spec.subscription {
            Subscription::Single(channel) => {
                let input = io::read_channel(channels, channel).unwrap_or(Value::Null);
                tasks.push(task_for(spec, &plan.name, input));
            }
            Subscription::Joined(_) => {
                let input = io::read_joined(channels, &spec.read_channels());
                tasks.push(task_for(spec, &plan.name, input));
            }
            Subscription::Each(channel) => {
                let value = io::read_channel(channels, channel).unwrap_or(Value::Null);
                let Value::Array(elements) = value else {
                    return Err(GraphError::Execution(format!(
                        "node '{}' subscribes to each of '{channel}', which holds a non-sequence value",
                        plan.name
                    )));
                };
                for element in elements {
                    tasks.push(task_for(spec, &plan.name, element));
                }
            }
        }
    }

    Ok(tasks)
}

fn task_for(spec: &NodeSpec, name: &str, input: Value) -> PregelTask {
    PregelTask {
        node: name.to_string(),
        input,
        executor: spec.executor.clone(),
        writers: spec.writers.clone(),
        fanout_writes: spec.fanout_writes,
    }
}

/// Run all tasks concurrently and collect their outboxes
///
/// The returned writes preserve task order. The first failing task aborts
/// the step: its error propagates and the caller drops the whole frame.
pub(crate) async fn execute_tasks(tasks: Vec<PregelTask>) -> Result<Vec<TaskWrites>> {
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| tokio::spawn(run_task(task)))
        .collect();

    let mut outboxes = Vec::with_capacity(handles.len());
    for joined in join_all(handles).await {
        match joined {
            Ok(result) => outboxes.push(result?),
            Err(join_err) => {
                return Err(GraphError::Execution(format!(
                    "node task aborted: {join_err}"
                )))
            }
        }
    }
    Ok(outboxes)
}

async fn run_task(task: PregelTask) -> Result<TaskWrites> {
    tracing::debug!(node = %task.node, "dispatching node callable");
    let output = match task.executor.execute(task.input).await {
        Ok(output) => output,
        Err(err) => {
            tracing::warn!(node = %task.node, error = %err, "node callable failed");
            return Err(match err {
                already @ GraphError::NodeExecution { .. } => already,
                other => GraphError::node_execution(task.node, other.to_string()),
            });
        }
    };

    let results = if task.fanout_writes {
        match output {
            Value::Array(elements) => elements,
            other => vec![other],
        }
    } else {
        vec![output]
    };

    let mut writes = Vec::new();
    for value in &results {
        for writer in &task.writers {
            if let Some(projected) = writer.apply(value) {
                writes.push((writer.channel.clone(), projected));
            }
        }
    }

    Ok(TaskWrites {
        node: task.node,
        writes,
    })
}
