//! The run loop: one invocation's superstep cycle
//!
//! A [`PregelLoop`] is the ephemeral state of a single run: its own channel
//! instances (cloned from the graph's prototypes, then restored from the
//! thread's checkpoint when one exists), the version maps driving the
//! planner, the step budget, and the interrupt set. The loop owns its
//! channels exclusively; the checkpoint store is the only shared
//! dependency.
//!
//! Each call to [`PregelLoop::step`] runs one plan-dispatch-commit cycle:
//!
//! 1. plan the runnable set; empty means the run is done
//! 2. charge the step against the budget, raising *recursion exceeded* once
//!    the post-signal step has had its chance
//! 3. write the `is_last_step` signal
//! 4. snapshot inputs and dispatch all tasks in parallel
//! 5. validate the collected frame on trial channel copies
//! 6. commit atomically: swap trial copies in, bump versions, record what
//!    each node has now seen
//! 7. persist the checkpoint, if a store is configured
//! 8. report the touched channels and whether an interrupt fired
//!
//! Steps 5-7 run on the loop's own task; workers only ever hold immutable
//! snapshots. Dropping the loop mid-run (caller cancellation) cannot tear a
//! commit, because every await between plan and commit is the barrier
//! itself. Context channels release in `Drop`, which runs on every exit
//! path.

use crate::config::RunConfig;
use crate::error::{GraphError, Result};
use crate::pregel::{algo, executor, io, Pregel};
use crate::reserved;
use pregel_checkpoint::{
    Channel, ChannelVersions, Checkpoint, CheckpointConfig, VersionsSeen,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Result of one superstep
#[derive(Debug)]
pub(crate) enum StepOutcome {
    /// The runnable set was empty; the run halted naturally
    Done,
    /// A step committed; `interrupted` marks a pause at an interrupt channel
    Committed {
        touched: HashSet<String>,
        interrupted: bool,
    },
}

/// Ephemeral per-run state driving the superstep cycle
pub(crate) struct PregelLoop<'a> {
    app: &'a Pregel,
    channels: HashMap<String, Box<dyn Channel>>,
    versions: ChannelVersions,
    seen: VersionsSeen,
    /// monotonic step index within the thread's checkpoint history
    checkpoint_step: u64,
    /// steps taken by this run, charged against the budget
    local_step: usize,
    recursion_limit: usize,
    thread_id: Option<String>,
    output_keys: Vec<String>,
}

impl Drop for PregelLoop<'_> {
    fn drop(&mut self) {
        for channel in self.channels.values_mut() {
            channel.exit();
        }
    }
}

impl<'a> PregelLoop<'a> {
    /// Set up a run: clone channels, restore the thread's checkpoint,
    /// acquire context resources, and seed the caller's input
    pub(crate) async fn start(
        app: &'a Pregel,
        input: Option<Value>,
        config: &RunConfig,
    ) -> Result<PregelLoop<'a>> {
        let thread_id = config.thread_id.clone();
        if app.checkpointer.is_some() && thread_id.is_none() {
            return Err(GraphError::Configuration(
                "thread_id is required when a checkpointer is configured".to_string(),
            ));
        }

        let input_keys = config
            .input_keys
            .clone()
            .unwrap_or_else(|| app.input_channels.clone());
        let output_keys = config
            .output_keys
            .clone()
            .unwrap_or_else(|| app.output_channels.clone());

        let mut run = PregelLoop {
            app,
            channels: app.channels.clone(),
            versions: ChannelVersions::new(),
            seen: VersionsSeen::new(),
            checkpoint_step: 0,
            local_step: 0,
            recursion_limit: config.recursion_limit.unwrap_or(app.recursion_limit),
            thread_id,
            output_keys,
        };

        if let (Some(saver), Some(thread)) = (&run.app.checkpointer, &run.thread_id) {
            let lookup = CheckpointConfig::new().with_thread_id(thread.clone());
            if let Some(checkpoint) = saver.get(&lookup).await? {
                tracing::debug!(
                    thread = %thread,
                    step = checkpoint.step,
                    "resuming from checkpoint"
                );
                for (name, snapshot) in checkpoint.channel_values {
                    if let Some(channel) = run.channels.get_mut(&name) {
                        channel.restore(snapshot)?;
                    }
                }
                run.versions = checkpoint.channel_versions;
                run.seen = checkpoint.versions_seen;
                run.checkpoint_step = checkpoint.step;
            }
        }

        // Context resources; a failed acquisition surfaces here and Drop
        // releases whatever was already acquired.
        for channel in run.channels.values_mut() {
            channel.enter()?;
        }

        if let Some(input) = input {
            let writes = io::map_input_writes(input, &input_keys)?;
            let committed = algo::apply_writes(&run.channels, &writes)?;
            if !committed.is_empty() {
                let version = algo::next_version(&run.versions);
                for (name, channel) in committed {
                    run.channels.insert(name.clone(), channel);
                    run.versions.insert(name, version);
                }
            }
        }

        Ok(run)
    }

    /// Run one plan-dispatch-commit cycle
    pub(crate) async fn step(&mut self) -> Result<StepOutcome> {
        let planned = algo::plan_runnable(&self.app.nodes, &self.versions, &self.seen);
        if planned.is_empty() {
            tracing::debug!(steps = self.local_step, "no runnable nodes, run complete");
            return Ok(StepOutcome::Done);
        }

        self.local_step += 1;
        if self.local_step > self.recursion_limit {
            return Err(GraphError::RecursionExceeded {
                limit: self.recursion_limit,
            });
        }

        // Signal channel, written outside the frame: never a trigger, never
        // versioned.
        let is_last = self.local_step == self.recursion_limit;
        if let Some(channel) = self.channels.get_mut(reserved::IS_LAST_STEP) {
            channel
                .update(vec![Value::Bool(is_last)])
                .map_err(|err| GraphError::channel_update(reserved::IS_LAST_STEP, err))?;
        }

        let tasks = executor::prepare_tasks(&planned, &self.app.nodes, &self.channels)?;
        tracing::debug!(
            step = self.local_step,
            tasks = tasks.len(),
            "executing superstep"
        );
        let outboxes = executor::execute_tasks(tasks).await?;

        let frame: Vec<(String, Value)> = outboxes
            .into_iter()
            .flat_map(|outbox| outbox.writes)
            .collect();
        let committed = algo::apply_writes(&self.channels, &frame)?;

        let mut touched = HashSet::new();
        if !committed.is_empty() {
            let version = algo::next_version(&self.versions);
            for (name, channel) in committed {
                self.channels.insert(name.clone(), channel);
                self.versions.insert(name.clone(), version);
                touched.insert(name);
            }
        }
        for plan in &planned {
            let node_seen = self.seen.entry(plan.name.clone()).or_default();
            for (channel, version) in &plan.triggers_seen {
                node_seen.insert(channel.clone(), *version);
            }
        }
        self.checkpoint_step += 1;

        self.persist().await?;

        let interrupted = touched
            .iter()
            .any(|channel| self.app.interrupt.contains(channel));
        if interrupted {
            tracing::debug!(step = self.local_step, "interrupt channel touched, pausing");
        }

        Ok(StepOutcome::Committed {
            touched,
            interrupted,
        })
    }

    /// Final output per the configured output channels
    pub(crate) fn output(&self) -> Option<Value> {
        io::map_output_value(&self.channels, &self.output_keys)
    }

    /// Project a committed step's delta for the streaming form
    pub(crate) fn step_delta(
        &self,
        touched: &HashSet<String>,
        selector: Option<&[String]>,
    ) -> Option<Value> {
        io::map_step_delta(&self.channels, touched, selector)
    }

    async fn persist(&self) -> Result<()> {
        let (Some(saver), Some(thread)) = (&self.app.checkpointer, &self.thread_id) else {
            return Ok(());
        };

        let mut channel_values = HashMap::new();
        for (name, channel) in &self.channels {
            if let Some(snapshot) = channel.checkpoint()? {
                channel_values.insert(name.clone(), snapshot);
            }
        }
        let checkpoint = Checkpoint::new(
            self.checkpoint_step,
            channel_values,
            self.versions.clone(),
            self.seen.clone(),
        );
        let target = CheckpointConfig::new().with_thread_id(thread.clone());
        saver.put(&target, checkpoint).await.map_err(|err| {
            tracing::error!(thread = %thread, error = %err, "checkpoint persistence failed");
            GraphError::Checkpoint(err)
        })
    }
}
