//! Superstep execution engine
//!
//! This module implements a Pregel-style execution model: computation is a
//! sequence of **supersteps**, and within each superstep every node whose
//! subscribed channels received an update in the previous step runs in
//! parallel. Outputs are buffered into a pending frame and committed at the
//! step barrier, so writes from step *n* become visible only in step *n+1*.
//!
//! ```text
//! invoke / stream
//!     │
//!     ▼
//! ┌──────────────────────────────────────────────┐
//! │  Superstep N                                 │
//! │  1. plan runnable set (channel versions)     │
//! │  2. snapshot subscribed channels             │
//! │  3. dispatch node callables in parallel      │
//! │  4. collect writes into the pending frame    │
//! │  5. validate frame on trial channel copies   │
//! │  6. commit atomically, bump versions         │
//! │  7. checkpoint (if a store is configured)    │
//! │  8. interrupt check, emit step delta         │
//! └──────────────────────────────────────────────┘
//!     │ runnable set empty → done
//!     │ budget exhausted   → recursion exceeded
//!     │ interrupt touched  → paused (resumable)
//!     ▼
//! ```
//!
//! Execution halts when a step produces no writes, when the step budget is
//! exhausted, or when the frame touches an interrupt channel. With a
//! checkpointer configured, every committed step persists the full channel
//! state keyed by `thread_id`, so a paused or failed run can be resumed by
//! invoking again with the same thread.
//!
//! Cycles need no special handling: planning is driven by channel version
//! deltas, not topology, so agent ↔ tools loops terminate whenever a step
//! stops producing relevant writes (or the budget runs out).
//!
//! The entry point is [`Pregel`], assembled through [`PregelBuilder`]:
//!
//! ```rust
//! use pregel_core::node::NodeBuilder;
//! use pregel_core::pregel::Pregel;
//! use pregel_core::RunConfig;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pregel_core::Result<()> {
//! let app = Pregel::builder()
//!     .add_node(
//!         "one",
//!         NodeBuilder::subscribe_to("input")
//!             .then_fn(|v| Ok(json!(v.as_i64().unwrap_or(0) + 1)))
//!             .write_to("output"),
//!     )
//!     .build()?;
//!
//! let result = app.invoke(Some(json!(2)), &RunConfig::new()).await?;
//! assert_eq!(result, Some(json!(3)));
//! # Ok(())
//! # }
//! ```

pub(crate) mod algo;
pub(crate) mod executor;
pub(crate) mod io;
pub(crate) mod loop_impl;
pub(crate) mod types;

use crate::config::RunConfig;
use crate::error::{GraphError, Result};
use crate::node::{NodeBuilder, NodeSpec};
use crate::reserved;
use async_stream::try_stream;
use futures::Stream;
use self::loop_impl::{PregelLoop, StepOutcome};
use pregel_checkpoint::{Channel, CheckpointSaver, LastValueChannel};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Default step budget when none is configured
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// A compiled superstep application
///
/// Holds the node declarations, the channel prototypes each run clones,
/// and the graph-level defaults. A `Pregel` is immutable and cheap to share;
/// concurrent `invoke`s each get their own channel instances, and only the
/// checkpoint store is shared between runs.
pub struct Pregel {
    pub(crate) nodes: Vec<(String, NodeSpec)>,
    pub(crate) channels: HashMap<String, Box<dyn Channel>>,
    pub(crate) input_channels: Vec<String>,
    pub(crate) output_channels: Vec<String>,
    pub(crate) interrupt: HashSet<String>,
    pub(crate) checkpointer: Option<Arc<dyn CheckpointSaver>>,
    pub(crate) recursion_limit: usize,
}

impl Pregel {
    pub fn builder() -> PregelBuilder {
        PregelBuilder::new()
    }

    /// Run to completion (or pause at an interrupt) and return the
    /// aggregated output
    ///
    /// `input = None` resumes a paused thread from its checkpoint without
    /// re-seeding the input channels. Returns `None` when the run paused at
    /// an interrupt, or when a scalar output channel holds no value.
    pub async fn invoke(&self, input: Option<Value>, config: &RunConfig) -> Result<Option<Value>> {
        let mut run = PregelLoop::start(self, input, config).await?;
        loop {
            match run.step().await? {
                StepOutcome::Done => return Ok(run.output()),
                StepOutcome::Committed {
                    interrupted: true, ..
                } => return Ok(None),
                StepOutcome::Committed { .. } => {}
            }
        }
    }

    /// Run several independent inputs concurrently, preserving order
    pub async fn batch(
        &self,
        inputs: Vec<Value>,
        config: &RunConfig,
    ) -> Result<Vec<Option<Value>>> {
        let runs = inputs
            .into_iter()
            .map(|input| self.invoke(Some(input), config));
        futures::future::try_join_all(runs).await
    }

    /// Drive the run loop, yielding each step's committed delta
    ///
    /// By default every touched, non-reserved channel appears in the delta
    /// map. `RunConfig::output_keys` filters the deltas (a single key yields
    /// bare values), and `RunConfig::emit_end` appends a terminal
    /// `{"__end__": final_output}` chunk on natural completion.
    pub fn stream(
        &self,
        input: Option<Value>,
        config: &RunConfig,
    ) -> impl Stream<Item = Result<Value>> + Send + '_ {
        let config = config.clone();
        try_stream! {
            let selector = config.output_keys.clone();
            let mut run = PregelLoop::start(self, input, &config).await?;
            loop {
                match run.step().await? {
                    StepOutcome::Done => {
                        if config.emit_end {
                            let mut end = serde_json::Map::new();
                            end.insert(
                                reserved::END.to_string(),
                                run.output().unwrap_or(Value::Null),
                            );
                            yield Value::Object(end);
                        }
                        break;
                    }
                    StepOutcome::Committed { touched, interrupted } => {
                        if let Some(delta) = run.step_delta(&touched, selector.as_deref()) {
                            yield delta;
                        }
                        if interrupted {
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Assembles and validates a [`Pregel`] application
///
/// Channels a node references without an explicit declaration are created
/// implicitly as [`LastValueChannel`]s. Construction errors (unknown
/// channels in the interrupt set, inputs nobody subscribes to, outputs
/// nobody writes) are reported eagerly by [`build`](Self::build).
pub struct PregelBuilder {
    nodes: Vec<(String, NodeBuilder)>,
    channels: HashMap<String, Box<dyn Channel>>,
    input_channels: Option<Vec<String>>,
    output_channels: Option<Vec<String>>,
    interrupt: HashSet<String>,
    checkpointer: Option<Arc<dyn CheckpointSaver>>,
    recursion_limit: usize,
}

impl Default for PregelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PregelBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            channels: HashMap::new(),
            input_channels: None,
            output_channels: None,
            interrupt: HashSet::new(),
            checkpointer: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Declare a named node; declaration order is the planner's tie-break
    /// order
    pub fn add_node(mut self, name: impl Into<String>, node: NodeBuilder) -> Self {
        self.nodes.push((name.into(), node));
        self
    }

    /// Declare a channel explicitly, overriding the implicit LastValue
    pub fn add_channel(mut self, name: impl Into<String>, channel: impl Channel + 'static) -> Self {
        self.channels.insert(name.into(), Box::new(channel));
        self
    }

    /// Set a single input channel (default: `"input"`)
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.input_channels = Some(vec![name.into()]);
        self
    }

    /// Set several input channels; the caller's input becomes an object
    /// keyed by channel name
    pub fn inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_channels = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set a single output channel (default: `"output"`)
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.output_channels = Some(vec![name.into()]);
        self
    }

    /// Set several output channels; the final output becomes an object
    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_channels = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Channels that pause the run after the step that writes them
    pub fn interrupt<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt.extend(names.into_iter().map(Into::into));
        self
    }

    /// Persist channel state after every committed step
    pub fn checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpointer = Some(saver);
        self
    }

    /// Default step budget for runs of this graph
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Validate the declarations and assemble the application
    pub fn build(self) -> Result<Pregel> {
        let mut nodes: Vec<(String, NodeSpec)> = Vec::with_capacity(self.nodes.len());
        let mut names = HashSet::new();
        for (name, builder) in self.nodes {
            if !names.insert(name.clone()) {
                return Err(GraphError::Validation(format!(
                    "duplicate node name '{name}'"
                )));
            }
            let spec = builder.into_spec(&name)?;
            nodes.push((name, spec));
        }

        let input_channels = self
            .input_channels
            .unwrap_or_else(|| vec![reserved::DEFAULT_INPUT_CHANNEL.to_string()]);
        let output_channels = self
            .output_channels
            .unwrap_or_else(|| vec![reserved::DEFAULT_OUTPUT_CHANNEL.to_string()]);

        let mut channels = self.channels;
        for (name, spec) in &nodes {
            for channel in spec.written_channels() {
                if reserved::is_reserved(&channel) {
                    return Err(GraphError::Validation(format!(
                        "node '{name}' writes to reserved channel '{channel}'"
                    )));
                }
            }
            for channel in spec.read_channels().into_iter().chain(spec.written_channels()) {
                channels
                    .entry(channel)
                    .or_insert_with(|| Box::new(LastValueChannel::new()));
            }
        }
        for name in &input_channels {
            channels
                .entry(name.clone())
                .or_insert_with(|| Box::new(LastValueChannel::new()));
        }
        channels
            .entry(reserved::IS_LAST_STEP.to_string())
            .or_insert_with(|| Box::new(LastValueChannel::with_value(Value::Bool(false))));

        let subscribes_input = nodes.iter().any(|(_, spec)| {
            spec.triggers()
                .iter()
                .any(|trigger| input_channels.contains(trigger))
        });
        if !subscribes_input {
            return Err(GraphError::Validation(format!(
                "no node subscribes to any input channel {input_channels:?}"
            )));
        }

        let writes_output = nodes.iter().any(|(_, spec)| {
            spec.written_channels()
                .iter()
                .any(|channel| output_channels.contains(channel))
        });
        if !writes_output {
            return Err(GraphError::Validation(format!(
                "no node writes to any output channel {output_channels:?}"
            )));
        }

        for name in &self.interrupt {
            if !channels.contains_key(name) {
                return Err(GraphError::Validation(format!(
                    "interrupt references unknown channel '{name}'"
                )));
            }
        }
        if !self.interrupt.is_empty() && self.checkpointer.is_none() {
            return Err(GraphError::Validation(
                "interrupt channels require a checkpointer to resume from".to_string(),
            ));
        }

        Ok(Pregel {
            nodes,
            channels,
            input_channels,
            output_channels,
            interrupt: self.interrupt,
            checkpointer: self.checkpointer,
            recursion_limit: self.recursion_limit,
        })
    }
}
