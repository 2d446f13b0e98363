//! Node contract: subscriptions, callables, and writers
//!
//! A node is a named transducer wired to channels on both sides. The read
//! side declares which channels wake it (its *triggers*) and how their
//! values are packaged into the callable's input; the write side declares
//! how the callable's output fans out into channel writes. Nodes hold no
//! state of their own - everything lives in channels, and a node may run
//! any number of times over the life of a graph.
//!
//! Wiring is declared through [`NodeBuilder`]:
//!
//! ```rust
//! use pregel_core::node::NodeBuilder;
//! use serde_json::json;
//!
//! let node = NodeBuilder::subscribe_to("input")
//!     .then_fn(|value| Ok(json!(value.as_i64().unwrap_or(0) + 1)))
//!     .write_to("output");
//! ```
//!
//! Read forms: [`subscribe_to`](NodeBuilder::subscribe_to) (scalar),
//! [`subscribe_to_many`](NodeBuilder::subscribe_to_many) (joined map read;
//! [`join`](NodeBuilder::join) adds read-only channels that do not wake the
//! node), and [`subscribe_to_each`](NodeBuilder::subscribe_to_each) (one
//! concurrent sub-invocation per element of a sequence-valued channel).
//!
//! Write forms: [`write_to`](NodeBuilder::write_to) passes the result
//! through, [`write_to_with`](NodeBuilder::write_to_with) projects it (a
//! null projection skips the write, which is how conditional routing is
//! expressed), [`write_constant_to`](NodeBuilder::write_constant_to) emits
//! a fixed value, and [`map`](NodeBuilder::map) treats the result as a
//! sequence, emitting one write per element through the declared writers.

use crate::error::Result;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The opaque callable at the heart of a node
///
/// The engine makes no purity assumptions: a callable may block on
/// arbitrary I/O. It only promises to touch channel state through its
/// declared writers.
pub trait NodeExecutor: Send + Sync {
    /// Run the callable against a read snapshot
    fn execute(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>;
}

struct FnExecutor<F>(F);

impl<F, Fut> NodeExecutor for FnExecutor<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn execute(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
        Box::pin((self.0)(input))
    }
}

struct SyncFnExecutor<F>(F);

impl<F> NodeExecutor for SyncFnExecutor<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn execute(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
        let result = (self.0)(input);
        Box::pin(async move { result })
    }
}

/// How a node reads its subscribed channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Scalar read of one channel
    Single(String),
    /// Map read over several channels: `{name: value, ...}`
    Joined(Vec<String>),
    /// One sub-invocation per element of a sequence-valued channel
    Each(String),
}

/// Projection applied to the callable result before writing
#[derive(Clone)]
pub enum WriteProjection {
    /// Write the result unchanged
    Passthrough,
    /// Write a fixed value
    Constant(Value),
    /// Write a projection of the result; null skips the write
    Transform(Arc<dyn Fn(&Value) -> Value + Send + Sync>),
}

impl fmt::Debug for WriteProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteProjection::Passthrough => write!(f, "Passthrough"),
            WriteProjection::Constant(value) => write!(f, "Constant({value})"),
            WriteProjection::Transform(_) => write!(f, "Transform(<function>)"),
        }
    }
}

/// A single (channel, projection) writer declaration
#[derive(Debug, Clone)]
pub struct ChannelWrite {
    pub channel: String,
    pub projection: WriteProjection,
}

impl ChannelWrite {
    /// Produce the write for one callable result, or `None` to skip
    pub(crate) fn apply(&self, value: &Value) -> Option<Value> {
        match &self.projection {
            WriteProjection::Passthrough => Some(value.clone()),
            WriteProjection::Constant(constant) => Some(constant.clone()),
            WriteProjection::Transform(project) => {
                let projected = project(value);
                if projected.is_null() {
                    None
                } else {
                    Some(projected)
                }
            }
        }
    }
}

/// Fully declared node, produced by [`NodeBuilder`] at build time
#[derive(Clone)]
pub struct NodeSpec {
    pub(crate) subscription: Subscription,
    pub(crate) joined: Vec<String>,
    pub(crate) executor: Arc<dyn NodeExecutor>,
    pub(crate) writers: Vec<ChannelWrite>,
    pub(crate) fanout_writes: bool,
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("subscription", &self.subscription)
            .field("joined", &self.joined)
            .field("writers", &self.writers)
            .field("fanout_writes", &self.fanout_writes)
            .finish()
    }
}

impl NodeSpec {
    /// Channels whose updates make this node runnable
    pub(crate) fn triggers(&self) -> Vec<String> {
        match &self.subscription {
            Subscription::Single(channel) | Subscription::Each(channel) => vec![channel.clone()],
            Subscription::Joined(channels) => channels.clone(),
        }
    }

    /// All channels read when the node runs (triggers plus joined)
    pub(crate) fn read_channels(&self) -> Vec<String> {
        let mut channels = self.triggers();
        channels.extend(self.joined.iter().cloned());
        channels
    }

    /// All channels this node's writers target
    pub(crate) fn written_channels(&self) -> Vec<String> {
        self.writers.iter().map(|w| w.channel.clone()).collect()
    }
}

/// Builder for a node's wiring
///
/// Collected into a [`NodeSpec`] when the graph is built; wiring mistakes
/// (no callable, `join` on a scalar read) are reported there.
pub struct NodeBuilder {
    subscription: Subscription,
    joined: Vec<String>,
    executor: Option<Arc<dyn NodeExecutor>>,
    writers: Vec<ChannelWrite>,
    fanout_writes: bool,
}

impl NodeBuilder {
    fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            joined: Vec::new(),
            executor: None,
            writers: Vec::new(),
            fanout_writes: false,
        }
    }

    /// Scalar read: the callable receives the channel value directly
    pub fn subscribe_to(channel: impl Into<String>) -> Self {
        Self::new(Subscription::Single(channel.into()))
    }

    /// Joined map read: the callable receives `{name: value, ...}` and the
    /// node wakes when any of the named channels updates
    pub fn subscribe_to_many<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Subscription::Joined(
            channels.into_iter().map(Into::into).collect(),
        ))
    }

    /// Fanout read over a sequence-valued channel: one independent,
    /// concurrent invocation per element
    pub fn subscribe_to_each(channel: impl Into<String>) -> Self {
        Self::new(Subscription::Each(channel.into()))
    }

    /// Add read-only channels to a map read; they are packaged into the
    /// input but do not wake the node
    pub fn join<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joined.extend(channels.into_iter().map(Into::into));
        self
    }

    /// Set the callable from an async closure
    pub fn then<F, Fut>(mut self, callable: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.executor = Some(Arc::new(FnExecutor(callable)));
        self
    }

    /// Set the callable from a plain function
    pub fn then_fn<F>(mut self, callable: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.executor = Some(Arc::new(SyncFnExecutor(callable)));
        self
    }

    /// Set the callable from an existing executor
    pub fn with_executor(mut self, executor: Arc<dyn NodeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Write the callable result to a channel unchanged
    pub fn write_to(mut self, channel: impl Into<String>) -> Self {
        self.writers.push(ChannelWrite {
            channel: channel.into(),
            projection: WriteProjection::Passthrough,
        });
        self
    }

    /// Write the callable result unchanged to several channels
    pub fn write_to_many<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for channel in channels {
            self = self.write_to(channel);
        }
        self
    }

    /// Write a projection of the callable result; a null projection skips
    /// the write for that invocation
    pub fn write_to_with<F>(mut self, channel: impl Into<String>, projection: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.writers.push(ChannelWrite {
            channel: channel.into(),
            projection: WriteProjection::Transform(Arc::new(projection)),
        });
        self
    }

    /// Write a fixed value whenever the node runs
    pub fn write_constant_to(mut self, channel: impl Into<String>, value: Value) -> Self {
        self.writers.push(ChannelWrite {
            channel: channel.into(),
            projection: WriteProjection::Constant(value),
        });
        self
    }

    /// Treat the callable result as a sequence, emitting one write per
    /// element through the declared writers
    pub fn map(mut self) -> Self {
        self.fanout_writes = true;
        self
    }

    /// Finalize into a [`NodeSpec`]; `node` names the error context
    pub(crate) fn into_spec(self, node: &str) -> crate::error::Result<NodeSpec> {
        use crate::error::GraphError;

        let executor = self.executor.ok_or_else(|| {
            GraphError::Validation(format!("node '{node}' has no callable"))
        })?;
        if !self.joined.is_empty() && !matches!(self.subscription, Subscription::Joined(_)) {
            return Err(GraphError::Validation(format!(
                "node '{node}' joins channels onto a non-joined subscription; use subscribe_to_many"
            )));
        }
        Ok(NodeSpec {
            subscription: self.subscription,
            joined: self.joined,
            executor,
            writers: self.writers,
            fanout_writes: self.fanout_writes,
        })
    }
}
