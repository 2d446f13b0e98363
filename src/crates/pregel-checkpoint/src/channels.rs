//! Channel abstractions for superstep state
//!
//! Channels are the only medium of communication between nodes in the
//! superstep engine. Each variant is a typed slot with its own update rule:
//! writes buffered during step *n* are applied at the step barrier and
//! become visible to readers in step *n+1*.
//!
//! The variants provided here:
//!
//! - [`LastValueChannel`] - stores the single value written this step
//! - [`TopicChannel`] - a sequence of values, optionally accumulating and/or
//!   deduplicated
//! - [`BinaryOperatorChannel`] - folds all writes into a running value with
//!   an associative operator
//! - [`ContextChannel`] - a run-scoped resource, acquired at run start and
//!   released on every exit path; never writable, never checkpointed
//!
//! New channel kinds are added as further implementations of [`Channel`];
//! the engine only ever talks to the trait.

use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Base trait for all channels
///
/// A channel is mutated in exactly two places: `update` during the commit
/// phase of a step, and `restore` when a run starts from a checkpoint.
/// Reads are side-effect free.
pub trait Channel: Send + Sync + Debug {
    /// Get the current visible value of the channel
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::EmptyChannel`] if the channel has never
    /// been written and has no default.
    fn get(&self) -> Result<Value>;

    /// Apply all writes targeting this channel in the current step
    ///
    /// Called at most once per step, with every write for this channel
    /// collected into `values`. Returns `true` if the channel changed, which
    /// feeds the next step's runnable-set computation.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::InvalidUpdate`] if the write set violates
    /// the channel's update rule. The caller must commit nothing in that
    /// case.
    fn update(&mut self, values: Vec<Value>) -> Result<bool>;

    /// Snapshot the channel state for persistence
    ///
    /// `None` means there is nothing to persist: the channel is empty, or
    /// the variant opts out of checkpointing entirely.
    fn checkpoint(&self) -> Result<Option<Value>>;

    /// Rebuild the channel state from a snapshot produced by [`Channel::checkpoint`]
    fn restore(&mut self, snapshot: Value) -> Result<()>;

    /// Check if the channel has a readable value
    fn is_available(&self) -> bool {
        self.get().is_ok()
    }

    /// Run-start lifecycle hook
    ///
    /// Default is a no-op; [`ContextChannel`] acquires its resource here.
    fn enter(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run-end lifecycle hook, invoked on every exit path
    ///
    /// Must be idempotent.
    fn exit(&mut self) {}

    /// Clone the channel into a Box
    fn clone_box(&self) -> Box<dyn Channel>;
}

impl Clone for Box<dyn Channel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// LastValue channel - stores only the latest value
///
/// Accepts at most one write per step; a second write within the same step
/// is an invalid update and fails the whole step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastValueChannel {
    value: Option<Value>,
}

impl LastValueChannel {
    /// Create a new, empty LastValue channel
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Create a LastValue channel with an initial value
    pub fn with_value(value: Value) -> Self {
        Self { value: Some(value) }
    }
}

impl Default for LastValueChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for LastValueChannel {
    fn get(&self) -> Result<Value> {
        self.value.clone().ok_or(CheckpointError::EmptyChannel)
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        if values.len() > 1 {
            return Err(CheckpointError::InvalidUpdate(format!(
                "LastValue channel received {} values in one step, at most one is allowed",
                values.len()
            )));
        }
        self.value = values.into_iter().next();
        Ok(true)
    }

    fn checkpoint(&self) -> Result<Option<Value>> {
        Ok(self.value.clone())
    }

    fn restore(&mut self, snapshot: Value) -> Result<()> {
        self.value = Some(snapshot);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Topic channel - a sequence of values
///
/// Multiple writes per step are allowed and all append. By default the
/// visible value is the list of writes from the last committed step only;
/// `accumulate` keeps the full history instead, and `unique` drops values
/// the channel has already seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicChannel {
    values: Vec<Value>,
    seen: Vec<Value>,
    accumulate: bool,
    unique: bool,
}

impl TopicChannel {
    /// Create a new Topic channel (non-accumulating, non-unique)
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            seen: Vec::new(),
            accumulate: false,
            unique: false,
        }
    }

    /// Keep values across steps instead of replacing them each commit
    pub fn accumulate(mut self) -> Self {
        self.accumulate = true;
        self
    }

    /// Drop values the channel has already seen
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The currently visible values
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl Default for TopicChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for TopicChannel {
    fn get(&self) -> Result<Value> {
        Ok(Value::Array(self.values.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        let mut kept = Vec::with_capacity(values.len());
        for value in values {
            if self.unique {
                if self.seen.contains(&value) {
                    continue;
                }
                self.seen.push(value.clone());
            }
            kept.push(value);
        }

        if self.accumulate {
            if kept.is_empty() {
                return Ok(false);
            }
            self.values.extend(kept);
            Ok(true)
        } else {
            let changed = !kept.is_empty() || !self.values.is_empty();
            self.values = kept;
            Ok(changed)
        }
    }

    fn checkpoint(&self) -> Result<Option<Value>> {
        if self.values.is_empty() && self.seen.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::json!({
            "seen": self.seen,
            "values": self.values,
        })))
    }

    fn restore(&mut self, snapshot: Value) -> Result<()> {
        let obj = snapshot.as_object().ok_or_else(|| {
            CheckpointError::Invalid("Topic channel snapshot must be an object".to_string())
        })?;
        self.seen = obj
            .get("seen")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        self.values = obj
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.values.is_empty()
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Reducer function type for [`BinaryOperatorChannel`]
pub type ReducerFn = Arc<dyn Fn(Value, Value) -> Value + Send + Sync>;

/// BinaryOperator channel - folds writes into a running value
///
/// Each step's writes are combined into the current value with an
/// associative operator. Constructed with a seed, the channel is never
/// empty: reading before any write returns the seed.
#[derive(Clone)]
pub struct BinaryOperatorChannel {
    value: Option<Value>,
    seed: Option<Value>,
    reducer: ReducerFn,
}

impl BinaryOperatorChannel {
    /// Create a channel with a custom reducer and no seed
    pub fn new<F>(reducer: F) -> Self
    where
        F: Fn(Value, Value) -> Value + Send + Sync + 'static,
    {
        Self {
            value: None,
            seed: None,
            reducer: Arc::new(reducer),
        }
    }

    /// Create a channel with a seed value the fold starts from
    pub fn with_seed<F>(seed: Value, reducer: F) -> Self
    where
        F: Fn(Value, Value) -> Value + Send + Sync + 'static,
    {
        Self {
            value: None,
            seed: Some(seed),
            reducer: Arc::new(reducer),
        }
    }

    /// Numeric sum reducer, seeded with zero
    pub fn sum() -> Self {
        Self::with_seed(serde_json::json!(0), |a, b| {
            match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => serde_json::json!(x + y),
                _ => serde_json::json!(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
            }
        })
    }

    /// Array append reducer, seeded with the empty array
    pub fn append() -> Self {
        Self::with_seed(serde_json::json!([]), |a, b| {
            let mut merged = match a {
                Value::Array(items) => items,
                other => vec![other],
            };
            match b {
                Value::Array(items) => merged.extend(items),
                other => merged.push(other),
            }
            Value::Array(merged)
        })
    }
}

impl Debug for BinaryOperatorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryOperatorChannel")
            .field("value", &self.value)
            .field("seed", &self.seed)
            .field("reducer", &"<function>")
            .finish()
    }
}

impl Channel for BinaryOperatorChannel {
    fn get(&self) -> Result<Value> {
        self.value
            .clone()
            .or_else(|| self.seed.clone())
            .ok_or(CheckpointError::EmptyChannel)
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        let mut acc = self.value.take().or_else(|| self.seed.clone());
        for value in values {
            acc = Some(match acc {
                Some(current) => (self.reducer)(current, value),
                None => value,
            });
        }
        self.value = acc;
        Ok(true)
    }

    fn checkpoint(&self) -> Result<Option<Value>> {
        Ok(self.value.clone())
    }

    fn restore(&mut self, snapshot: Value) -> Result<()> {
        self.value = Some(snapshot);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.value.is_some() || self.seed.is_some()
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// A run-scoped resource behind a [`ContextChannel`]
///
/// `acquire` is called once when a run starts, `release` once when it ends,
/// on every exit path: completion, error, interrupt, and cancellation.
pub trait ScopedResource: Send + Sync {
    /// Produce the resource value for one run
    fn acquire(&self) -> Result<Value>;

    /// Tear the resource down
    fn release(&self, value: Value);
}

/// Context channel - a scoped resource visible to nodes as a read-only value
///
/// The acquisition error, if any, surfaces at run start. The value takes no
/// part in write frames or checkpoints.
pub struct ContextChannel {
    resource: Arc<dyn ScopedResource>,
    value: Option<Value>,
}

impl ContextChannel {
    pub fn new(resource: Arc<dyn ScopedResource>) -> Self {
        Self {
            resource,
            value: None,
        }
    }
}

impl Debug for ContextChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextChannel")
            .field("value", &self.value)
            .field("resource", &"<resource>")
            .finish()
    }
}

impl Channel for ContextChannel {
    fn get(&self) -> Result<Value> {
        self.value.clone().ok_or(CheckpointError::EmptyChannel)
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        Err(CheckpointError::InvalidUpdate(
            "context channels are read-only".to_string(),
        ))
    }

    fn checkpoint(&self) -> Result<Option<Value>> {
        Ok(None)
    }

    fn restore(&mut self, _snapshot: Value) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn enter(&mut self) -> Result<()> {
        if self.value.is_none() {
            self.value = Some(self.resource.acquire()?);
        }
        Ok(())
    }

    fn exit(&mut self) {
        if let Some(value) = self.value.take() {
            self.resource.release(value);
        }
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        // Fresh per run: the clone has not acquired anything yet.
        Box::new(Self {
            resource: self.resource.clone(),
            value: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_last_value_channel() {
        let mut channel = LastValueChannel::new();
        assert!(!channel.is_available());
        assert!(matches!(channel.get(), Err(CheckpointError::EmptyChannel)));

        let updated = channel.update(vec![json!(42)]).unwrap();
        assert!(updated);
        assert_eq!(channel.get().unwrap(), json!(42));

        channel.update(vec![json!(100)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(100));
    }

    #[test]
    fn test_last_value_rejects_multiple_writes() {
        let mut channel = LastValueChannel::with_value(json!(1));
        let result = channel.update(vec![json!(2), json!(3)]);
        assert!(matches!(result, Err(CheckpointError::InvalidUpdate(_))));
        // rejected update leaves the value untouched
        assert_eq!(channel.get().unwrap(), json!(1));
    }

    #[test]
    fn test_last_value_empty_update_is_noop() {
        let mut channel = LastValueChannel::new();
        assert!(!channel.update(vec![]).unwrap());
        assert!(!channel.is_available());
    }

    #[test]
    fn test_topic_replaces_values_each_step() {
        let mut channel = TopicChannel::new();
        assert_eq!(channel.get().unwrap(), json!([]));

        channel.update(vec![json!(1), json!(2)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!([1, 2]));

        channel.update(vec![json!(3)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!([3]));
    }

    #[test]
    fn test_topic_accumulate() {
        let mut channel = TopicChannel::new().accumulate();
        channel.update(vec![json!(1), json!(2)]).unwrap();
        channel.update(vec![json!(3)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_topic_unique_drops_repeats() {
        let mut channel = TopicChannel::new().accumulate().unique();
        channel.update(vec![json!("a"), json!("b"), json!("a")]).unwrap();
        channel.update(vec![json!("b"), json!("c")]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_topic_checkpoint_restore() {
        let mut channel = TopicChannel::new().accumulate().unique();
        channel.update(vec![json!(1), json!(2)]).unwrap();

        let snapshot = channel.checkpoint().unwrap().unwrap();
        let mut restored = TopicChannel::new().accumulate().unique();
        restored.restore(snapshot).unwrap();

        assert_eq!(restored.get().unwrap(), json!([1, 2]));
        // the seen-set survives the round trip
        restored.update(vec![json!(2), json!(3)]).unwrap();
        assert_eq!(restored.get().unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_binary_operator_folds_into_seed() {
        let mut channel = BinaryOperatorChannel::sum();
        assert_eq!(channel.get().unwrap(), json!(0));

        channel.update(vec![json!(1), json!(2), json!(3)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(6));

        channel.update(vec![json!(4)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(10));
    }

    #[test]
    fn test_binary_operator_without_seed_is_empty() {
        let channel = BinaryOperatorChannel::new(|a, _| a);
        assert!(matches!(channel.get(), Err(CheckpointError::EmptyChannel)));
    }

    #[test]
    fn test_binary_operator_append() {
        let mut channel = BinaryOperatorChannel::append();
        channel.update(vec![json!(["a", "b"]), json!(["c"])]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_binary_operator_checkpoint_skips_seed_only_state() {
        let channel = BinaryOperatorChannel::sum();
        assert!(channel.checkpoint().unwrap().is_none());

        let mut written = BinaryOperatorChannel::sum();
        written.update(vec![json!(2)]).unwrap();
        assert_eq!(written.checkpoint().unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_last_value_checkpoint_restore() {
        let mut channel = LastValueChannel::new();
        channel.update(vec![json!({"nested": [1, 2, 3]})]).unwrap();

        let snapshot = channel.checkpoint().unwrap().unwrap();
        let mut restored = LastValueChannel::new();
        restored.restore(snapshot).unwrap();
        assert_eq!(restored.get().unwrap(), json!({"nested": [1, 2, 3]}));
    }

    struct CountingResource {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl ScopedResource for CountingResource {
        fn acquire(&self) -> Result<Value> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(json!(5))
        }

        fn release(&self, _value: Value) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_context_channel_lifecycle() {
        let resource = Arc::new(CountingResource {
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        });
        let mut channel = ContextChannel::new(resource.clone());

        assert!(!channel.is_available());
        channel.enter().unwrap();
        assert_eq!(channel.get().unwrap(), json!(5));
        assert_eq!(resource.acquired.load(Ordering::SeqCst), 1);

        // enter is idempotent within a run
        channel.enter().unwrap();
        assert_eq!(resource.acquired.load(Ordering::SeqCst), 1);

        channel.exit();
        channel.exit();
        assert_eq!(resource.released.load(Ordering::SeqCst), 1);
        assert!(!channel.is_available());
    }

    #[test]
    fn test_context_channel_rejects_writes() {
        let resource = Arc::new(CountingResource {
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        });
        let mut channel = ContextChannel::new(resource);
        assert!(matches!(
            channel.update(vec![json!(1)]),
            Err(CheckpointError::InvalidUpdate(_))
        ));
        assert!(channel.checkpoint().unwrap().is_none());
    }

    proptest! {
        #[test]
        fn prop_last_value_rejects_any_multi_write(values in proptest::collection::vec(any::<i64>(), 2..8)) {
            let mut channel = LastValueChannel::new();
            let writes: Vec<Value> = values.iter().map(|v| json!(v)).collect();
            prop_assert!(matches!(
                channel.update(writes),
                Err(CheckpointError::InvalidUpdate(_))
            ));
            prop_assert!(!channel.is_available());
        }

        #[test]
        fn prop_topic_preserves_write_order(values in proptest::collection::vec(any::<i32>(), 0..16)) {
            let mut channel = TopicChannel::new().accumulate();
            for chunk in values.chunks(3) {
                let writes: Vec<Value> = chunk.iter().map(|v| json!(v)).collect();
                channel.update(writes).unwrap();
            }
            let expected: Vec<Value> = values.iter().map(|v| json!(v)).collect();
            prop_assert_eq!(channel.get().unwrap(), Value::Array(expected));
        }
    }
}
