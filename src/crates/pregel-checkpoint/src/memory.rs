//! In-memory checkpoint store
//!
//! [`InMemorySaver`] is the reference [`CheckpointSaver`] implementation:
//! a thread-safe map from thread id to a step-ordered checkpoint history.
//! It is what the test-suite runs against and what development setups use;
//! persistence across process restarts requires a real backend implementing
//! the same trait.

use crate::checkpoint::{Checkpoint, CheckpointConfig};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointSaver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory checkpoint store
#[derive(Debug, Clone, Default)]
pub struct InMemorySaver {
    threads: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl InMemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full step-ordered history for a thread
    pub async fn history(&self, thread_id: &str) -> Vec<Checkpoint> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop all stored checkpoints; test isolation helper
    pub async fn clear(&self) {
        self.threads.write().await.clear();
    }
}

fn require_thread_id(config: &CheckpointConfig) -> Result<&str> {
    config
        .thread_id
        .as_deref()
        .ok_or_else(|| CheckpointError::Storage("thread_id is required".to_string()))
}

#[async_trait]
impl CheckpointSaver for InMemorySaver {
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        let thread_id = require_thread_id(config)?;
        let threads = self.threads.read().await;
        let Some(history) = threads.get(thread_id) else {
            return Ok(None);
        };
        let found = match config.step {
            Some(step) => history.iter().find(|c| c.step == step),
            None => history.iter().max_by_key(|c| c.step),
        };
        Ok(found.cloned())
    }

    async fn put(&self, config: &CheckpointConfig, checkpoint: Checkpoint) -> Result<()> {
        let thread_id = require_thread_id(config)?;
        let mut threads = self.threads.write().await;
        let history = threads.entry(thread_id.to_string()).or_default();
        // last put wins for a step that is re-committed
        if let Some(existing) = history.iter_mut().find(|c| c.step == checkpoint.step) {
            *existing = checkpoint;
        } else {
            history.push(checkpoint);
            history.sort_by_key(|c| c.step);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ChannelVersion;
    use serde_json::json;

    fn checkpoint_at(step: u64, value: i64) -> Checkpoint {
        let mut values = HashMap::new();
        values.insert("output".to_string(), json!(value));
        let mut versions = HashMap::new();
        versions.insert("output".to_string(), ChannelVersion(step));
        Checkpoint::new(step, values, versions, HashMap::new())
    }

    #[tokio::test]
    async fn test_put_get_latest() {
        let saver = InMemorySaver::new();
        let config = CheckpointConfig::new().with_thread_id("t1");

        saver.put(&config, checkpoint_at(1, 10)).await.unwrap();
        saver.put(&config, checkpoint_at(2, 20)).await.unwrap();

        let latest = saver.get(&config).await.unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.channel_values["output"], json!(20));
    }

    #[tokio::test]
    async fn test_get_pinned_step() {
        let saver = InMemorySaver::new();
        let config = CheckpointConfig::new().with_thread_id("t1");
        saver.put(&config, checkpoint_at(1, 10)).await.unwrap();
        saver.put(&config, checkpoint_at(2, 20)).await.unwrap();

        let pinned = saver
            .get(&CheckpointConfig::new().with_thread_id("t1").with_step(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pinned.channel_values["output"], json!(10));
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let saver = InMemorySaver::new();
        let a = CheckpointConfig::new().with_thread_id("a");
        let b = CheckpointConfig::new().with_thread_id("b");

        saver.put(&a, checkpoint_at(1, 1)).await.unwrap();
        saver.put(&b, checkpoint_at(1, 2)).await.unwrap();

        assert_eq!(
            saver.get(&a).await.unwrap().unwrap().channel_values["output"],
            json!(1)
        );
        assert_eq!(
            saver.get(&b).await.unwrap().unwrap().channel_values["output"],
            json!(2)
        );
    }

    #[tokio::test]
    async fn test_last_put_wins_for_same_step() {
        let saver = InMemorySaver::new();
        let config = CheckpointConfig::new().with_thread_id("t1");
        saver.put(&config, checkpoint_at(1, 10)).await.unwrap();
        saver.put(&config, checkpoint_at(1, 99)).await.unwrap();

        let history = saver.history("t1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].channel_values["output"], json!(99));
    }

    #[tokio::test]
    async fn test_missing_thread_id_is_an_error() {
        let saver = InMemorySaver::new();
        let result = saver.get(&CheckpointConfig::new()).await;
        assert!(matches!(result, Err(CheckpointError::Storage(_))));
    }

    #[tokio::test]
    async fn test_unknown_thread_returns_none() {
        let saver = InMemorySaver::new();
        let config = CheckpointConfig::new().with_thread_id("nope");
        assert!(saver.get(&config).await.unwrap().is_none());
    }
}
