//! Per-invocation run configuration

/// Options for a single `invoke`/`batch`/`stream` call
///
/// Unset fields fall back to the graph-level defaults configured on the
/// [`PregelBuilder`](crate::pregel::PregelBuilder).
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Checkpoint thread to read from and write to; required when the graph
    /// has a checkpointer
    pub thread_id: Option<String>,

    /// Step budget override for this run
    pub recursion_limit: Option<usize>,

    /// Channels to seed the caller's input into, overriding the graph
    /// default
    pub input_keys: Option<Vec<String>>,

    /// Channels to shape the output from, overriding the graph default.
    /// For `stream`, setting this filters the per-step deltas; a single key
    /// yields bare values instead of maps.
    pub output_keys: Option<Vec<String>>,

    /// Emit a terminal `{"__end__": final_output}` chunk from `stream`;
    /// used by graph-builder wrappers, off by default
    pub emit_end: bool,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_keys = Some(vec![key.into()]);
        self
    }

    pub fn with_input_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_keys = Some(vec![key.into()]);
        self
    }

    pub fn with_output_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_emit_end(mut self, emit_end: bool) -> Self {
        self.emit_end = emit_end;
        self
    }
}
