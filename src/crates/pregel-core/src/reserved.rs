//! Reserved channel names
//!
//! These names belong to the engine. `is_last_step` is written by the run
//! loop itself (true exactly on the final budgeted step) and is always part
//! of the channel set; nodes may `join` it but never trigger on it.

/// Boolean channel set by the run loop before each step
pub const IS_LAST_STEP: &str = "is_last_step";

/// Default input channel name when none is configured
pub const DEFAULT_INPUT_CHANNEL: &str = "input";

/// Default output channel name when none is configured
pub const DEFAULT_OUTPUT_CHANNEL: &str = "output";

/// Key of the terminal stream entry carrying the final output
pub const END: &str = "__end__";

/// Whether a channel name is reserved for engine use
pub fn is_reserved(name: &str) -> bool {
    name == IS_LAST_STEP || name.starts_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved(IS_LAST_STEP));
        assert!(is_reserved(END));
        assert!(!is_reserved("output"));
    }
}
