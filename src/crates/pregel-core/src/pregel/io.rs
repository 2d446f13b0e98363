//! Input seeding and output shaping
//!
//! Maps between the caller's values and channel reads/writes: seeding the
//! input channels at step zero, packaging joined reads, shaping the final
//! output, and projecting per-step deltas for the streaming form.

use crate::error::{GraphError, Result};
use crate::reserved;
use pregel_checkpoint::Channel;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Read a single channel, `None` when empty or unknown
pub(crate) fn read_channel(
    channels: &HashMap<String, Box<dyn Channel>>,
    name: &str,
) -> Option<Value> {
    channels.get(name).and_then(|channel| channel.get().ok())
}

/// Package a joined read as `{name: value, ...}`, skipping empty channels
pub(crate) fn read_joined(
    channels: &HashMap<String, Box<dyn Channel>>,
    names: &[String],
) -> Value {
    let mut map = Map::new();
    for name in names {
        if let Some(value) = read_channel(channels, name) {
            map.insert(name.clone(), value);
        }
    }
    Value::Object(map)
}

/// Turn the caller's input into channel writes
///
/// A single input channel takes the value as-is. Multiple input channels
/// require a JSON object keyed by channel name; keys outside the input set
/// are rejected rather than silently dropped.
pub(crate) fn map_input_writes(
    input: Value,
    input_keys: &[String],
) -> Result<Vec<(String, Value)>> {
    if input_keys.len() == 1 {
        return Ok(vec![(input_keys[0].clone(), input)]);
    }

    let Value::Object(mut object) = input else {
        return Err(GraphError::Validation(format!(
            "input for channels {input_keys:?} must be a JSON object"
        )));
    };

    let mut writes = Vec::new();
    for key in input_keys {
        if let Some(value) = object.remove(key) {
            writes.push((key.clone(), value));
        }
    }
    if let Some(unexpected) = object.keys().next() {
        return Err(GraphError::Validation(format!(
            "input key '{unexpected}' is not one of the configured input channels"
        )));
    }
    Ok(writes)
}

/// Read the final output: scalar for one configured channel, map otherwise
pub(crate) fn map_output_value(
    channels: &HashMap<String, Box<dyn Channel>>,
    output_keys: &[String],
) -> Option<Value> {
    if output_keys.len() == 1 {
        return read_channel(channels, &output_keys[0]);
    }
    let mut map = Map::new();
    for key in output_keys {
        if let Some(value) = read_channel(channels, key) {
            map.insert(key.clone(), value);
        }
    }
    Some(Value::Object(map))
}

/// Project one step's committed delta for the streaming form
///
/// With no selector, the delta is a map over every touched, non-reserved
/// channel. A single-key selector yields the bare value when that channel
/// was touched; a multi-key selector filters the map. `None` means the
/// step produced nothing the caller asked to see.
pub(crate) fn map_step_delta(
    channels: &HashMap<String, Box<dyn Channel>>,
    touched: &HashSet<String>,
    selector: Option<&[String]>,
) -> Option<Value> {
    match selector {
        None => {
            let mut names: Vec<&String> = touched
                .iter()
                .filter(|name| !reserved::is_reserved(name))
                .collect();
            names.sort();
            let mut map = Map::new();
            for name in names {
                if let Some(value) = read_channel(channels, name) {
                    map.insert(name.clone(), value);
                }
            }
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        Some([single]) => {
            if touched.contains(single) {
                read_channel(channels, single)
            } else {
                None
            }
        }
        Some(keys) => {
            let mut map = Map::new();
            for key in keys {
                if touched.contains(key) {
                    if let Some(value) = read_channel(channels, key) {
                        map.insert(key.clone(), value);
                    }
                }
            }
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregel_checkpoint::LastValueChannel;
    use serde_json::json;

    fn channels_with(values: &[(&str, Value)]) -> HashMap<String, Box<dyn Channel>> {
        let mut channels: HashMap<String, Box<dyn Channel>> = HashMap::new();
        for (name, value) in values {
            channels.insert(
                name.to_string(),
                Box::new(LastValueChannel::with_value(value.clone())),
            );
        }
        channels
    }

    #[test]
    fn test_single_input_key_takes_value_as_is() {
        let writes = map_input_writes(json!(2), &["input".to_string()]).unwrap();
        assert_eq!(writes, vec![("input".to_string(), json!(2))]);
    }

    #[test]
    fn test_multi_input_keys_require_object() {
        let keys = vec!["input".to_string(), "inbox".to_string()];
        let writes = map_input_writes(json!({"input": 2, "inbox": 12}), &keys).unwrap();
        assert_eq!(
            writes,
            vec![
                ("input".to_string(), json!(2)),
                ("inbox".to_string(), json!(12)),
            ]
        );

        assert!(map_input_writes(json!(2), &keys).is_err());
        assert!(map_input_writes(json!({"bogus": 1}), &keys).is_err());
    }

    #[test]
    fn test_joined_read_skips_empty_channels() {
        let mut channels = channels_with(&[("input", json!(2))]);
        channels.insert("empty".to_string(), Box::new(LastValueChannel::new()));

        let joined = read_joined(&channels, &["input".to_string(), "empty".to_string()]);
        assert_eq!(joined, json!({"input": 2}));
    }

    #[test]
    fn test_step_delta_default_selector() {
        let channels = channels_with(&[("inbox", json!(3)), ("other", json!(9))]);
        let touched: HashSet<String> = ["inbox".to_string()].into_iter().collect();

        let delta = map_step_delta(&channels, &touched, None).unwrap();
        assert_eq!(delta, json!({"inbox": 3}));
    }

    #[test]
    fn test_step_delta_single_key_selector_is_scalar() {
        let channels = channels_with(&[("output", json!(13))]);
        let touched: HashSet<String> = ["output".to_string()].into_iter().collect();
        let selector = vec!["output".to_string()];

        let delta = map_step_delta(&channels, &touched, Some(&selector));
        assert_eq!(delta, Some(json!(13)));

        let untouched: HashSet<String> = HashSet::new();
        assert_eq!(map_step_delta(&channels, &untouched, Some(&selector)), None);
    }

    #[test]
    fn test_step_delta_hides_reserved_channels() {
        let channels = channels_with(&[("is_last_step", json!(true)), ("output", json!(4))]);
        let touched: HashSet<String> = ["is_last_step".to_string(), "output".to_string()]
            .into_iter()
            .collect();

        let delta = map_step_delta(&channels, &touched, None).unwrap();
        assert_eq!(delta, json!({"output": 4}));
    }

    #[test]
    fn test_output_value_scalar_and_map() {
        let channels = channels_with(&[("output", json!(3)), ("total", json!(7))]);

        assert_eq!(
            map_output_value(&channels, &["output".to_string()]),
            Some(json!(3))
        );
        assert_eq!(
            map_output_value(&channels, &["output".to_string(), "total".to_string()]),
            Some(json!({"output": 3, "total": 7}))
        );
        // empty scalar output is the "no value" sentinel
        let empty: HashMap<String, Box<dyn Channel>> = HashMap::new();
        assert_eq!(map_output_value(&empty, &["output".to_string()]), None);
    }
}
