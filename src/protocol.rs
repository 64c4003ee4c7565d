use crate::types::SegmentId;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Key of the device info section in inbound frames
pub const INFO_KEY: &str = "info";

/// Key of the device state section in inbound frames
pub const STATE_KEY: &str = "state";

/// Key carrying the per-command transition override
pub const TRANSITION_OVERRIDE_KEY: &str = "tt";

const TRANSITION_MAX: i64 = 65535;

/// A value in an outbound command
///
/// The device accepts absolute values and a handful of string encodings
/// for relative or random changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandValue {
    /// Plain integer
    Absolute(i64),
    /// `"~N"`
    Increase(u32),
    /// `"~-N"`
    Decrease(u32),
    /// `"r"`
    Random,
    /// `"t"`, only meaningful for boolean fields
    Toggle,
}

impl CommandValue {
    /// Relative step in either direction
    pub fn step(forward: bool, steps: u32) -> Self {
        if forward {
            Self::Increase(steps)
        } else {
            Self::Decrease(steps)
        }
    }

    /// Wire representation
    pub fn to_value(self) -> Value {
        match self {
            Self::Absolute(n) => json!(n),
            Self::Increase(n) => json!(format!("~{}", n)),
            Self::Decrease(n) => json!(format!("~-{}", n)),
            Self::Random => json!("r"),
            Self::Toggle => json!("t"),
        }
    }
}

impl Serialize for CommandValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Encode a preset range `"start~end~flag"`, flag `r` meaning shuffle
pub fn preset_range(start: i32, end: i32, shuffle: bool) -> String {
    format!("{}~{}~{}", start, end, if shuffle { "r" } else { "" })
}

/// Ask the device to report its current info and state
pub fn request_update() -> Value {
    json!({ "v": true })
}

/// Build `{"seg":[{..fields, "id": n}, ...]}` with one entry per id
///
/// `fields` must be a JSON object; each entry is an independent copy.
pub fn segments_with(fields: &Value, ids: &[SegmentId]) -> Value {
    let seg: Vec<Value> = ids
        .iter()
        .map(|id| {
            let mut entry = match fields {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            entry.insert("id".to_string(), json!(id));
            Value::Object(entry)
        })
        .collect();

    json!({ "seg": seg })
}

/// Insert the client-local transition time, clamped to the device range
///
/// Non-object commands are left untouched.
pub fn inject_transition(message: &mut Value, transition_time: i64) {
    if let Some(obj) = message.as_object_mut() {
        obj.insert(
            TRANSITION_OVERRIDE_KEY.to_string(),
            json!(transition_time.clamp(0, TRANSITION_MAX)),
        );
    }
}

/// Look up and decode one top-level section of an inbound frame
///
/// Returns `None` if the section is absent, `Some(Err)` if it is present
/// but malformed.
pub fn parse_section<T: DeserializeOwned>(
    frame: &Value,
    key: &str,
) -> Option<std::result::Result<T, serde_json::Error>> {
    frame
        .get(key)
        .map(|section| T::deserialize(section))
}
