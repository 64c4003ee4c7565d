use serde_json::{json, Map, Value};

const PRESET_MIN: i64 = 1;
const PRESET_MAX: i64 = 250;

/// Builds a `psave` command storing the current state as a preset
///
/// ```
/// use wled_session::PresetBuilder;
///
/// let mut preset = PresetBuilder::new(3, Some("Evening"));
/// preset.include_brightness(true).quick_load_label(Some("E"));
/// let cmd = preset.build();
/// assert_eq!(cmd["psave"], 3);
/// assert_eq!(cmd["ql"], "E");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PresetBuilder {
    preset: Map<String, Value>,
}

impl PresetBuilder {
    /// `preset_id` is clamped to 1..=250; a blank name is omitted
    pub fn new(preset_id: i64, name: Option<&str>) -> Self {
        let mut preset = Map::new();
        preset.insert("psave".to_string(), json!(preset_id.clamp(PRESET_MIN, PRESET_MAX)));
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            preset.insert("n".to_string(), json!(name));
        }
        Self { preset }
    }

    /// Like [`new`](Self::new), additionally saving an API command with the preset
    ///
    /// Object fields merge recursively; any other value replaces what was there.
    pub fn with_command(preset_id: i64, name: Option<&str>, command: &Value) -> Self {
        let mut builder = Self::new(preset_id, name);
        if let Value::Object(fields) = command {
            merge_into(&mut builder.preset, fields);
        }
        builder
    }

    pub fn include_brightness(&mut self, include: bool) -> &mut Self {
        self.preset.insert("ib".to_string(), json!(include));
        self
    }

    pub fn include_segments(&mut self, include: bool) -> &mut Self {
        self.preset.insert("sb".to_string(), json!(include));
        self
    }

    /// Save only the selected segments
    pub fn checked_segments_only(&mut self, only: bool) -> &mut Self {
        self.preset.insert("sc".to_string(), json!(only));
        self
    }

    pub fn quick_load_label(&mut self, label: Option<&str>) -> &mut Self {
        self.preset.insert("ql".to_string(), json!(label));
        self
    }

    pub fn build(&self) -> Value {
        Value::Object(self.preset.clone())
    }
}

fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_into(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_clamped_and_blank_name_skipped() {
        assert_eq!(PresetBuilder::new(0, Some(" ")).build(), json!({ "psave": 1 }));
        assert_eq!(
            PresetBuilder::new(400, Some("Night")).build(),
            json!({ "psave": 250, "n": "Night" })
        );
    }

    #[test]
    fn flags_are_set() {
        let mut preset = PresetBuilder::new(5, None);
        preset
            .include_brightness(true)
            .include_segments(false)
            .checked_segments_only(true)
            .quick_load_label(None);

        assert_eq!(
            preset.build(),
            json!({ "psave": 5, "ib": true, "sb": false, "sc": true, "ql": null })
        );
    }

    #[test]
    fn custom_command_is_merged() {
        let preset = PresetBuilder::with_command(
            2,
            Some("Party"),
            &json!({ "on": true, "n": "Override", "nl": { "dur": 10 } }),
        );

        assert_eq!(
            preset.build(),
            json!({ "psave": 2, "n": "Override", "on": true, "nl": { "dur": 10 } })
        );
    }
}
