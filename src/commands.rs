//! Free-standing commands over any [`DeviceSession`]
//!
//! Every function reads the session's snapshots once, at call time, and
//! sends a single fire-and-forget command. Functions taking segment targets
//! resolve them against the current state on every call.

use crate::error::Result;
use crate::preset::PresetBuilder;
use crate::protocol::{preset_range, segments_with, CommandValue};
use crate::session::DeviceSession;
use crate::targets::{resolve_targets, SegmentTarget};
use crate::types::Rgb;
use rand::Rng;
use serde_json::{json, Value};
use std::future::Future;

const PRESET_MIN: i64 = 1;
const PRESET_MAX: i64 = 250;

/// Where a command applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// The top-level device state
    Device,
    /// Selected segments; an empty slice means every segment
    Segments(&'a [SegmentTarget]),
}

/// Send `{key: value}` either top-level or once per resolved segment
async fn send_field(session: &dyn DeviceSession, scope: Scope<'_>, key: &str, value: Value) -> Result<()> {
    let mut fields = serde_json::Map::new();
    fields.insert(key.to_string(), value);
    let fields = Value::Object(fields);

    match scope {
        Scope::Device => session.send_value(fields).await,
        Scope::Segments(targets) => send_to_segments(session, targets, &fields).await,
    }
}

async fn send_to_segments(
    session: &dyn DeviceSession,
    targets: &[SegmentTarget],
    fields: &Value,
) -> Result<()> {
    let state = session.state_or_err()?;
    let ids = resolve_targets(&state, targets);
    if ids.is_empty() {
        tracing::debug!("No existing segments matched {:?}, nothing sent", targets);
        return Ok(());
    }

    session.send_value(segments_with(fields, &ids)).await
}

// ========== Power ==========

pub async fn turn_on(session: &dyn DeviceSession, scope: Scope<'_>) -> Result<()> {
    send_field(session, scope, "on", json!(true)).await
}

pub async fn turn_off(session: &dyn DeviceSession, scope: Scope<'_>) -> Result<()> {
    send_field(session, scope, "on", json!(false)).await
}

pub async fn toggle(session: &dyn DeviceSession, scope: Scope<'_>) -> Result<()> {
    send_field(session, scope, "on", CommandValue::Toggle.to_value()).await
}

// ========== Brightness ==========

/// Set brightness, clamped to 0..=255
///
/// # Example
///
/// ```no_run
/// use wled_session::{commands, commands::Scope, SegmentTarget, WledClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = WledClient::new("192.168.1.50");
///     client.connect(true).await?;
///     commands::set_brightness(&client, Scope::Device, 128).await?;
///     commands::set_brightness(&client, Scope::Segments(&[SegmentTarget::Main]), 40).await?;
///     Ok(())
/// }
/// ```
pub async fn set_brightness(session: &dyn DeviceSession, scope: Scope<'_>, brightness: i64) -> Result<()> {
    let value = CommandValue::Absolute(brightness.clamp(0, 255));
    send_field(session, scope, "bri", value.to_value()).await
}

/// Let the device pick a random brightness
pub async fn set_random_brightness(session: &dyn DeviceSession, scope: Scope<'_>) -> Result<()> {
    send_field(session, scope, "bri", CommandValue::Random.to_value()).await
}

pub async fn increase_brightness(session: &dyn DeviceSession, scope: Scope<'_>, amount: i64) -> Result<()> {
    let value = CommandValue::Increase(amount.clamp(0, 255) as u32);
    send_field(session, scope, "bri", value.to_value()).await
}

pub async fn decrease_brightness(session: &dyn DeviceSession, scope: Scope<'_>, amount: i64) -> Result<()> {
    let value = CommandValue::Decrease(amount.clamp(0, 255) as u32);
    send_field(session, scope, "bri", value.to_value()).await
}

// ========== Color ==========

/// Set the three color slots of the targeted segments
///
/// `None` is sent as an empty string, which leaves that slot unchanged.
pub async fn set_colors(
    session: &dyn DeviceSession,
    targets: &[SegmentTarget],
    primary: Option<Rgb>,
    secondary: Option<Rgb>,
    tertiary: Option<Rgb>,
) -> Result<()> {
    let slot = |color: Option<Rgb>| color.map(Rgb::to_hex).unwrap_or_default();
    let fields = json!({ "col": [slot(primary), slot(secondary), slot(tertiary)] });
    send_to_segments(session, targets, &fields).await
}

pub async fn set_primary_color(session: &dyn DeviceSession, targets: &[SegmentTarget], color: Rgb) -> Result<()> {
    set_colors(session, targets, Some(color), None, None).await
}

pub async fn set_secondary_color(session: &dyn DeviceSession, targets: &[SegmentTarget], color: Rgb) -> Result<()> {
    set_colors(session, targets, None, Some(color), None).await
}

pub async fn set_tertiary_color(session: &dyn DeviceSession, targets: &[SegmentTarget], color: Rgb) -> Result<()> {
    set_colors(session, targets, None, None, Some(color)).await
}

// ========== Effects ==========

pub fn is_valid_effect_id(session: &dyn DeviceSession, effect_id: i64) -> Result<bool> {
    let count = i64::from(session.info_or_err()?.effect_count);
    Ok((0..count).contains(&effect_id))
}

/// Clamp to the ids the device reports. Needs device info.
pub fn clamp_effect_id(session: &dyn DeviceSession, effect_id: i64) -> Result<u32> {
    let count = session.info_or_err()?.effect_count;
    Ok(clamp_to_count(effect_id, count))
}

pub fn random_effect_id<R: Rng + ?Sized>(session: &dyn DeviceSession, rng: &mut R) -> Result<u32> {
    let count = session.info_or_err()?.effect_count;
    Ok(random_below(rng, count))
}

pub async fn set_effect(session: &dyn DeviceSession, targets: &[SegmentTarget], effect_id: i64) -> Result<()> {
    let effect_id = clamp_effect_id(session, effect_id)?;
    send_to_segments(session, targets, &json!({ "fx": effect_id })).await
}

/// Pick an effect with `rng` and apply it
///
/// The id is drawn before the returned future runs, so `rng` need not be `Send`.
pub fn set_random_effect<'a, R: Rng + ?Sized>(
    session: &'a dyn DeviceSession,
    targets: &'a [SegmentTarget],
    rng: &mut R,
) -> impl Future<Output = Result<()>> + Send + 'a {
    let effect_id = random_effect_id(session, rng);
    async move { set_effect(session, targets, i64::from(effect_id?)).await }
}

/// Move `steps` effects forward or back
pub async fn step_effects(
    session: &dyn DeviceSession,
    targets: &[SegmentTarget],
    forward: bool,
    steps: u32,
) -> Result<()> {
    let fields = json!({ "fx": CommandValue::step(forward, steps) });
    send_to_segments(session, targets, &fields).await
}

// ========== Palettes ==========

pub fn is_valid_palette_id(session: &dyn DeviceSession, palette_id: i64) -> Result<bool> {
    let count = i64::from(session.info_or_err()?.palette_count);
    Ok((0..count).contains(&palette_id))
}

/// Clamp to the ids the device reports. Needs device info.
pub fn clamp_palette_id(session: &dyn DeviceSession, palette_id: i64) -> Result<u32> {
    let count = session.info_or_err()?.palette_count;
    Ok(clamp_to_count(palette_id, count))
}

pub fn random_palette_id<R: Rng + ?Sized>(session: &dyn DeviceSession, rng: &mut R) -> Result<u32> {
    let count = session.info_or_err()?.palette_count;
    Ok(random_below(rng, count))
}

pub async fn set_palette(session: &dyn DeviceSession, targets: &[SegmentTarget], palette_id: i64) -> Result<()> {
    let palette_id = clamp_palette_id(session, palette_id)?;
    send_to_segments(session, targets, &json!({ "pal": palette_id })).await
}

pub fn set_random_palette<'a, R: Rng + ?Sized>(
    session: &'a dyn DeviceSession,
    targets: &'a [SegmentTarget],
    rng: &mut R,
) -> impl Future<Output = Result<()>> + Send + 'a {
    let palette_id = random_palette_id(session, rng);
    async move { set_palette(session, targets, i64::from(palette_id?)).await }
}

pub async fn step_palettes(
    session: &dyn DeviceSession,
    targets: &[SegmentTarget],
    forward: bool,
    steps: u32,
) -> Result<()> {
    let fields = json!({ "pal": CommandValue::step(forward, steps) });
    send_to_segments(session, targets, &fields).await
}

// ========== Transition ==========

/// Device-wide crossfade duration in units of 100ms, clamped to 0..=65535
pub async fn set_transition_duration(session: &dyn DeviceSession, duration: i64) -> Result<()> {
    session
        .send_value(json!({ "transition": duration.clamp(0, 65535) }))
        .await
}

// ========== Presets ==========

/// Load a preset; `-1` is accepted and means none
pub async fn load_preset(session: &dyn DeviceSession, preset_id: i64) -> Result<()> {
    session
        .send_value(json!({ "ps": preset_id.clamp(-1, PRESET_MAX) }))
        .await
}

/// Cycle through presets `start..=end`, optionally shuffled
pub async fn load_preset_range(session: &dyn DeviceSession, start: i64, end: i64, shuffle: bool) -> Result<()> {
    let start = start.clamp(-1, PRESET_MAX) as i32;
    let end = end.clamp(-1, PRESET_MAX) as i32;
    session
        .send_value(json!({ "ps": preset_range(start, end, shuffle) }))
        .await
}

pub async fn save_preset(session: &dyn DeviceSession, preset: &PresetBuilder) -> Result<()> {
    session.send_value(preset.build()).await
}

pub async fn delete_preset(session: &dyn DeviceSession, preset_id: i64) -> Result<()> {
    session
        .send_value(json!({ "pdel": preset_id.clamp(PRESET_MIN, PRESET_MAX) }))
        .await
}

fn clamp_to_count(id: i64, count: u32) -> u32 {
    id.clamp(0, (i64::from(count) - 1).max(0)) as u32
}

fn random_below<R: Rng + ?Sized>(rng: &mut R, count: u32) -> u32 {
    if count == 0 {
        0
    } else {
        rng.gen_range(0..count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WledError;
    use crate::session::fake::{info, state_with_segments, FakeSession};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session() -> FakeSession {
        FakeSession::default()
            .with_info(info(60, 8, 10, 5))
            .with_state(state_with_segments(&[0, 1, 4], 1))
    }

    #[tokio::test]
    async fn device_scope_sends_top_level_field() {
        let session = session();
        set_brightness(&session, Scope::Device, 400).await.unwrap();
        turn_off(&session, Scope::Device).await.unwrap();

        assert_eq!(session.sent(), vec![json!({ "bri": 255 }), json!({ "on": false })]);
    }

    #[tokio::test]
    async fn segment_scope_sends_one_entry_per_resolved_id() {
        let session = session();
        let targets = [SegmentTarget::Main, SegmentTarget::Id(4), SegmentTarget::Id(7)];
        toggle(&session, Scope::Segments(&targets)).await.unwrap();

        assert_eq!(
            session.sent(),
            vec![json!({ "seg": [ { "on": "t", "id": 1 }, { "on": "t", "id": 4 } ] })]
        );
    }

    #[tokio::test]
    async fn relative_and_random_brightness() {
        let session = session();
        increase_brightness(&session, Scope::Device, 10).await.unwrap();
        decrease_brightness(&session, Scope::Device, 999).await.unwrap();
        set_random_brightness(&session, Scope::Segments(&[])).await.unwrap();

        let sent = session.sent();
        assert_eq!(sent[0], json!({ "bri": "~10" }));
        assert_eq!(sent[1], json!({ "bri": "~-255" }));
        assert_eq!(sent[2]["seg"].as_array().unwrap().len(), 3);
        assert_eq!(sent[2]["seg"][2], json!({ "bri": "r", "id": 4 }));
    }

    #[tokio::test]
    async fn segment_scope_needs_state() {
        let session = FakeSession::default().with_info(info(60, 8, 10, 5));
        let result = turn_on(&session, Scope::Segments(&[])).await;
        assert!(matches!(result, Err(WledError::StateUnavailable)));
        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn colors_keep_unset_slots_empty() {
        let session = session();
        set_secondary_color(&session, &[SegmentTarget::Id(0)], Rgb::new(0, 255, 0))
            .await
            .unwrap();

        assert_eq!(
            session.sent(),
            vec![json!({ "seg": [ { "col": ["", "00FF00", ""], "id": 0 } ] })]
        );
    }

    #[tokio::test]
    async fn effects_are_clamped_and_stepped() {
        let session = session();
        assert!(is_valid_effect_id(&session, 9).unwrap());
        assert!(!is_valid_effect_id(&session, 10).unwrap());

        set_effect(&session, &[SegmentTarget::Id(1)], 42).await.unwrap();
        step_effects(&session, &[SegmentTarget::Id(1)], false, 2).await.unwrap();

        let sent = session.sent();
        assert_eq!(sent[0], json!({ "seg": [ { "fx": 9, "id": 1 } ] }));
        assert_eq!(sent[1], json!({ "seg": [ { "fx": "~-2", "id": 1 } ] }));
    }

    #[tokio::test]
    async fn random_palette_is_deterministic_with_seeded_rng() {
        let session = session();
        let mut rng = StdRng::seed_from_u64(7);
        let expected = StdRng::seed_from_u64(7).gen_range(0..5u32);

        set_random_palette(&session, &[SegmentTarget::Id(0)], &mut rng).await.unwrap();

        assert_eq!(session.sent()[0], json!({ "seg": [ { "pal": expected, "id": 0 } ] }));
    }

    #[test]
    fn random_ids_stay_in_range() {
        let session = session();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(random_effect_id(&session, &mut rng).unwrap() < 10);
            assert!(random_palette_id(&session, &mut rng).unwrap() < 5);
        }
    }

    #[tokio::test]
    async fn preset_commands_clamp_ids() {
        let session = session();
        load_preset(&session, 999).await.unwrap();
        load_preset_range(&session, -5, 12, true).await.unwrap();
        delete_preset(&session, 0).await.unwrap();
        set_transition_duration(&session, 70_000).await.unwrap();

        assert_eq!(
            session.sent(),
            vec![
                json!({ "ps": 250 }),
                json!({ "ps": "-1~12~r" }),
                json!({ "pdel": 1 }),
                json!({ "transition": 65535 }),
            ]
        );
    }
}
