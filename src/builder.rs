use crate::commands::{clamp_effect_id, clamp_palette_id};
use crate::error::{Result, WledError};
use crate::session::DeviceSession;
use crate::types::{Rgb, SegmentId};
use serde::Serialize;
use serde_json::Value;

/// Color assigned by [`SegmentBuilder::set_defaults`] when asked to set colors
pub const DEFAULT_SEGMENT_COLOR: Rgb = Rgb::new(255, 160, 0);

const CCT_RELATIVE: std::ops::RangeInclusive<i64> = 0..=255;
const CCT_KELVIN: std::ops::RangeInclusive<i64> = 1900..=10091;

/// One segment as it will be sent to the device
///
/// Only fields that were explicitly set are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentSpec {
    pub id: SegmentId,
    pub start: u32,
    pub stop: u32,
    #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "grp", skip_serializing_if = "Option::is_none")]
    pub group: Option<u8>,
    #[serde(rename = "spc", skip_serializing_if = "Option::is_none")]
    pub spacing: Option<u8>,
    #[serde(rename = "of", skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(rename = "col", skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(rename = "fx", skip_serializing_if = "Option::is_none")]
    pub effect_id: Option<u32>,
    #[serde(rename = "sx", skip_serializing_if = "Option::is_none")]
    pub speed: Option<u8>,
    #[serde(rename = "ix", skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
    #[serde(rename = "c1", skip_serializing_if = "Option::is_none")]
    pub custom_slider1: Option<u8>,
    #[serde(rename = "c2", skip_serializing_if = "Option::is_none")]
    pub custom_slider2: Option<u8>,
    #[serde(rename = "c3", skip_serializing_if = "Option::is_none")]
    pub custom_slider3: Option<u8>,
    #[serde(rename = "o1", skip_serializing_if = "Option::is_none")]
    pub effect_option1: Option<bool>,
    #[serde(rename = "o2", skip_serializing_if = "Option::is_none")]
    pub effect_option2: Option<bool>,
    #[serde(rename = "o3", skip_serializing_if = "Option::is_none")]
    pub effect_option3: Option<bool>,
    #[serde(rename = "pal", skip_serializing_if = "Option::is_none")]
    pub palette_id: Option<u32>,
    #[serde(rename = "sel", skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(rename = "rev", skip_serializing_if = "Option::is_none")]
    pub reverse: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(rename = "bri", skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(rename = "mi", skip_serializing_if = "Option::is_none")]
    pub mirror: Option<bool>,
    #[serde(rename = "cct", skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<u16>,
    #[serde(rename = "frz", skip_serializing_if = "Option::is_none")]
    pub freeze: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<u8>,
}

/// `{"seg":[...]}` command produced by a builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentCommand {
    seg: Vec<SegmentSpec>,
}

impl SegmentCommand {
    pub fn segments(&self) -> &[SegmentSpec] {
        &self.seg
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Size of the compact JSON encoding in bytes
    pub fn encoded_len(&self) -> Result<usize> {
        Ok(serde_json::to_string(self)?.len())
    }
}

/// Builds segment commands one segment at a time
///
/// [`add_segment`](Self::add_segment) appends a segment and makes it the
/// current one; every setter edits the current segment only.
///
/// # Example
///
/// ```no_run
/// use wled_session::{set_segments, Rgb, SegmentBuilder, WledClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = WledClient::new("192.168.1.50");
///     client.connect(true).await?;
///
///     let mut builder = SegmentBuilder::new(&client);
///     builder
///         .add_segment(0, 30, Some("left"), None)?
///         .set_defaults(false)?
///         .color(Some(Rgb::new(255, 0, 0)), None, None)?;
///     builder
///         .add_segment(30, 60, Some("right"), None)?
///         .effect(9)?
///         .speed(200)?;
///
///     set_segments(&client, &builder, false).await?;
///     Ok(())
/// }
/// ```
pub struct SegmentBuilder<'a> {
    session: &'a dyn DeviceSession,
    segments: Vec<SegmentSpec>,
    current: Option<usize>,
}

impl<'a> SegmentBuilder<'a> {
    pub fn new(session: &'a dyn DeviceSession) -> Self {
        Self {
            session,
            segments: Vec::new(),
            current: None,
        }
    }

    /// Number of segments added so far
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment covering `start..stop` and make it current
    ///
    /// Needs device info. `id` defaults to the number of segments already
    /// added. Values are clamped: `id` to the device's segment limit,
    /// `start` to the LED range and `stop` to `start..=led_count`.
    pub fn add_segment(
        &mut self,
        start: i64,
        stop: i64,
        name: Option<&str>,
        id: Option<i64>,
    ) -> Result<&mut Self> {
        let info = self.session.info_or_err()?;
        let led_count = i64::from(info.led_info.count);
        let max_segments = info.led_info.max_segments;

        if self.segments.len() >= max_segments as usize {
            return Err(WledError::CapacityExceeded {
                limit: max_segments,
            });
        }

        let id = id
            .unwrap_or(self.segments.len() as i64)
            .clamp(0, (i64::from(max_segments) - 1).max(0));
        let start = start.clamp(0, (led_count - 1).max(0));
        let stop = stop.clamp(start, led_count.max(start));

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        self.segments.push(SegmentSpec {
            id: id as SegmentId,
            start: start as u32,
            stop: stop as u32,
            name,
            ..Default::default()
        });
        self.current = Some(self.segments.len() - 1);
        Ok(self)
    }

    /// Reset every setting of the current segment to the device baseline
    ///
    /// With `set_color`, also assigns [`DEFAULT_SEGMENT_COLOR`] to all three
    /// color slots.
    pub fn set_defaults(&mut self, set_color: bool) -> Result<&mut Self> {
        self.group(0)?
            .spacing(0)?
            .offset(0)?
            .effect(0)?
            .speed(128)?
            .intensity(128)?
            .palette(0)?
            .selected(true)?
            .reverse(false)?
            .on(true)?
            .brightness(255)?
            .mirror(false)?
            .color_temperature(255)?
            .freeze(false)?
            .set(0)?
            .custom_slider1(0)?
            .custom_slider2(0)?
            .custom_slider3(0)?
            .effect_option1(false)?
            .effect_option2(false)?
            .effect_option3(false)?;

        if set_color {
            let color = Some(DEFAULT_SEGMENT_COLOR);
            self.color(color, color, color)?;
        }
        Ok(self)
    }

    /// Pixels per group, 0..=255
    pub fn group(&mut self, group: i64) -> Result<&mut Self> {
        self.current_mut()?.group = Some(clamp_u8(group));
        Ok(self)
    }

    /// Pixels skipped between groups, 0..=255
    pub fn spacing(&mut self, spacing: i64) -> Result<&mut Self> {
        self.current_mut()?.spacing = Some(clamp_u8(spacing));
        Ok(self)
    }

    /// Rotation of the effect start, passed through unchanged
    pub fn offset(&mut self, offset: i64) -> Result<&mut Self> {
        self.current_mut()?.offset = Some(offset);
        Ok(self)
    }

    /// Primary, secondary and tertiary colors
    ///
    /// A missing primary is sent as black. Missing secondary or tertiary
    /// colors are left out so the device keeps its current ones.
    pub fn color(
        &mut self,
        primary: Option<Rgb>,
        secondary: Option<Rgb>,
        tertiary: Option<Rgb>,
    ) -> Result<&mut Self> {
        let segment = self.current_mut()?;

        let mut colors = vec![primary.unwrap_or(Rgb::BLACK).to_hex()];
        colors.extend(secondary.map(Rgb::to_hex));
        colors.extend(tertiary.map(Rgb::to_hex));

        segment.colors = Some(colors);
        Ok(self)
    }

    /// Effect id, clamped to the device's effect count. Needs device info.
    pub fn effect(&mut self, effect_id: i64) -> Result<&mut Self> {
        let effect_id = clamp_effect_id(self.session, effect_id)?;
        self.current_mut()?.effect_id = Some(effect_id);
        Ok(self)
    }

    pub fn speed(&mut self, speed: i64) -> Result<&mut Self> {
        self.current_mut()?.speed = Some(clamp_u8(speed));
        Ok(self)
    }

    pub fn intensity(&mut self, intensity: i64) -> Result<&mut Self> {
        self.current_mut()?.intensity = Some(clamp_u8(intensity));
        Ok(self)
    }

    pub fn custom_slider1(&mut self, value: i64) -> Result<&mut Self> {
        self.current_mut()?.custom_slider1 = Some(clamp_u8(value));
        Ok(self)
    }

    pub fn custom_slider2(&mut self, value: i64) -> Result<&mut Self> {
        self.current_mut()?.custom_slider2 = Some(clamp_u8(value));
        Ok(self)
    }

    pub fn custom_slider3(&mut self, value: i64) -> Result<&mut Self> {
        self.current_mut()?.custom_slider3 = Some(clamp_u8(value));
        Ok(self)
    }

    pub fn effect_option1(&mut self, enabled: bool) -> Result<&mut Self> {
        self.current_mut()?.effect_option1 = Some(enabled);
        Ok(self)
    }

    pub fn effect_option2(&mut self, enabled: bool) -> Result<&mut Self> {
        self.current_mut()?.effect_option2 = Some(enabled);
        Ok(self)
    }

    pub fn effect_option3(&mut self, enabled: bool) -> Result<&mut Self> {
        self.current_mut()?.effect_option3 = Some(enabled);
        Ok(self)
    }

    /// Palette id, clamped to the device's palette count. Needs device info.
    pub fn palette(&mut self, palette_id: i64) -> Result<&mut Self> {
        let palette_id = clamp_palette_id(self.session, palette_id)?;
        self.current_mut()?.palette_id = Some(palette_id);
        Ok(self)
    }

    pub fn selected(&mut self, selected: bool) -> Result<&mut Self> {
        self.current_mut()?.selected = Some(selected);
        Ok(self)
    }

    pub fn reverse(&mut self, reverse: bool) -> Result<&mut Self> {
        self.current_mut()?.reverse = Some(reverse);
        Ok(self)
    }

    pub fn on(&mut self, on: bool) -> Result<&mut Self> {
        self.current_mut()?.on = Some(on);
        Ok(self)
    }

    pub fn brightness(&mut self, brightness: i64) -> Result<&mut Self> {
        self.current_mut()?.brightness = Some(clamp_u8(brightness));
        Ok(self)
    }

    pub fn mirror(&mut self, mirror: bool) -> Result<&mut Self> {
        self.current_mut()?.mirror = Some(mirror);
        Ok(self)
    }

    /// Color temperature: 0..=255 relative or 1900..=10091 Kelvin
    ///
    /// Anything else is rejected rather than clamped.
    pub fn color_temperature(&mut self, color_temperature: i64) -> Result<&mut Self> {
        if !CCT_RELATIVE.contains(&color_temperature) && !CCT_KELVIN.contains(&color_temperature) {
            return Err(WledError::Validation(format!(
                "Color temperature must be between 0 and 255 or 1900 and 10091, got {}",
                color_temperature
            )));
        }
        self.current_mut()?.color_temperature = Some(color_temperature as u16);
        Ok(self)
    }

    pub fn freeze(&mut self, freeze: bool) -> Result<&mut Self> {
        self.current_mut()?.freeze = Some(freeze);
        Ok(self)
    }

    /// UI segment set, 0..=3
    pub fn set(&mut self, set: i64) -> Result<&mut Self> {
        self.current_mut()?.set = Some(set.clamp(0, 3) as u8);
        Ok(self)
    }

    /// One command carrying every segment
    pub fn build(&self) -> SegmentCommand {
        SegmentCommand {
            seg: self.segments.clone(),
        }
    }

    /// One command per segment, in the order they were added
    pub fn build_split(&self) -> Vec<SegmentCommand> {
        self.segments
            .iter()
            .map(|segment| SegmentCommand {
                seg: vec![segment.clone()],
            })
            .collect()
    }

    fn current_mut(&mut self) -> Result<&mut SegmentSpec> {
        self.current
            .and_then(|index| self.segments.get_mut(index))
            .ok_or(WledError::NoSegment)
    }
}

fn clamp_u8(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::{info, FakeSession};
    use serde_json::json;

    fn session() -> FakeSession {
        FakeSession::default().with_info(info(100, 4, 50, 20))
    }

    #[test]
    fn add_segment_clamps_range_and_id() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);

        builder.add_segment(-5, 500, None, Some(9)).unwrap();
        builder.add_segment(120, 10, Some("  "), None).unwrap();
        builder.add_segment(10, 5, Some("tail"), None).unwrap();

        let cmd = builder.build();
        let segs = cmd.segments();
        assert_eq!((segs[0].id, segs[0].start, segs[0].stop), (3, 0, 100));
        assert_eq!((segs[1].id, segs[1].start, segs[1].stop), (1, 99, 99));
        assert_eq!(segs[1].name, None);
        assert_eq!((segs[2].id, segs[2].start, segs[2].stop), (2, 10, 10));
        assert_eq!(segs[2].name.as_deref(), Some("tail"));
    }

    #[test]
    fn valid_ranges_are_stored_unchanged() {
        let session = session();
        for (start, stop) in [(0, 0), (0, 100), (25, 75), (99, 100)] {
            let mut builder = SegmentBuilder::new(&session);
            builder.add_segment(start, stop, None, None).unwrap();
            let built = builder.build();
            let seg = &built.segments()[0];
            assert_eq!((seg.start as i64, seg.stop as i64), (start.min(99), stop));
        }
    }

    #[test]
    fn capacity_is_bounded_by_max_segments() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);
        for i in 0..4 {
            builder.add_segment(i * 10, i * 10 + 10, None, None).unwrap();
        }

        let err = builder.add_segment(0, 1, None, None).err().unwrap();
        assert!(matches!(err, WledError::CapacityExceeded { limit: 4 }));
        assert_eq!(builder.len(), 4);
    }

    #[test]
    fn add_segment_needs_info() {
        let session = FakeSession::default();
        let mut builder = SegmentBuilder::new(&session);
        assert!(matches!(
            builder.add_segment(0, 10, None, None).err(),
            Some(WledError::InfoUnavailable)
        ));
    }

    #[test]
    fn setters_require_a_current_segment() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);

        assert!(matches!(builder.speed(10).err(), Some(WledError::NoSegment)));
        assert!(matches!(builder.color(None, None, None).err(), Some(WledError::NoSegment)));
        assert!(builder.is_empty());
    }

    #[test]
    fn setters_edit_only_the_current_segment() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);

        builder.add_segment(0, 10, None, None).unwrap().speed(10).unwrap();
        builder.add_segment(10, 20, None, None).unwrap().speed(20).unwrap();

        let cmd = builder.build();
        assert_eq!(cmd.segments()[0].speed, Some(10));
        assert_eq!(cmd.segments()[1].speed, Some(20));
    }

    #[test]
    fn numeric_setters_clamp() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);
        builder
            .add_segment(0, 10, None, None)
            .unwrap()
            .group(300)
            .unwrap()
            .spacing(-1)
            .unwrap()
            .brightness(999)
            .unwrap()
            .set(7)
            .unwrap()
            .effect(80)
            .unwrap()
            .palette(-3)
            .unwrap()
            .offset(-40)
            .unwrap();

        let built = builder.build();
        let seg = &built.segments()[0];
        assert_eq!(seg.group, Some(255));
        assert_eq!(seg.spacing, Some(0));
        assert_eq!(seg.brightness, Some(255));
        assert_eq!(seg.set, Some(3));
        assert_eq!(seg.effect_id, Some(49));
        assert_eq!(seg.palette_id, Some(0));
        assert_eq!(seg.offset, Some(-40));
    }

    #[test]
    fn color_temperature_is_validated_not_clamped() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);
        builder.add_segment(0, 10, None, None).unwrap();

        assert!(matches!(
            builder.color_temperature(300).err(),
            Some(WledError::Validation(_))
        ));
        assert!(builder.color_temperature(-1).is_err());
        assert!(builder.color_temperature(10092).is_err());

        builder.color_temperature(200).unwrap();
        assert_eq!(builder.build().segments()[0].color_temperature, Some(200));
        builder.color_temperature(5000).unwrap();
        assert_eq!(builder.build().segments()[0].color_temperature, Some(5000));
    }

    #[test]
    fn colors_skip_unset_slots() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);
        builder
            .add_segment(0, 10, None, None)
            .unwrap()
            .color(None, None, Some(Rgb::new(0, 0, 255)))
            .unwrap();

        let value = builder.build().to_value().unwrap();
        assert_eq!(value["seg"][0]["col"], json!(["000000", "0000FF"]));
    }

    #[test]
    fn set_defaults_writes_the_baseline() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);
        builder
            .add_segment(0, 10, None, None)
            .unwrap()
            .set_defaults(true)
            .unwrap();

        let value = builder.build().to_value().unwrap();
        assert_eq!(
            value["seg"][0],
            json!({
                "id": 0, "start": 0, "stop": 10,
                "grp": 0, "spc": 0, "of": 0,
                "col": ["FFA000", "FFA000", "FFA000"],
                "fx": 0, "sx": 128, "ix": 128,
                "c1": 0, "c2": 0, "c3": 0,
                "o1": false, "o2": false, "o3": false,
                "pal": 0, "sel": true, "rev": false, "on": true,
                "bri": 255, "mi": false, "cct": 255, "frz": false, "set": 0
            })
        );
    }

    #[test]
    fn build_split_matches_combined_form() {
        let session = session();
        let mut builder = SegmentBuilder::new(&session);
        for i in 0..3 {
            builder
                .add_segment(i * 10, i * 10 + 10, None, None)
                .unwrap()
                .intensity(i * 50)
                .unwrap();
        }

        let combined = builder.build();
        let split = builder.build_split();

        assert_eq!(combined.segments().len(), 3);
        assert_eq!(split.len(), 3);
        for (single, expected) in split.iter().zip(combined.segments()) {
            assert_eq!(single.segments(), std::slice::from_ref(expected));
        }
    }
}
