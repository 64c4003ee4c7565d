use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier, unique within a state's segment list
pub type SegmentId = u32;

/// Device identity and capability report (`info` section)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    /// Version name
    #[serde(rename = "ver")]
    pub version: String,

    /// Numeric build id
    #[serde(rename = "vid")]
    pub version_id: u64,

    #[serde(rename = "leds")]
    pub led_info: LedInfo,

    /// A single sync toggle should switch send and receive, not send only
    #[serde(rename = "str")]
    pub sync_toggle_send_receive: bool,

    /// Friendly device name
    pub name: String,

    #[serde(rename = "udpport")]
    pub udp_port: u16,

    /// Device is currently receiving realtime data
    #[serde(rename = "live")]
    pub realtime_active: bool,

    #[serde(rename = "liveseg")]
    pub realtime_segment: i32,

    #[serde(rename = "lm")]
    pub realtime_source: String,

    #[serde(rename = "lip")]
    pub realtime_source_ip: String,

    /// Connected WebSocket clients, -1 if unsupported
    #[serde(rename = "ws")]
    pub websocket_clients: i32,

    #[serde(rename = "fxcount")]
    pub effect_count: u32,

    #[serde(rename = "palcount")]
    pub palette_count: u32,

    #[serde(rename = "cpalcount")]
    pub custom_palette_count: u32,

    #[serde(rename = "wifi")]
    pub wifi_info: WifiInfo,

    /// Other devices discovered on the network, -1 if node discovery is off
    #[serde(rename = "ndc")]
    pub discovered_devices: i32,

    #[serde(rename = "arch")]
    pub architecture: String,

    #[serde(rename = "core")]
    pub core_version: String,

    /// Free heap in bytes; below 10k is a problem
    #[serde(rename = "freeheap")]
    pub free_heap: u64,

    /// Seconds since boot
    pub uptime: u64,

    pub time: String,

    #[serde(rename = "opt")]
    pub debug_opt: u64,

    pub brand: String,
    pub product: String,

    /// Lowercase hex MAC without colons
    #[serde(rename = "mac")]
    pub mac_address: String,

    /// Empty when not connected to a network
    #[serde(rename = "ip")]
    pub ip_address: String,
}

/// LED strip capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedInfo {
    /// Total number of LEDs
    pub count: u32,

    #[serde(rename = "fps")]
    pub frames_per_second: u32,

    /// Current draw in mA as estimated by the ABL, 0 if disabled
    #[serde(rename = "pwr")]
    pub power_usage: u32,

    #[serde(rename = "maxpwr")]
    pub max_power: u32,

    /// Maximum number of segments supported
    #[serde(rename = "maxseg")]
    pub max_segments: u32,

    #[serde(rename = "lc")]
    pub light_capabilities: u8,
}

/// WiFi diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiInfo {
    pub bssid: String,
    pub rssi: i32,

    /// Relative signal quality in percent
    #[serde(rename = "signal")]
    pub signal_quality: i32,

    pub channel: i32,
}

/// Runtime configuration report (`state` section)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub on: bool,

    #[serde(rename = "bri")]
    pub brightness: u8,

    /// Crossfade duration in units of 100ms
    #[serde(rename = "transition")]
    pub transition_duration: u16,

    /// Active preset, -1 if none
    #[serde(rename = "ps")]
    pub preset_id: i32,

    /// Active playlist, -1 if none
    #[serde(rename = "pl")]
    pub playlist_id: i32,

    #[serde(rename = "nl")]
    pub nightlight: Nightlight,

    #[serde(rename = "udpn")]
    pub udp_notifier: UdpNotifier,

    #[serde(rename = "lor")]
    pub live_data_override: LiveDataOverride,

    #[serde(rename = "mainseg")]
    pub main_segment_id: SegmentId,

    #[serde(rename = "seg")]
    pub segments: Vec<Segment>,
}

impl State {
    /// Ids of all segments in declared order
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|s| s.id).collect()
    }

    /// Ids of selected segments in declared order
    pub fn selected_segment_ids(&self) -> Vec<SegmentId> {
        self.segments.iter().filter(|s| s.selected).map(|s| s.id).collect()
    }

    /// Look up a segment by id
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nightlight {
    pub on: bool,

    /// Duration in minutes
    #[serde(rename = "dur")]
    pub duration: u16,

    pub mode: NightlightMode,

    #[serde(rename = "tbri")]
    pub target_brightness: u8,

    /// Remaining seconds, -1 if inactive
    #[serde(rename = "rem")]
    pub remaining: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpNotifier {
    pub send: bool,

    #[serde(rename = "recv")]
    pub receive: bool,

    /// Bitfield of send groups 1-8
    #[serde(rename = "sgrp")]
    pub send_groups: u8,

    /// Bitfield of receive groups 1-8
    #[serde(rename = "rgrp")]
    pub receive_groups: u8,
}

/// One segment as reported by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub id: SegmentId,
    pub start: u32,
    pub stop: u32,

    #[serde(rename = "len")]
    pub length: u32,

    #[serde(rename = "grp")]
    pub group: u8,

    #[serde(rename = "spc")]
    pub spacing: u8,

    #[serde(rename = "of")]
    pub offset: i32,

    pub on: bool,

    #[serde(rename = "frz")]
    pub freeze: bool,

    #[serde(rename = "bri")]
    pub brightness: u8,

    /// 0-255 relative, or 1900-10091 Kelvin
    #[serde(rename = "cct")]
    pub color_temperature: u16,

    pub set: u8,

    #[serde(rename = "n")]
    pub name: Option<String>,

    /// Up to three colors, each RGB or RGBW
    #[serde(rename = "col")]
    pub colors: Vec<Vec<u8>>,

    #[serde(rename = "fx")]
    pub effect_id: u32,

    #[serde(rename = "sx")]
    pub speed: u8,

    #[serde(rename = "ix")]
    pub intensity: u8,

    #[serde(rename = "pal")]
    pub palette_id: u32,

    #[serde(rename = "c1")]
    pub custom_slider1: u8,
    #[serde(rename = "c2")]
    pub custom_slider2: u8,
    #[serde(rename = "c3")]
    pub custom_slider3: u8,

    #[serde(rename = "sel")]
    pub selected: bool,

    #[serde(rename = "rev")]
    pub reverse: bool,

    #[serde(rename = "mi")]
    pub mirror: bool,

    #[serde(rename = "o1")]
    pub effect_option1: bool,
    #[serde(rename = "o2")]
    pub effect_option2: bool,
    #[serde(rename = "o3")]
    pub effect_option3: bool,

    #[serde(rename = "si")]
    pub sound_simulation: u8,

    #[serde(rename = "m12")]
    pub expand_1d: u8,
}

/// Nightlight fade mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NightlightMode {
    #[default]
    Instant,
    Fade,
    ColorFade,
    Sunrise,
}

impl TryFrom<u8> for NightlightMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Instant),
            1 => Ok(Self::Fade),
            2 => Ok(Self::ColorFade),
            3 => Ok(Self::Sunrise),
            other => Err(format!("unknown nightlight mode {}", other)),
        }
    }
}

impl From<NightlightMode> for u8 {
    fn from(mode: NightlightMode) -> Self {
        mode as u8
    }
}

/// How long realtime data overrides local control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LiveDataOverride {
    #[default]
    Off,
    UntilLiveDataEnds,
    UntilReboot,
}

impl TryFrom<u8> for LiveDataOverride {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::UntilLiveDataEnds),
            2 => Ok(Self::UntilReboot),
            other => Err(format!("unknown live data override {}", other)),
        }
    }
}

impl From<LiveDataOverride> for u8 {
    fn from(mode: LiveDataOverride) -> Self {
        mode as u8
    }
}

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Six uppercase hex digits, no leading `#`
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Device confirmed by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub address: String,
}

impl DiscoveredDevice {
    /// Connect to this device
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wled_session::{ClientConfig, DiscoveredDevice};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let device = DiscoveredDevice { address: "192.168.1.50".to_string() };
    ///     let client = device.connect(ClientConfig::default()).await?;
    ///     println!("{:?}", client.status());
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(
        &self,
        config: crate::config::ClientConfig,
    ) -> crate::error::Result<crate::client::WledClient> {
        let client = crate::client::WledClient::with_config(&self.address, config);
        client.connect(true).await?;
        Ok(client)
    }
}
