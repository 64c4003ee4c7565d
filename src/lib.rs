//! Rust client library for WLED LED controllers
//!
//! This library provides an async session over a WLED device's WebSocket
//! API. It supports:
//!
//! - Connection lifecycle with an optional wait until the device is ready
//! - Live info and state snapshots pushed by the device
//! - Change and disconnect notifications, by callback or channel
//! - Segment building with clamping and automatic request splitting
//! - Power, brightness, color, effect, palette and preset commands
//! - Finding devices on the network through a liveness probe
//!
//! # Quick Start
//!
//! ```no_run
//! use wled_session::{commands, commands::Scope, SessionEvent, WledClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WledClient::new("192.168.1.50");
//!     client.connect(true).await?;
//!
//!     client.subscribe(|event| {
//!         if let SessionEvent::StateChanged { current: Some(state), .. } = event {
//!             println!("Brightness is now {}", state.brightness);
//!         }
//!     });
//!
//!     commands::turn_on(&client, Scope::Device).await?;
//!     commands::set_brightness(&client, Scope::Device, 128).await?;
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Client**: Connection lifecycle and the send primitive
//! - **Connection**: Socket tasks, readiness and teardown
//! - **Dispatcher**: Routes inbound frames to the snapshots
//! - **Subscription**: Event bus for change notifications
//! - **Builder / Payload**: Segment commands and size-aware sending
//! - **Commands**: Typed helpers over any [`DeviceSession`]
//! - **Discovery**: Confirms candidate addresses as WLED devices
//! - **Types**: Wire models for info and state

mod builder;
mod client;
pub mod commands;
mod config;
mod connection;
mod discovery;
mod dispatcher;
mod error;
mod payload;
mod preset;
pub mod protocol;
mod session;
mod subscription;
mod targets;
mod types;

// Public exports
pub use builder::{SegmentBuilder, SegmentCommand, SegmentSpec, DEFAULT_SEGMENT_COLOR};
pub use client::WledClient;
pub use config::{ClientConfig, DiscoveryConfig};
pub use connection::ConnectionStatus;
pub use discovery::{
    AddressSource, Announcement, Discovery, DiscoveryEvent, LivenessProbe, StaticAddresses,
};
pub use dispatcher::MessageDispatcher;
pub use error::{Result, WledError};
pub use payload::{plan_segment_requests, reset_segments, set_segments, MAX_PAYLOAD_BYTES};
pub use preset::PresetBuilder;
pub use protocol::CommandValue;
pub use session::{send_json, DeviceSession, SessionState};
pub use subscription::{DisconnectReason, EventBus, EventReceiver, SessionEvent, SubscriptionToken};
pub use targets::{resolve_raw_targets, resolve_targets, SegmentTarget, MAIN_SEGMENT_SENTINEL};
pub use types::{
    DiscoveredDevice, Info, LedInfo, LiveDataOverride, Nightlight, NightlightMode, Rgb, Segment,
    SegmentId, State, UdpNotifier, WifiInfo,
};
