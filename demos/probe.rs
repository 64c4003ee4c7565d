//! Probe addresses given on the command line, then connect to the first
//! WLED device found and print what it reports.
//!
//! ```text
//! cargo run --example probe -- 192.168.1.50 192.168.1.51
//! ```

use std::time::Duration;
use wled_session::{
    commands, commands::Scope, ClientConfig, Discovery, DiscoveryConfig, DiscoveryEvent,
    SessionEvent, StaticAddresses,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addresses: Vec<String> = std::env::args().skip(1).collect();
    if addresses.is_empty() {
        eprintln!("usage: probe <address>...");
        return Ok(());
    }

    let mut discovery = Discovery::new(DiscoveryConfig::default())?;
    let mut updates = discovery.subscribe_updates();
    discovery.start(StaticAddresses::new(addresses))?;

    let device = loop {
        match tokio::time::timeout(Duration::from_secs(10), updates.recv()).await {
            Ok(Ok(DiscoveryEvent::DeviceFound(device))) => break device,
            Ok(Ok(DiscoveryEvent::DeviceLost(_))) => continue,
            _ => {
                println!("No WLED device found");
                return Ok(());
            }
        }
    };
    discovery.stop().await;

    let client = device.connect(ClientConfig::default()).await?;
    client.subscribe(|event| match event {
        SessionEvent::StateChanged { current: Some(state), .. } => {
            println!("state: on={} bri={}", state.on, state.brightness);
        }
        SessionEvent::Disconnected(reason) => println!("disconnected: {}", reason),
        _ => {}
    });

    if let Some(info) = client.info() {
        println!(
            "{} ({}) with {} LEDs, {} effects, {} palettes",
            info.name,
            info.version,
            info.led_info.count,
            info.effect_count,
            info.palette_count
        );
    }

    commands::toggle(&client, Scope::Device).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    commands::toggle(&client, Scope::Device).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    client.disconnect().await?;
    Ok(())
}
