use crate::config::DiscoveryConfig;
use crate::error::{Result, WledError};
use crate::protocol::request_update;
use crate::types::DiscoveredDevice;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Top-level keys a WLED `/json` response always carries
const REQUIRED_KEYS: [&str; 4] = ["state", "info", "effects", "palettes"];

/// A candidate address appearing on or leaving the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Added(String),
    Removed(String),
}

/// Something that yields candidate device addresses, e.g. a multicast
/// service browser
#[async_trait]
pub trait AddressSource: Send {
    /// Next announcement, or `None` once the source is exhausted
    async fn next(&mut self) -> Option<Announcement>;
}

/// Fixed list of addresses, announced once each
#[derive(Debug, Clone, Default)]
pub struct StaticAddresses {
    pending: VecDeque<String>,
}

impl StaticAddresses {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: addresses.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AddressSource for StaticAddresses {
    async fn next(&mut self) -> Option<Announcement> {
        self.pending.pop_front().map(Announcement::Added)
    }
}

/// Confirms that an address belongs to a WLED device
pub struct LivenessProbe {
    http: reqwest::Client,
    probe_path: String,
}

impl LivenessProbe {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()?;
        Ok(Self {
            http,
            probe_path: config.probe_path.clone(),
        })
    }

    /// POST `{"v":true}` to the JSON API and check the response shape
    ///
    /// Any failure counts as "not a WLED device".
    pub async fn is_wled_device(&self, address: &str) -> bool {
        match self.check(address).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("{} is not a WLED device: {}", address, e);
                false
            }
        }
    }

    async fn check(&self, address: &str) -> Result<()> {
        let url = format!("http://{}{}", address, self.probe_path);
        let body: Value = self
            .http
            .post(&url)
            .json(&request_update())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match REQUIRED_KEYS.iter().find(|key| body.get(**key).is_none()) {
            Some(missing) => Err(WledError::InvalidResponse(format!(
                "missing `{}` in response",
                missing
            ))),
            None => Ok(()),
        }
    }
}

/// Discovery notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    DeviceFound(DiscoveredDevice),
    DeviceLost(DiscoveredDevice),
}

type DeviceMap = Arc<Mutex<BTreeMap<String, DiscoveredDevice>>>;

/// Discovery manager for WLED devices
///
/// Consumes announcements from an [`AddressSource`] in the background,
/// confirms each new address with a [`LivenessProbe`] and keeps the list of
/// confirmed devices.
///
/// # Example
///
/// ```no_run
/// use wled_session::{Discovery, DiscoveryConfig, StaticAddresses};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut discovery = Discovery::new(DiscoveryConfig::default())?;
///     discovery.start(StaticAddresses::new(["192.168.1.50", "192.168.1.51"]))?;
///
///     tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
///     for device in discovery.devices() {
///         println!("Found WLED at {}", device.address);
///     }
///
///     discovery.stop().await;
///     Ok(())
/// }
/// ```
pub struct Discovery {
    devices: DeviceMap,
    probe: Arc<LivenessProbe>,
    update_tx: broadcast::Sender<DiscoveryEvent>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let (update_tx, _) = broadcast::channel(100);
        Ok(Self {
            devices: Arc::new(Mutex::new(BTreeMap::new())),
            probe: Arc::new(LivenessProbe::new(&config)?),
            update_tx,
            stop_tx: None,
            task_handle: None,
        })
    }

    /// Subscribe to found/lost notifications
    pub fn subscribe_updates(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.update_tx.subscribe()
    }

    /// Snapshot of the confirmed devices
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        devices.values().cloned().collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the background task is still consuming announcements
    pub fn is_searching(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start consuming `source` in the background
    ///
    /// A running search is stopped first. Known devices are kept.
    pub fn start<S>(&mut self, source: S) -> Result<()>
    where
        S: AddressSource + 'static,
    {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }

        tracing::info!("Starting the search for WLED devices");

        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        self.stop_tx = Some(stop_tx);

        let devices = self.devices.clone();
        let probe = self.probe.clone();
        let update_tx = self.update_tx.clone();
        let mut source = source;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Discovery stopped by user");
                        break;
                    }
                    announcement = source.next() => match announcement {
                        Some(announcement) => {
                            handle_announcement(&devices, &probe, &update_tx, announcement).await;
                        }
                        None => {
                            tracing::info!("Address source exhausted");
                            break;
                        }
                    }
                }
            }
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the background search. The device list is preserved.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            // Give it a moment to stop gracefully
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }

    /// Process one announcement directly, without a background task
    pub async fn handle(&self, announcement: Announcement) {
        handle_announcement(&self.devices, &self.probe, &self.update_tx, announcement).await;
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

async fn handle_announcement(
    devices: &DeviceMap,
    probe: &LivenessProbe,
    update_tx: &broadcast::Sender<DiscoveryEvent>,
    announcement: Announcement,
) {
    match announcement {
        Announcement::Added(address) => {
            tracing::debug!("Found device at {}. Checking if it's a WLED device...", address);

            let known = devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&address);
            if known || !probe.is_wled_device(&address).await {
                return;
            }

            tracing::info!("Found WLED device at {}", address);
            let device = DiscoveredDevice {
                address: address.clone(),
            };
            devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(address, device.clone());
            let _ = update_tx.send(DiscoveryEvent::DeviceFound(device));
        }
        Announcement::Removed(address) => {
            let removed = devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&address);
            if let Some(device) = removed {
                tracing::info!("Lost WLED device at {}", address);
                let _ = update_tx.send(DiscoveryEvent::DeviceLost(device));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn wled_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/json"))
            .and(body_json(json!({ "v": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": { "on": true },
                "info": { "ver": "0.14.0" },
                "effects": ["Solid"],
                "palettes": ["Default"]
            })))
            .mount(&server)
            .await;
        server
    }

    fn probe() -> LivenessProbe {
        LivenessProbe::new(&DiscoveryConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn probe_accepts_full_response() {
        let server = wled_server().await;
        assert!(probe().is_wled_device(&server.address().to_string()).await);
    }

    #[tokio::test]
    async fn probe_rejects_partial_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": {}, "info": {}
            })))
            .mount(&server)
            .await;

        assert!(!probe().is_wled_device(&server.address().to_string()).await);
    }

    #[tokio::test]
    async fn probe_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(!probe().is_wled_device(&server.address().to_string()).await);
    }

    #[tokio::test]
    async fn known_address_is_reported_once_and_can_be_lost() {
        let server = wled_server().await;
        let address = server.address().to_string();
        let discovery = Discovery::new(DiscoveryConfig::default()).unwrap();
        let mut updates = discovery.subscribe_updates();

        discovery.handle(Announcement::Added(address.clone())).await;
        discovery.handle(Announcement::Added(address.clone())).await;
        discovery.handle(Announcement::Removed("10.255.255.1".to_string())).await;
        discovery.handle(Announcement::Removed(address.clone())).await;

        let device = DiscoveredDevice { address };
        assert_eq!(updates.try_recv().unwrap(), DiscoveryEvent::DeviceFound(device.clone()));
        assert_eq!(updates.try_recv().unwrap(), DiscoveryEvent::DeviceLost(device));
        assert!(updates.try_recv().is_err());
        assert_eq!(discovery.device_count(), 0);
    }

    #[tokio::test]
    async fn background_search_consumes_source() {
        let server = wled_server().await;
        let good = server.address().to_string();
        let mut discovery = Discovery::new(DiscoveryConfig::default()).unwrap();
        let mut updates = discovery.subscribe_updates();

        discovery
            .start(StaticAddresses::new([good.clone(), good.clone()]))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, DiscoveryEvent::DeviceFound(DiscoveredDevice { address: good }));

        discovery.stop().await;
        assert!(!discovery.is_searching());
        assert_eq!(discovery.devices().len(), 1);
    }
}
