use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionStatus};
use crate::error::Result;
use crate::protocol::request_update;
use crate::session::DeviceSession;
use crate::subscription::{EventReceiver, SessionEvent, SubscriptionToken};
use crate::types::{Info, State};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// WebSocket client for one WLED device
///
/// The client mirrors the device's info and state as they are pushed over
/// the socket and exposes a fire-and-forget send primitive. Cloning is
/// cheap and every clone drives the same connection.
#[derive(Clone)]
pub struct WledClient {
    connection: Arc<Connection>,
}

impl WledClient {
    /// Create a client for `url` with default settings
    ///
    /// `url` may be a bare host (`192.168.1.50`), a host with port, or a
    /// full `ws://` URL. The `/ws` path is appended when missing.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self::with_config(url, ClientConfig::default())
    }

    pub fn with_config(url: impl AsRef<str>, config: ClientConfig) -> Self {
        Self {
            connection: Arc::new(Connection::new(normalize_url(url.as_ref()), config)),
        }
    }

    /// The normalized WebSocket URL
    pub fn url(&self) -> &str {
        self.connection.url()
    }

    /// Connect to the device
    ///
    /// With `wait_for_ready`, waits until the device has reported both its
    /// info and its state. On timeout the error is returned but the socket
    /// stays open.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wled_session::WledClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = WledClient::new("192.168.1.50");
    ///     client.connect(true).await?;
    ///     if let Some(info) = client.info() {
    ///         println!("{} has {} LEDs", info.name, info.led_info.count);
    ///     }
    ///     client.disconnect().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(&self, wait_for_ready: bool) -> Result<()> {
        self.connection.connect(wait_for_ready).await
    }

    /// Close the connection and forget both snapshots
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.status(), ConnectionStatus::Connected { .. })
    }

    /// Latest info snapshot
    pub fn info(&self) -> Option<Arc<Info>> {
        self.connection.session().info()
    }

    /// Latest state snapshot
    pub fn state(&self) -> Option<Arc<State>> {
        self.connection.session().state()
    }

    /// Register a handler called synchronously for every session event
    ///
    /// Handlers run on the connection's reader task and must not block.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.connection.events().subscribe(handler)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.connection.events().unsubscribe(token)
    }

    /// Async stream of session events
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wled_session::{SessionEvent, WledClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = WledClient::new("192.168.1.50");
    ///     let mut events = client.events();
    ///     client.connect(false).await?;
    ///
    ///     while let Ok(event) = events.recv().await {
    ///         if let SessionEvent::StateChanged { current: Some(state), .. } = event {
    ///             println!("brightness is now {}", state.brightness);
    ///         }
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn events(&self) -> EventReceiver {
        self.connection.events().receiver()
    }

    /// Client-local transition override, `None` when unset
    pub fn transition_time(&self) -> Option<i64> {
        self.connection.transition_time()
    }

    /// Set the transition time injected into every command from this client
    ///
    /// Values are clamped to 0..=65535 when sent; `None` removes the override.
    pub fn set_transition_time(&self, transition_time: Option<i64>) {
        self.connection.set_transition_time(transition_time);
    }

    /// Serialize and send any command
    pub async fn send_json<T>(&self, message: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.connection.send_value(serde_json::to_value(message)?)
    }

    /// Ask the device to push its current info and state
    ///
    /// Rarely needed: the device pushes updates on every change.
    pub async fn request_update(&self) -> Result<()> {
        self.connection.send_value(request_update())
    }
}

#[async_trait]
impl DeviceSession for WledClient {
    fn info(&self) -> Option<Arc<Info>> {
        WledClient::info(self)
    }

    fn state(&self) -> Option<Arc<State>> {
        WledClient::state(self)
    }

    async fn send_value(&self, message: Value) -> Result<()> {
        self.connection.send_value(message)
    }
}

/// Add the `ws://` scheme and `/ws` path when missing
fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let mut url = if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{}", url)
    };
    if !url.ends_with("/ws") {
        url.push_str("/ws");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_scheme_and_path() {
        assert_eq!(normalize_url("192.168.1.50"), "ws://192.168.1.50/ws");
        assert_eq!(normalize_url("wled.local:8080/"), "ws://wled.local:8080/ws");
    }

    #[test]
    fn full_url_is_kept() {
        assert_eq!(normalize_url("ws://10.0.0.2/ws"), "ws://10.0.0.2/ws");
        assert_eq!(normalize_url("wss://host"), "wss://host/ws");
    }

    #[test]
    fn new_client_is_disconnected_and_empty() {
        let client = WledClient::new("10.0.0.2");
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(!client.is_connected());
        assert!(client.info().is_none());
        assert!(client.state().is_none());
    }
}
