use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EVENT_CAPACITY: usize = 100;
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Client settings
///
/// Can be built in code or deserialized, e.g. from a JSON settings file:
///
/// ```
/// use wled_session::ClientConfig;
///
/// let config: ClientConfig =
///     serde_json::from_str(r#"{ "ready_timeout": { "secs": 2, "nanos": 0 }, "transition_time": 0 }"#).unwrap();
/// assert_eq!(config.transition_time, Some(0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long `connect(true)` waits for the first info and state
    pub ready_timeout: Duration,

    /// How long opening the socket may take
    pub connect_timeout: Duration,

    /// Buffer size of the broadcast event channel
    pub event_capacity: usize,

    /// Transition time injected as `tt` into every command sent by this client.
    /// `None` leaves the command's own value or the device default in effect.
    pub transition_time: Option<i64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ready_timeout: DEFAULT_READY_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            transition_time: None,
        }
    }
}

impl ClientConfig {
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_transition_time(mut self, transition_time: Option<i64>) -> Self {
        self.transition_time = transition_time;
        self
    }
}

/// Liveness probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub probe_timeout: Duration,

    /// HTTP path of the JSON API
    pub probe_path: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_path: "/json".to_string(),
        }
    }
}
