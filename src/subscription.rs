use crate::error::{Result, WledError};
use crate::types::{Info, State};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Change notification published by a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Info snapshot was replaced. `current` is `None` only on teardown.
    InfoChanged {
        previous: Option<Arc<Info>>,
        current: Option<Arc<Info>>,
    },

    /// State snapshot was replaced. `current` is `None` only on teardown.
    StateChanged {
        previous: Option<Arc<State>>,
        current: Option<Arc<State>>,
    },

    /// The connection ended
    Disconnected(DisconnectReason),
}

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called
    ByUser,
    /// The device sent a close frame
    ClosedByPeer(Option<String>),
    /// The transport failed
    Error(String),
    /// The stream ended without a close frame
    Lost,
}

impl DisconnectReason {
    pub fn is_by_user(&self) -> bool {
        matches!(self, Self::ByUser)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByUser => write!(f, "disconnected by user"),
            Self::ClosedByPeer(Some(reason)) => write!(f, "closed by device: {}", reason),
            Self::ClosedByPeer(None) => write!(f, "closed by device"),
            Self::Error(e) => write!(f, "transport error: {}", e),
            Self::Lost => write!(f, "connection lost"),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(Uuid);

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Publish/subscribe hub for session events
///
/// Handlers run synchronously, in subscription order, on the publishing
/// task. Every event is also forwarded to a broadcast channel for async
/// consumers.
pub struct EventBus {
    handlers: Mutex<Vec<(SubscriptionToken, Handler)>>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: Mutex::new(Vec::new()),
            broadcast_tx,
        }
    }

    /// Register a handler
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(Uuid::new_v4());
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token, Arc::new(handler)));
        token
    }

    /// Remove a handler. Returns `false` if the token was unknown.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(t, _)| *t != token);
        handlers.len() != before
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Async receiver for all future events
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver::new(self.broadcast_tx.subscribe())
    }

    /// Deliver an event to every handler, then to broadcast receivers
    pub fn publish(&self, event: SessionEvent) {
        // Snapshot the list so handlers may (un)subscribe while running
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| h.clone())
            .collect();

        for handler in handlers {
            handler(&event);
        }

        let _ = self.broadcast_tx.send(event);
    }
}

/// Receiver for session events
pub struct EventReceiver {
    rx: broadcast::Receiver<SessionEvent>,
}

impl EventReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event
    ///
    /// Fails with `ConnectionClosed` once every clone of the owning
    /// `WledClient` has been dropped. A disconnect alone does not close the
    /// channel: it is reported as [`SessionEvent::Disconnected`].
    pub async fn recv(&mut self) -> Result<SessionEvent> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => WledError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                WledError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<SessionEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(WledError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(WledError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}
