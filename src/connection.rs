use crate::config::ClientConfig;
use crate::dispatcher::MessageDispatcher;
use crate::error::{Result, WledError};
use crate::protocol::inject_transition;
use crate::session::SessionState;
use crate::subscription::{DisconnectReason, EventBus, SessionEvent, SubscriptionToken};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Coarse connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// `ready` once both info and state have been received
    Connected { ready: bool },
    /// Closing; snapshots are cleared and subscribers notified before this ends
    Disconnecting,
}

/// One open socket
struct Link {
    /// Distinguishes this link from earlier ones in teardown
    epoch: u64,
    /// Channel for outgoing messages, drained by the writer task
    ws_tx: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

enum LinkState {
    Disconnected,
    Connecting,
    Connected(Link),
    Disconnecting,
}

/// Owns the socket and drives the connect/ready/disconnect lifecycle
pub(crate) struct Connection {
    url: String,
    config: ClientConfig,
    session: Arc<SessionState>,
    events: Arc<EventBus>,
    dispatcher: Arc<MessageDispatcher>,
    link: Mutex<LinkState>,
    next_epoch: AtomicU64,
    transition_time: Mutex<Option<i64>>,
}

impl Connection {
    pub fn new(url: String, config: ClientConfig) -> Self {
        let session = Arc::new(SessionState::new());
        let events = Arc::new(EventBus::new(config.event_capacity));
        let dispatcher = Arc::new(MessageDispatcher::new(session.clone(), events.clone()));
        let transition_time = Mutex::new(config.transition_time);

        Self {
            url,
            config,
            session,
            events,
            dispatcher,
            link: Mutex::new(LinkState::Disconnected),
            next_epoch: AtomicU64::new(0),
            transition_time,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn transition_time(&self) -> Option<i64> {
        *self.transition_time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_transition_time(&self, transition_time: Option<i64>) {
        *self.transition_time.lock().unwrap_or_else(PoisonError::into_inner) = transition_time;
    }

    pub fn status(&self) -> ConnectionStatus {
        match &*self.lock_link() {
            LinkState::Disconnected => ConnectionStatus::Disconnected,
            LinkState::Connecting => ConnectionStatus::Connecting,
            LinkState::Connected(_) => ConnectionStatus::Connected {
                ready: self.session.is_ready(),
            },
            LinkState::Disconnecting => ConnectionStatus::Disconnecting,
        }
    }

    /// Open the socket, optionally waiting until info and state arrive
    ///
    /// A readiness timeout leaves the socket open.
    pub async fn connect(self: &Arc<Self>, wait_for_ready: bool) -> Result<()> {
        {
            let mut state = self.lock_link();
            match *state {
                LinkState::Disconnected => {}
                LinkState::Disconnecting => {
                    return Err(WledError::ConnectionState(
                        "Client is still disconnecting".to_string(),
                    ));
                }
                _ => {
                    return Err(WledError::ConnectionState(
                        "Client is already connected".to_string(),
                    ));
                }
            }
            *state = LinkState::Connecting;
        }
        let mut guard = ConnectingGuard {
            connection: self,
            armed: true,
        };

        tracing::info!("Connecting to {}...", self.url);

        // Armed before the reader starts so no notification can be missed
        let latch = wait_for_ready.then(|| ReadinessLatch::arm(&self.events));

        let ws_stream = match timeout(self.config.connect_timeout, connect_async(&self.url)).await {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                tracing::error!("Failed to connect to {}: {}", self.url, e);
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!("Failed to connect to {}: timed out", self.url);
                return Err(WledError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                )));
            }
        };
        let (write, read) = ws_stream.split();
        let (ws_tx, ws_rx) = mpsc::unbounded_channel::<Message>();
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);

        {
            // The reader may tear down immediately; publish the link first
            let mut state = self.lock_link();
            let writer = tokio::spawn(write_loop(write, ws_rx));
            let reader = tokio::spawn(read_loop(
                read,
                self.dispatcher.clone(),
                Arc::downgrade(self),
                epoch,
            ));
            *state = LinkState::Connected(Link {
                epoch,
                ws_tx,
                writer,
                reader,
            });
        }
        guard.armed = false;

        tracing::info!("Connected to {}.", self.url);

        let Some(mut latch) = latch else {
            return Ok(());
        };

        let outcome = timeout(self.config.ready_timeout, &mut latch.rx).await;
        drop(latch);

        match outcome {
            Ok(Ok(Readiness::Ready)) => Ok(()),
            Ok(Ok(Readiness::Closed)) | Ok(Err(_)) => Err(WledError::ConnectionClosed),
            Err(_) => {
                tracing::warn!("{} did not report info and state in time", self.url);
                Err(WledError::Timeout)
            }
        }
    }

    /// Close the socket and clear both snapshots
    ///
    /// `connect` is rejected until the snapshots are cleared and
    /// `Disconnected` has been published.
    pub async fn disconnect(&self) -> Result<()> {
        let link = {
            let mut state = self.lock_link();
            match std::mem::replace(&mut *state, LinkState::Disconnecting) {
                LinkState::Connected(link) => link,
                other => {
                    *state = other;
                    return Err(WledError::ConnectionState(
                        "Client is not connected".to_string(),
                    ));
                }
            }
        };

        tracing::info!("Disconnecting from {}...", self.url);

        // Finishes the teardown even if this future is dropped midway
        let _teardown = DisconnectingGuard { connection: self };

        let Link {
            ws_tx,
            writer,
            reader,
            ..
        } = link;

        let _ = ws_tx.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "Client stopped.".into(),
        })));
        drop(ws_tx);

        // No frame may be dispatched once the snapshots are cleared
        reader.abort();
        let _ = reader.await;

        // Let the writer flush the close frame before the socket goes away
        let _ = timeout(CLOSE_FLUSH_TIMEOUT, writer).await;
        Ok(())
    }

    /// Serialize and send one command
    pub fn send_value(&self, mut message: Value) -> Result<()> {
        let ws_tx = match &*self.lock_link() {
            LinkState::Connected(link) => link.ws_tx.clone(),
            _ => return Err(WledError::NotConnected),
        };

        if let Some(transition_time) = self.transition_time() {
            inject_transition(&mut message, transition_time);
        }

        let json = serde_json::to_string(&message)?;
        tracing::debug!("Sending to {}: {}", self.url, json);

        ws_tx
            .send(Message::Text(json))
            .map_err(|_| WledError::NotConnected)
    }

    /// Teardown triggered by the reader when the socket ends on its own
    fn teardown(&self, epoch: u64, reason: DisconnectReason) {
        {
            let mut state = self.lock_link();
            match &*state {
                LinkState::Connected(link) if link.epoch == epoch => {}
                // Already torn down by disconnect() or a newer link exists
                _ => return,
            }
            // Dropping the link closes the outgoing channel and stops the writer
            *state = LinkState::Disconnecting;
        }

        self.finish_teardown(reason);
    }

    fn finish_teardown(&self, reason: DisconnectReason) {
        if reason.is_by_user() {
            tracing::info!("{} successfully disconnected.", self.url);
        } else {
            tracing::error!("{} disconnected: {}", self.url, reason);
        }

        self.dispatcher.clear();
        self.events.publish(SessionEvent::Disconnected(reason));

        let mut state = self.lock_link();
        if matches!(*state, LinkState::Disconnecting) {
            *state = LinkState::Disconnected;
        }
    }

    fn lock_link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let state = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let LinkState::Connected(link) = state {
            link.reader.abort();
        }
    }
}

/// Resets `Connecting` back to `Disconnected` if `connect` bails out early
struct ConnectingGuard<'a> {
    connection: &'a Connection,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.connection.lock_link();
            if matches!(*state, LinkState::Connecting) {
                *state = LinkState::Disconnected;
            }
        }
    }
}

/// Completes a user-initiated disconnect when dropped
struct DisconnectingGuard<'a> {
    connection: &'a Connection,
}

impl Drop for DisconnectingGuard<'_> {
    fn drop(&mut self) {
        self.connection.finish_teardown(DisconnectReason::ByUser);
    }
}

#[derive(Debug)]
enum Readiness {
    Ready,
    Closed,
}

#[derive(Default)]
struct ReadinessProgress {
    info: bool,
    state: bool,
    tx: Option<oneshot::Sender<Readiness>>,
}

/// One-shot rendezvous resolving once info and state have both arrived
///
/// Its handler is removed when the latch is dropped, including when the
/// waiting `connect` is cancelled.
struct ReadinessLatch {
    events: Arc<EventBus>,
    token: SubscriptionToken,
    rx: oneshot::Receiver<Readiness>,
}

impl ReadinessLatch {
    fn arm(events: &Arc<EventBus>) -> Self {
        let (tx, rx) = oneshot::channel();
        let progress = Mutex::new(ReadinessProgress {
            tx: Some(tx),
            ..Default::default()
        });

        let token = events.subscribe(move |event| {
            let mut progress = progress.lock().unwrap_or_else(PoisonError::into_inner);
            match event {
                SessionEvent::InfoChanged { current: Some(_), .. } => progress.info = true,
                SessionEvent::StateChanged { current: Some(_), .. } => progress.state = true,
                SessionEvent::Disconnected(_) => {
                    if let Some(tx) = progress.tx.take() {
                        let _ = tx.send(Readiness::Closed);
                    }
                    return;
                }
                _ => return,
            }

            if progress.info && progress.state {
                if let Some(tx) = progress.tx.take() {
                    let _ = tx.send(Readiness::Ready);
                }
            }
        });

        Self {
            events: events.clone(),
            token,
            rx,
        }
    }
}

impl Drop for ReadinessLatch {
    fn drop(&mut self) {
        self.events.unsubscribe(self.token);
    }
}

/// Forward outgoing messages to the socket
async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut ws_rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = ws_rx.recv().await {
        if let Err(e) = write.send(msg).await {
            tracing::error!("Failed to send message: {}", e);
            break;
        }
    }
}

/// Feed inbound frames to the dispatcher until the socket ends
async fn read_loop(
    mut read: SplitStream<WsStream>,
    dispatcher: Arc<MessageDispatcher>,
    connection: Weak<Connection>,
    epoch: u64,
) {
    let reason = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => dispatcher.dispatch(&text),
            Some(Ok(Message::Close(frame))) => {
                tracing::info!("WebSocket connection closed");
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty());
                break DisconnectReason::ClosedByPeer(reason);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!("WebSocket error: {}", e);
                break DisconnectReason::Error(e.to_string());
            }
            None => break DisconnectReason::Lost,
        }
    };

    if let Some(connection) = connection.upgrade() {
        connection.teardown(epoch, reason);
    }
}
