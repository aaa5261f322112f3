// Realtime connection manager: channel client with reconnection.
//
// Owns the one live connection a browsing session keeps to the channel
// registry, multiplexing every view's channel subscriptions over it.
// Handles the authentication handshake, subscribe/unsubscribe bookkeeping,
// and automatic reconnection with channel re-subscription.
//
// Transport is abstracted via `ChannelTransport` for testability. The
// actual WS transport implementation lives with the embedding shell.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use cahier_common::channel::ChannelName;
use cahier_common::error::SyncError;
use cahier_common::protocol::event::{EventKind, RealtimeEvent};
use cahier_common::protocol::ws::{ClientFrame, ServerFrame};
use cahier_common::protocol::CURRENT_PROTOCOL_VERSION;

// ── Configuration ───────────────────────────────────────────────────

/// Connection parameters for the channel registry.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Registry WebSocket URL (e.g. "wss://rt.cahier.app/v1/ws").
    pub ws_url: String,
    /// Bearer token for the handshake. Callers must not attempt to
    /// connect without one.
    pub token: String,
}

/// Reconnection parameters.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            max_attempts: u32::MAX, // retry indefinitely
        }
    }
}

// ── Transport trait ─────────────────────────────────────────────────

/// Abstraction over the network transport for testability.
///
/// In production this wraps a WebSocket; in tests it is a mock that
/// records frames. `recv` returns the raw frame text so that malformed
/// payloads can be dropped by the client without killing the connection.
pub trait ChannelTransport {
    /// Open a connection to the given URL.
    fn connect(&mut self, ws_url: &str) -> Result<()>;

    /// Send a frame.
    fn send(&mut self, frame: &ClientFrame) -> Result<()>;

    /// Receive the next raw frame (blocking). Returns None on clean close.
    fn recv(&mut self) -> Result<Option<String>>;

    /// Close the connection.
    fn close(&mut self);
}

// ── Connection state ────────────────────────────────────────────────

/// Current state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Outcome of polling the connection for one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A decoded event on a subscribed channel. Registered handlers have
    /// already been invoked when this is returned.
    Event(RealtimeEvent),
    /// A protocol error frame from the registry.
    ServerError { code: String, message: String, retryable: bool },
    /// Connection lost; the client is now in `Reconnecting`.
    Dropped { reason: String },
}

/// Callback invoked for every decoded event on any subscribed channel.
pub type EventHandler = Box<dyn FnMut(&RealtimeEvent)>;

// ── Client ──────────────────────────────────────────────────────────

/// Manages the realtime connection lifecycle for one browsing session.
pub struct RealtimeClient<T: ChannelTransport> {
    config: RealtimeConfig,
    reconnect_policy: ReconnectPolicy,
    pub(crate) transport: T,
    state: ConnectionState,
    connection_id: Option<Uuid>,
    /// Desired subscriptions with per-channel reference counts. Several
    /// open views may share one channel name; the wire subscribe and
    /// unsubscribe are only sent on the 0->1 and 1->0 transitions.
    desired: HashMap<ChannelName, usize>,
    handlers: Vec<EventHandler>,
    consecutive_failures: u32,
    /// Set by explicit `disconnect()` and by auth rejection. Suppresses
    /// any further reconnection.
    terminal: bool,
}

impl<T: ChannelTransport> RealtimeClient<T> {
    pub fn new(config: RealtimeConfig, transport: T) -> Self {
        Self {
            config,
            reconnect_policy: ReconnectPolicy::default(),
            transport,
            state: ConnectionState::Disconnected,
            connection_id: None,
            desired: HashMap::new(),
            handlers: Vec::new(),
            consecutive_failures: 0,
            terminal: false,
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = policy;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connection id assigned by the registry at handshake, if connected.
    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection_id
    }

    /// Register a handler invoked for every decoded event. Handlers run
    /// in registration order.
    pub fn on_event(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    /// Establish (or re-establish) the connection.
    ///
    /// On success the client is `Connected` and every channel still in the
    /// desired set has been re-subscribed. `SyncError::Auth` is terminal;
    /// `SyncError::Connection` counts toward the backoff schedule and may
    /// be retried per `should_reconnect()` / `reconnect_delay()`.
    pub fn connect(&mut self) -> Result<(), SyncError> {
        if self.terminal {
            return Err(SyncError::Connection("client has been shut down".to_string()));
        }
        if self.config.token.is_empty() {
            self.terminal = true;
            return Err(SyncError::Auth("no credential present".to_string()));
        }
        validate_ws_url(&self.config.ws_url)?;

        self.state = ConnectionState::Connecting;

        if let Err(e) = self.transport.connect(&self.config.ws_url) {
            return Err(self.connection_failed(format!("connection failed: {e}")));
        }

        let hello = ClientFrame::Hello {
            protocol_version: CURRENT_PROTOCOL_VERSION.to_string(),
            token: self.config.token.clone(),
        };
        if let Err(e) = self.transport.send(&hello) {
            self.transport.close();
            return Err(self.connection_failed(format!("failed to send hello: {e}")));
        }

        match self.recv_frame() {
            Ok(Some(ServerFrame::HelloAck { connection_id, .. })) => {
                self.connection_id = Some(connection_id);
            }
            Ok(Some(ServerFrame::Error { code, message, .. })) => {
                self.transport.close();
                if code.starts_with("AUTH_") {
                    // Failed authentication is terminal, no further retries.
                    self.terminal = true;
                    self.state = ConnectionState::Disconnected;
                    return Err(SyncError::Auth(format!("{code}: {message}")));
                }
                return Err(self.connection_failed(format!("hello rejected: {code}: {message}")));
            }
            Ok(Some(_)) => {
                self.transport.close();
                return Err(
                    self.connection_failed("unexpected frame in response to hello".to_string())
                );
            }
            Ok(None) => {
                return Err(
                    self.connection_failed("connection closed during handshake".to_string())
                );
            }
            Err(e) => {
                self.transport.close();
                return Err(self.connection_failed(format!("error during handshake: {e}")));
            }
        }

        self.state = ConnectionState::Connected;
        self.consecutive_failures = 0;
        info!(connection_id = ?self.connection_id, "realtime connection established");

        // Replay every channel still desired. On the initial connect the
        // set is empty; after a drop this restores all live views. A send
        // failure here means the link broke again; treat it like any
        // other connection failure so the backoff counter stays honest.
        let channels: Vec<ChannelName> = self.desired.keys().copied().collect();
        for channel in channels {
            if let Err(error) = self.send_frame(ClientFrame::Subscribe { channel }) {
                self.transport.close();
                return Err(self.connection_failed(format!("failed to re-subscribe: {error}")));
            }
            debug!(%channel, "re-subscribed after connect");
        }

        Ok(())
    }

    /// Add a channel to the desired set.
    ///
    /// Buffered regardless of connection state so a reconnect replays it.
    /// The wire request is only sent when the channel first becomes
    /// desired; further subscribers share the existing subscription.
    pub fn subscribe(&mut self, channel: ChannelName) -> Result<(), SyncError> {
        let refs = self.desired.entry(channel).or_insert(0);
        *refs += 1;
        if *refs == 1 && self.state == ConnectionState::Connected {
            self.send_frame(ClientFrame::Subscribe { channel })?;
        }
        Ok(())
    }

    /// Drop one reference to a channel. No-op if not subscribed. The wire
    /// unsubscribe is only sent when the last reference goes away, so a
    /// channel still in use by another open view stays live.
    pub fn unsubscribe(&mut self, channel: ChannelName) -> Result<(), SyncError> {
        let Some(refs) = self.desired.get_mut(&channel) else {
            return Ok(());
        };
        *refs = refs.saturating_sub(1);
        if *refs > 0 {
            return Ok(());
        }
        self.desired.remove(&channel);
        if self.state == ConnectionState::Connected {
            self.send_frame(ClientFrame::Unsubscribe { channel })?;
        }
        Ok(())
    }

    /// Publish an event to a channel so other subscribers converge.
    pub fn publish(&mut self, channel: ChannelName, event: EventKind) -> Result<(), SyncError> {
        if self.state != ConnectionState::Connected {
            return Err(SyncError::Connection("cannot publish: not connected".to_string()));
        }
        self.send_frame(ClientFrame::Publish { channel, event })
    }

    /// Process the next inbound frame.
    ///
    /// Returns `None` when the frame carried nothing for the caller (an
    /// ack, or a malformed payload that was dropped and logged). Event
    /// handling never suspends; handlers run synchronously before this
    /// returns.
    pub fn poll(&mut self) -> Result<Option<ClientEvent>, SyncError> {
        if self.state != ConnectionState::Connected {
            return Err(SyncError::Connection("cannot poll: not connected".to_string()));
        }

        let raw = match self.transport.recv() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.state = ConnectionState::Reconnecting;
                self.consecutive_failures += 1;
                return Ok(Some(ClientEvent::Dropped {
                    reason: "connection closed by server".to_string(),
                }));
            }
            Err(e) => {
                self.state = ConnectionState::Reconnecting;
                self.consecutive_failures += 1;
                return Ok(Some(ClientEvent::Dropped { reason: e.to_string() }));
            }
        };

        let frame: ServerFrame = match serde_json::from_str(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                // Isolated failure: drop the frame, keep the connection.
                let channel = raw_frame_channel(&raw).unwrap_or_else(|| "unknown".to_string());
                let error = SyncError::malformed(channel, e.to_string());
                warn!(%error, "dropping malformed frame");
                return Ok(None);
            }
        };

        match frame {
            ServerFrame::Event { event } => {
                for handler in &mut self.handlers {
                    handler(&event);
                }
                Ok(Some(ClientEvent::Event(event)))
            }
            ServerFrame::Subscribed { channel } => {
                debug!(%channel, "subscription acknowledged");
                Ok(None)
            }
            ServerFrame::Unsubscribed { channel } => {
                debug!(%channel, "unsubscription acknowledged");
                Ok(None)
            }
            ServerFrame::Error { code, message, retryable } => {
                warn!(%code, %message, retryable, "registry error frame");
                Ok(Some(ClientEvent::ServerError { code, message, retryable }))
            }
            ServerFrame::HelloAck { .. } => Ok(None),
        }
    }

    /// Tear down the connection and clear the desired set. Terminal:
    /// cancels all pending reconnection attempts.
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.desired.clear();
        self.connection_id = None;
        self.state = ConnectionState::Disconnected;
        self.terminal = true;
    }

    /// Compute the backoff delay for the next reconnection attempt.
    pub fn reconnect_delay(&self) -> Duration {
        let exp = self.consecutive_failures.min(7);
        let delay = saturating_mul(self.reconnect_policy.base_delay, 1u64 << exp);
        delay.min(self.reconnect_policy.max_delay)
    }

    /// Whether another reconnection attempt should be made.
    pub fn should_reconnect(&self) -> bool {
        !self.terminal && self.consecutive_failures < self.reconnect_policy.max_attempts
    }

    fn connection_failed(&mut self, reason: String) -> SyncError {
        self.state = ConnectionState::Disconnected;
        self.consecutive_failures += 1;
        SyncError::Connection(reason)
    }

    fn send_frame(&mut self, frame: ClientFrame) -> Result<(), SyncError> {
        self.transport.send(&frame).map_err(|e| SyncError::Connection(e.to_string()))
    }

    fn recv_frame(&mut self) -> Result<Option<ServerFrame>> {
        let Some(raw) = self.transport.recv()? else {
            return Ok(None);
        };
        let frame = serde_json::from_str(&raw)?;
        Ok(Some(frame))
    }
}

/// Best-effort channel extraction from a frame that failed to decode,
/// for error reporting only.
fn raw_frame_channel(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    Some(value.get("channel")?.as_str()?.to_string())
}

fn validate_ws_url(value: &str) -> Result<(), SyncError> {
    let parsed = Url::parse(value)
        .map_err(|error| SyncError::Connection(format!("invalid ws_url `{value}`: {error}")))?;
    match parsed.scheme() {
        "wss" => Ok(()),
        "ws" if is_loopback_host(parsed.host_str()) => Ok(()),
        _ => Err(SyncError::Connection(
            "ws_url must use wss (ws is allowed only for localhost testing)".to_string(),
        )),
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    let Some(host) = host else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|addr| addr.is_loopback())
}

fn saturating_mul(duration: Duration, rhs: u64) -> Duration {
    let nanos = duration.as_nanos().saturating_mul(rhs as u128);
    if nanos > u64::MAX as u128 {
        Duration::from_secs(u64::MAX)
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    // ── Mock transport ──────────────────────────────────────────────

    #[derive(Debug, Default)]
    struct MockTransport {
        /// Raw frames returned by recv() in order.
        recv_queue: VecDeque<Option<String>>,
        /// Frames sent via send().
        sent: Vec<ClientFrame>,
        /// Whether connect was called and the link is nominally up.
        connected: bool,
        closed: bool,
        /// If set, connect returns this error.
        connect_error: Option<String>,
        /// If set, send fails once this many frames have gone out.
        fail_send_after: Option<usize>,
    }

    impl MockTransport {
        fn queue_frame(&mut self, frame: &ServerFrame) {
            self.recv_queue.push_back(Some(serde_json::to_string(frame).unwrap()));
        }

        fn queue_raw(&mut self, raw: &str) {
            self.recv_queue.push_back(Some(raw.to_string()));
        }

        fn queue_close(&mut self) {
            self.recv_queue.push_back(None);
        }
    }

    impl ChannelTransport for MockTransport {
        fn connect(&mut self, _ws_url: &str) -> Result<()> {
            if let Some(err) = &self.connect_error {
                return Err(anyhow::anyhow!("{err}"));
            }
            self.connected = true;
            Ok(())
        }

        fn send(&mut self, frame: &ClientFrame) -> Result<()> {
            if let Some(limit) = self.fail_send_after {
                if self.sent.len() >= limit {
                    return Err(anyhow::anyhow!("link went away"));
                }
            }
            self.sent.push(frame.clone());
            Ok(())
        }

        fn recv(&mut self) -> Result<Option<String>> {
            Ok(self.recv_queue.pop_front().flatten())
        }

        fn close(&mut self) {
            self.closed = true;
            self.connected = false;
        }
    }

    fn test_config() -> RealtimeConfig {
        RealtimeConfig { ws_url: "wss://rt.test/v1/ws".to_string(), token: "tok-123".to_string() }
    }

    fn hello_ack() -> ServerFrame {
        ServerFrame::HelloAck { connection_id: Uuid::new_v4(), server_time: Utc::now() }
    }

    fn sample_event(channel: ChannelName) -> RealtimeEvent {
        RealtimeEvent {
            channel,
            event: EventKind::BlockDeleted { block_id: Uuid::new_v4() },
            origin: None,
            sender_id: None,
            timestamp: Utc::now(),
        }
    }

    fn connected_client(transport: MockTransport) -> RealtimeClient<MockTransport> {
        let mut transport = transport;
        transport.recv_queue.push_front(Some(serde_json::to_string(&hello_ack()).unwrap()));
        let mut client = RealtimeClient::new(test_config(), transport);
        client.connect().expect("connect");
        client
    }

    // ── Connection lifecycle ────────────────────────────────────────

    #[test]
    fn connect_happy_path() {
        let mut transport = MockTransport::default();
        transport.queue_frame(&hello_ack());

        let mut client = RealtimeClient::new(test_config(), transport);
        assert_eq!(client.state(), ConnectionState::Disconnected);

        client.connect().expect("connect should succeed");
        assert_eq!(client.state(), ConnectionState::Connected);
        assert!(client.connection_id().is_some());
    }

    #[test]
    fn connect_sends_hello_with_token() {
        let mut transport = MockTransport::default();
        transport.queue_frame(&hello_ack());

        let mut client = RealtimeClient::new(test_config(), transport);
        client.connect().expect("connect");

        match &client.transport.sent[0] {
            ClientFrame::Hello { protocol_version, token } => {
                assert_eq!(protocol_version, CURRENT_PROTOCOL_VERSION);
                assert_eq!(token, "tok-123");
            }
            other => panic!("first frame should be hello, got {other:?}"),
        }
    }

    #[test]
    fn connect_without_credential_is_terminal_auth_error() {
        let transport = MockTransport::default();
        let mut config = test_config();
        config.token = String::new();

        let mut client = RealtimeClient::new(config, transport);
        let error = client.connect().expect_err("connect must fail without a credential");
        assert!(matches!(error, SyncError::Auth(_)));
        // No connection attempt was made, and no retries will be.
        assert!(!client.transport.connected);
        assert!(!client.should_reconnect());
    }

    #[test]
    fn connect_rejects_non_tls_url() {
        let mut config = test_config();
        config.ws_url = "ws://rt.test/v1/ws".to_string();

        let mut client = RealtimeClient::new(config, MockTransport::default());
        let error = client.connect().expect_err("insecure url must be rejected");
        assert!(error.to_string().contains("wss"));
    }

    #[test]
    fn connect_allows_plain_ws_for_loopback() {
        let mut config = test_config();
        config.ws_url = "ws://127.0.0.1:9400/v1/ws".to_string();

        let mut transport = MockTransport::default();
        transport.queue_frame(&hello_ack());
        let mut client = RealtimeClient::new(config, transport);
        client.connect().expect("loopback ws should be allowed");
    }

    #[test]
    fn auth_rejection_during_handshake_is_terminal() {
        let mut transport = MockTransport::default();
        transport.queue_frame(&ServerFrame::Error {
            code: "AUTH_INVALID_TOKEN".to_string(),
            message: "expired".to_string(),
            retryable: false,
        });

        let mut client = RealtimeClient::new(test_config(), transport);
        let error = client.connect().expect_err("handshake must fail");
        assert!(matches!(error, SyncError::Auth(_)));
        assert!(!client.should_reconnect());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn transport_failure_is_retryable_connection_error() {
        let mut transport = MockTransport::default();
        transport.connect_error = Some("refused".to_string());

        let mut client = RealtimeClient::new(test_config(), transport);
        let error = client.connect().expect_err("connect must fail");
        assert!(matches!(error, SyncError::Connection(_)));
        assert!(client.should_reconnect());
    }

    // ── Subscriptions ───────────────────────────────────────────────

    #[test]
    fn subscribe_sends_wire_request_when_connected() {
        let mut client = connected_client(MockTransport::default());
        let channel = ChannelName::page(Uuid::new_v4());

        client.subscribe(channel).expect("subscribe");
        assert_eq!(client.transport.sent.len(), 2); // hello + subscribe
        assert_eq!(client.transport.sent[1], ClientFrame::Subscribe { channel });
    }

    #[test]
    fn subscribe_is_buffered_while_disconnected_and_replayed_on_connect() {
        let mut transport = MockTransport::default();
        transport.queue_frame(&hello_ack());

        let mut client = RealtimeClient::new(test_config(), transport);
        let channel = ChannelName::workspace(Uuid::new_v4());
        client.subscribe(channel).expect("subscribe while disconnected");
        assert!(client.transport.sent.is_empty());

        client.connect().expect("connect");
        assert_eq!(client.transport.sent[1], ClientFrame::Subscribe { channel });
    }

    #[test]
    fn shared_channel_subscribes_once_on_the_wire() {
        let mut client = connected_client(MockTransport::default());
        let channel = ChannelName::page(Uuid::new_v4());

        client.subscribe(channel).expect("first view");
        client.subscribe(channel).expect("second view");

        let subscribes = client
            .transport
            .sent
            .iter()
            .filter(|frame| matches!(frame, ClientFrame::Subscribe { .. }))
            .count();
        assert_eq!(subscribes, 1);
    }

    #[test]
    fn unsubscribe_waits_for_last_reference() {
        let mut client = connected_client(MockTransport::default());
        let channel = ChannelName::page(Uuid::new_v4());
        client.subscribe(channel).expect("first view");
        client.subscribe(channel).expect("second view");

        client.unsubscribe(channel).expect("first view leaves");
        assert!(!client
            .transport
            .sent
            .iter()
            .any(|frame| matches!(frame, ClientFrame::Unsubscribe { .. })));

        client.unsubscribe(channel).expect("second view leaves");
        assert_eq!(*client.transport.sent.last().unwrap(), ClientFrame::Unsubscribe { channel });
    }

    #[test]
    fn unsubscribe_unknown_channel_is_a_noop() {
        let mut client = connected_client(MockTransport::default());
        let before = client.transport.sent.len();
        client.unsubscribe(ChannelName::page(Uuid::new_v4())).expect("unsubscribe");
        assert_eq!(client.transport.sent.len(), before);
    }

    // ── Event dispatch ──────────────────────────────────────────────

    #[test]
    fn poll_decodes_event_and_invokes_handlers_in_order() {
        let channel = ChannelName::page(Uuid::new_v4());
        let event = sample_event(channel);

        let mut transport = MockTransport::default();
        transport.queue_frame(&ServerFrame::Event { event: event.clone() });
        let mut client = connected_client(transport);

        let order = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&order);
        let second = Rc::clone(&order);
        client.on_event(Box::new(move |_| first.borrow_mut().push("first")));
        client.on_event(Box::new(move |_| second.borrow_mut().push("second")));

        let polled = client.poll().expect("poll").expect("event");
        assert_eq!(polled, ClientEvent::Event(event));
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn malformed_frame_is_dropped_and_later_events_still_flow() {
        let channel = ChannelName::page(Uuid::new_v4());
        let event = sample_event(channel);

        let mut transport = MockTransport::default();
        transport.queue_raw(r#"{"type":"event","channel":"page:oops","message":"block_deleted"}"#);
        transport.queue_frame(&ServerFrame::Event { event: event.clone() });
        let mut client = connected_client(transport);

        assert_eq!(client.poll().expect("poll malformed"), None);
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.poll().expect("poll event"), Some(ClientEvent::Event(event)));
    }

    #[test]
    fn subscription_acks_carry_nothing_for_the_caller() {
        let channel = ChannelName::page(Uuid::new_v4());
        let mut transport = MockTransport::default();
        transport.queue_frame(&ServerFrame::Subscribed { channel });
        let mut client = connected_client(transport);

        assert_eq!(client.poll().expect("poll"), None);
    }

    #[test]
    fn server_error_frame_is_surfaced() {
        let mut transport = MockTransport::default();
        transport.queue_frame(&ServerFrame::Error {
            code: "CHANNEL_FORBIDDEN".to_string(),
            message: "denied".to_string(),
            retryable: false,
        });
        let mut client = connected_client(transport);

        match client.poll().expect("poll").expect("event") {
            ClientEvent::ServerError { code, retryable, .. } => {
                assert_eq!(code, "CHANNEL_FORBIDDEN");
                assert!(!retryable);
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    // ── Reconnection ────────────────────────────────────────────────

    #[test]
    fn dropped_connection_enters_reconnecting() {
        let mut transport = MockTransport::default();
        transport.queue_close();
        let mut client = connected_client(transport);

        match client.poll().expect("poll").expect("event") {
            ClientEvent::Dropped { .. } => {}
            other => panic!("expected dropped, got {other:?}"),
        }
        assert_eq!(client.state(), ConnectionState::Reconnecting);
        assert!(client.should_reconnect());
    }

    #[test]
    fn reconnect_replays_desired_subscriptions_exactly_once() {
        let kept = ChannelName::page(Uuid::new_v4());
        let dropped_during_outage = ChannelName::workspace(Uuid::new_v4());

        let mut transport = MockTransport::default();
        transport.queue_close();
        let mut client = connected_client(transport);
        client.subscribe(kept).expect("subscribe kept");
        client.subscribe(dropped_during_outage).expect("subscribe other");

        client.poll().expect("poll"); // connection drops
        client.unsubscribe(dropped_during_outage).expect("unsubscribe during outage");

        client.transport.sent.clear();
        client.transport.queue_frame(&hello_ack());
        client.connect().expect("reconnect");

        let replayed: Vec<_> = client
            .transport
            .sent
            .iter()
            .filter_map(|frame| match frame {
                ClientFrame::Subscribe { channel } => Some(*channel),
                _ => None,
            })
            .collect();
        assert_eq!(replayed, vec![kept]);
    }

    #[test]
    fn replay_failure_during_reconnect_stays_disconnected_with_backoff() {
        let mut transport = MockTransport::default();
        transport.queue_close();
        let mut client = connected_client(transport);
        client.subscribe(ChannelName::page(Uuid::new_v4())).expect("subscribe");

        client.poll().expect("poll"); // connection drops

        // Handshake succeeds but the link breaks during the subscription
        // replay.
        client.transport.queue_frame(&hello_ack());
        client.transport.fail_send_after = Some(client.transport.sent.len() + 1);
        let error = client.connect().expect_err("replay must fail");

        assert!(matches!(error, SyncError::Connection(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.reconnect_delay() > client.reconnect_policy.base_delay);
        assert!(client.should_reconnect());
    }

    #[test]
    fn reconnect_delay_starts_at_base_and_doubles() {
        let mut transport = MockTransport::default();
        transport.connect_error = Some("down".to_string());
        let mut client = RealtimeClient::new(test_config(), transport);

        assert_eq!(client.reconnect_delay(), Duration::from_millis(250));
        client.connect().expect_err("fails");
        assert_eq!(client.reconnect_delay(), Duration::from_millis(500));
        client.connect().expect_err("fails");
        assert_eq!(client.reconnect_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn reconnect_delay_caps_at_max() {
        let mut transport = MockTransport::default();
        transport.connect_error = Some("down".to_string());
        let mut client = RealtimeClient::new(test_config(), transport);

        for _ in 0..20 {
            client.connect().expect_err("fails");
        }
        assert_eq!(client.reconnect_delay(), Duration::from_secs(30));
    }

    #[test]
    fn successful_connect_resets_failure_count() {
        let mut transport = MockTransport::default();
        transport.connect_error = Some("down".to_string());
        let mut client = RealtimeClient::new(test_config(), transport);

        client.connect().expect_err("fails");
        client.connect().expect_err("fails");

        client.transport.connect_error = None;
        client.transport.queue_frame(&hello_ack());
        client.connect().expect("recovers");
        assert_eq!(client.reconnect_delay(), Duration::from_millis(250));
    }

    #[test]
    fn should_reconnect_respects_max_attempts() {
        let policy = ReconnectPolicy { max_attempts: 2, ..Default::default() };
        let mut transport = MockTransport::default();
        transport.connect_error = Some("down".to_string());
        let mut client = RealtimeClient::new(test_config(), transport).with_reconnect_policy(policy);

        assert!(client.should_reconnect());
        client.connect().expect_err("fails");
        assert!(client.should_reconnect());
        client.connect().expect_err("fails");
        assert!(!client.should_reconnect());
    }

    // ── Disconnect ──────────────────────────────────────────────────

    #[test]
    fn disconnect_is_terminal_and_clears_desired_set() {
        let mut client = connected_client(MockTransport::default());
        client.subscribe(ChannelName::page(Uuid::new_v4())).expect("subscribe");

        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.transport.closed);
        assert!(client.desired.is_empty());
        assert!(!client.should_reconnect());
        assert!(client.connect().is_err());
    }
}
