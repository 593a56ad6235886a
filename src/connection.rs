//! Connection management for AMI
//!
//! [`AmiClient::connect`] performs the banner and login handshake on the
//! caller's task, then hands the read half of the socket to a background
//! reader. The reader routes responses to waiting actions by `ActionID` and
//! forwards everything else to the [`AmiEventStream`].

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError, RwLock, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::AbortHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::{
    action::{AmiAction, AmiResponse, ResponseCompletion, ResponseStatus},
    actions::{
        Challenge, Command, CoreSettings, DbDel, DbGet, DbPut, EventMask, Events, Hangup, Login,
        Logoff, Originate, Ping,
    },
    constants::*,
    error::{AmiError, AmiResult},
    event::{AmiEvent, AmiEventType},
    protocol::{AmiMessage, AmiParser, MessageType},
};

/// How the login secret is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// `Secret:` header in clear text
    #[default]
    Plain,
    /// `Challenge` first, then `Key: md5(challenge + secret)`
    Md5,
}

/// Options for [`AmiClient::connect_with_options`]
#[derive(Debug, Clone)]
pub struct AmiConnectOptions {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub auth: AuthMethod,
    /// Event mask sent with `Login`
    pub events: EventMask,
    pub event_queue_size: usize,
    /// Send `Ping` at this interval. `None` disables keepalive.
    pub keepalive_interval: Option<Duration>,
    /// Disconnect when nothing is read for this long. `None` disables the check.
    pub liveness_timeout: Option<Duration>,
}

impl Default for AmiConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            auth: AuthMethod::Plain,
            events: EventMask::On,
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
            keepalive_interval: None,
            liveness_timeout: None,
        }
    }
}

impl AmiConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    pub fn events(mut self, events: EventMask) -> Self {
        self.events = events;
        self
    }

    pub fn event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size.max(1);
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = Some(timeout);
        self
    }
}

/// Why the connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Asterisk sent a `Shutdown` event
    ServerShutdown,
    /// TCP connection closed by the remote end
    ConnectionClosed,
    /// No traffic within the liveness timeout
    HeartbeatExpired,
    /// [`AmiClient::disconnect`] was called
    ClientRequested,
    IoError(String),
    ProtocolError(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ServerShutdown => f.write_str("server shutdown"),
            DisconnectReason::ConnectionClosed => f.write_str("connection closed"),
            DisconnectReason::HeartbeatExpired => f.write_str("heartbeat expired"),
            DisconnectReason::ClientRequested => f.write_str("client requested"),
            DisconnectReason::IoError(e) => write!(f, "I/O error: {}", e),
            DisconnectReason::ProtocolError(e) => write!(f, "protocol error: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected(DisconnectReason),
}

/// An action waiting for its response, and for list actions, its events.
struct PendingAction {
    completion: ResponseCompletion,
    response: Option<AmiResponse>,
    events: Vec<AmiEvent>,
    list_done: bool,
    reply: oneshot::Sender<AmiResult<AmiResponse>>,
}

impl PendingAction {
    fn new(completion: ResponseCompletion, reply: oneshot::Sender<AmiResult<AmiResponse>>) -> Self {
        Self {
            completion,
            response: None,
            events: Vec::new(),
            list_done: false,
            reply,
        }
    }

    fn finish(self) {
        let Some(mut response) = self.response else {
            return;
        };
        for event in self.events {
            response.push_event(event);
        }
        // Receiver gone means the caller timed out
        let _ = self
            .reply
            .send(Ok(response));
    }
}

/// Lock a std mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    writer: Mutex<OwnedWriteHalf>,
    pending: std::sync::Mutex<HashMap<String, PendingAction>>,
    status: RwLock<ConnectionStatus>,
    next_action_id: AtomicU64,
    command_timeout_ms: AtomicU64,
    /// 0 disables the liveness check
    liveness_timeout_ms: AtomicU64,
    started: Instant,
    last_activity_ms: AtomicU64,
    protocol_version: String,
    tasks: std::sync::Mutex<Vec<AbortHandle>>,
}

impl Shared {
    fn new(
        writer: OwnedWriteHalf,
        protocol_version: String,
        next_action_id: u64,
        options: &AmiConnectOptions,
    ) -> Self {
        Self {
            writer: Mutex::new(writer),
            pending: std::sync::Mutex::new(HashMap::new()),
            status: RwLock::new(ConnectionStatus::Connected),
            next_action_id: AtomicU64::new(next_action_id),
            command_timeout_ms: AtomicU64::new(
                options
                    .command_timeout
                    .as_millis() as u64,
            ),
            liveness_timeout_ms: AtomicU64::new(
                options
                    .liveness_timeout
                    .map_or(0, |t| t.as_millis() as u64),
            ),
            started: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            protocol_version,
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_connected(&self) -> bool {
        matches!(self.status(), ConnectionStatus::Connected)
    }

    fn set_disconnected(&self, reason: DisconnectReason) {
        let mut status = self
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *status = ConnectionStatus::Disconnected(reason);
    }

    /// Record `reason` unless an earlier reason is already set.
    fn mark_disconnected(&self, reason: DisconnectReason) {
        let mut status = self
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *status == ConnectionStatus::Connected {
            *status = ConnectionStatus::Disconnected(reason);
        }
    }

    fn next_action_id(&self) -> String {
        self.next_action_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string()
    }

    fn touch(&self) {
        let elapsed = self
            .started
            .elapsed()
            .as_millis() as u64;
        self.last_activity_ms
            .store(elapsed, Ordering::Relaxed);
    }

    /// Returns the configured timeout if it has passed since the last read.
    fn liveness_expired(&self) -> Option<u64> {
        let limit = self
            .liveness_timeout_ms
            .load(Ordering::Relaxed);
        if limit == 0 {
            return None;
        }
        let now = self
            .started
            .elapsed()
            .as_millis() as u64;
        let idle = now.saturating_sub(
            self.last_activity_ms
                .load(Ordering::Relaxed),
        );
        (idle > limit).then_some(limit)
    }

    /// Error handed to actions cut off by the end of the session
    fn disconnect_error(&self) -> AmiError {
        match self.status() {
            ConnectionStatus::Disconnected(DisconnectReason::HeartbeatExpired) => {
                AmiError::HeartbeatExpired {
                    interval_ms: self
                        .liveness_timeout_ms
                        .load(Ordering::Relaxed),
                }
            }
            _ => AmiError::ConnectionClosed,
        }
    }

    /// Allocate an ActionID and park a reply slot for it.
    ///
    /// The status is read after the insert, so an entry never outlives a
    /// `fail_pending` that ran in between.
    fn register(
        &self,
        completion: ResponseCompletion,
    ) -> AmiResult<(String, oneshot::Receiver<AmiResult<AmiResponse>>)> {
        let action_id = self.next_action_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.pending).insert(action_id.clone(), PendingAction::new(completion, reply_tx));

        if !self.is_connected() {
            lock(&self.pending).remove(&action_id);
            return Err(AmiError::NotConnected);
        }
        Ok((action_id, reply_rx))
    }

    async fn send(&self, action: AmiAction) -> AmiResult<AmiResponse> {
        let (action_id, reply_rx) = self.register(
            action
                .response_completion()
                .clone(),
        )?;

        debug!("Sending action {} (ActionID {})", action.name(), action_id);
        let wire = action.to_wire_format(&action_id);
        let written = {
            let mut writer = self
                .writer
                .lock()
                .await;
            writer
                .write_all(wire.as_bytes())
                .await
        };
        if let Err(e) = written {
            lock(&self.pending).remove(&action_id);
            warn!("Failed to send action {}: {}", action.name(), e);
            return Err(AmiError::Io(e));
        }

        let timeout_ms = self
            .command_timeout_ms
            .load(Ordering::Relaxed);
        match timeout(Duration::from_millis(timeout_ms), reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.disconnect_error()),
            Err(_) => {
                lock(&self.pending).remove(&action_id);
                warn!(
                    "Action {} (ActionID {}) timed out after {}ms",
                    action.name(),
                    action_id,
                    timeout_ms
                );
                Err(AmiError::Timeout { timeout_ms })
            }
        }
    }

    fn route(&self, message: AmiMessage, events: &mpsc::Sender<AmiEvent>) {
        match message.message_type {
            MessageType::Response => self.complete_response(message.into_response()),
            MessageType::Event => match message.into_event() {
                Ok(event) => {
                    if event.is_event_type(AmiEventType::Shutdown) {
                        info!(
                            "Asterisk is shutting down ({})",
                            event
                                .header("Shutdown")
                                .map(String::as_str)
                                .unwrap_or("unknown")
                        );
                        self.set_disconnected(DisconnectReason::ServerShutdown);
                    }
                    if let Some(event) = self.collect_list_event(event) {
                        deliver_event(events, event);
                    }
                }
                Err(e) => warn!("Dropping malformed event: {}", e),
            },
            MessageType::Banner => debug!("Ignoring repeated banner"),
            MessageType::Unknown => debug!(
                "Ignoring message with neither Response nor Event: {:?}",
                message.headers
            ),
        }
    }

    fn complete_response(&self, response: AmiResponse) {
        let Some(action_id) = response
            .action_id()
            .cloned()
        else {
            debug!(
                "Ignoring response without ActionID: {}",
                response.status()
            );
            return;
        };

        let mut pending = lock(&self.pending);
        let Some(entry) = pending.get_mut(&action_id) else {
            debug!("No pending action for ActionID {}", action_id);
            return;
        };

        let waits_for_list = matches!(entry.completion, ResponseCompletion::EventList { .. })
            && response.is_success()
            && !entry.list_done;
        entry.response = Some(response);

        if !waits_for_list {
            if let Some(entry) = pending.remove(&action_id) {
                entry.finish();
            }
        }
    }

    /// Attach a list event to its pending action. Returns the event when it
    /// belongs on the event stream instead.
    fn collect_list_event(&self, event: AmiEvent) -> Option<AmiEvent> {
        let Some(action_id) = event
            .action_id()
            .cloned()
        else {
            return Some(event);
        };

        let mut pending = lock(&self.pending);
        let Some(entry) = pending.get_mut(&action_id) else {
            return Some(event);
        };
        let terminator = match &entry.completion {
            ResponseCompletion::EventList { terminator } => *terminator,
            ResponseCompletion::Single => return Some(event),
        };

        let announced = entry
            .response
            .as_ref()
            .is_some_and(AmiResponse::starts_event_list);
        let done = event.is_list_complete()
            || (!announced && terminator.is_some_and(|name| event.name() == name));

        trace!("List event {} for ActionID {}", event.name(), action_id);
        entry
            .events
            .push(event);

        if done {
            entry.list_done = true;
            if entry
                .response
                .is_some()
            {
                if let Some(entry) = pending.remove(&action_id) {
                    entry.finish();
                }
            }
        }
        None
    }

    fn fail_pending(&self) {
        let drained: Vec<_> = lock(&self.pending)
            .drain()
            .collect();
        if !drained.is_empty() {
            debug!("Failing {} pending actions", drained.len());
        }
        for (_, entry) in drained {
            let _ = entry
                .reply
                .send(Err(self.disconnect_error()));
        }
    }
}

fn deliver_event(events: &mpsc::Sender<AmiEvent>, event: AmiEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("Event queue full, dropping {} event", event.name());
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            trace!("Event stream dropped, discarding event");
        }
    }
}

async fn reader_loop(
    shared: Arc<Shared>,
    mut reader: OwnedReadHalf,
    mut parser: AmiParser,
    events: mpsc::Sender<AmiEvent>,
) {
    let mut buf = vec![0u8; SOCKET_BUF_SIZE];
    let mut liveness = tokio::time::interval(Duration::from_millis(LIVENESS_CHECK_INTERVAL_MS));
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    liveness
        .tick()
        .await;

    let reason = 'read: loop {
        loop {
            match parser.parse_message() {
                Ok(Some(message)) => shared.route(message, &events),
                Ok(None) => break,
                Err(AmiError::InvalidHeader { header }) => {
                    warn!("[READER] Skipping message with invalid header line {:?}", header);
                }
                Err(e) => {
                    warn!("[READER] Parse error: {}", e);
                    break 'read DisconnectReason::ProtocolError(e.to_string());
                }
            }
        }

        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("[READER] Connection closed by Asterisk");
                    break 'read DisconnectReason::ConnectionClosed;
                }
                Ok(n) => {
                    trace!("[READER] Read {} bytes", n);
                    shared.touch();
                    if let Err(e) = parser.add_data(&buf[..n]) {
                        warn!("[READER] {}", e);
                        break 'read DisconnectReason::ProtocolError(e.to_string());
                    }
                }
                Err(e) => {
                    warn!("[READER] Read error: {}", e);
                    break 'read DisconnectReason::IoError(e.to_string());
                }
            },
            _ = liveness.tick() => {
                if let Some(limit) = shared.liveness_expired() {
                    warn!("[READER] No traffic from Asterisk for {}ms", limit);
                    break 'read DisconnectReason::HeartbeatExpired;
                }
            }
        }
    };

    shared.mark_disconnected(reason);
    shared.fail_pending();
    debug!("[READER] Reader task finished: {:?}", shared.status());
}

async fn keepalive_loop(shared: Weak<Shared>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.is_connected() {
            return;
        }
        match shared
            .send(Ping.into())
            .await
        {
            Ok(_) => trace!("Keepalive ping answered"),
            Err(e) if e.is_connection_error() => {
                debug!("Keepalive stopping: {}", e);
                return;
            }
            Err(e) => warn!("Keepalive ping failed: {}", e),
        }
    }
}

/// Socket and parser state used until login completes.
struct Handshake {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    parser: AmiParser,
    buf: Vec<u8>,
    early_events: Vec<AmiEvent>,
    next_action_id: u64,
}

impl Handshake {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer,
            parser: AmiParser::new(),
            buf: vec![0u8; SOCKET_BUF_SIZE],
            early_events: Vec::new(),
            next_action_id: 1,
        }
    }

    async fn read_message(&mut self) -> AmiResult<AmiMessage> {
        loop {
            if let Some(message) = self
                .parser
                .parse_message()?
            {
                return Ok(message);
            }
            let n = self
                .reader
                .read(&mut self.buf)
                .await?;
            if n == 0 {
                return Err(AmiError::ConnectionClosed);
            }
            trace!("[CONNECT] Read {} bytes", n);
            self.parser
                .add_data(&self.buf[..n])?;
        }
    }

    /// Banner text after the `/`, e.g. `5.0.1`
    async fn read_banner(&mut self) -> AmiResult<String> {
        let message = self
            .read_message()
            .await?;
        let banner = match (message.message_type, message.body) {
            (MessageType::Banner, Some(body)) => body,
            _ => return Err(AmiError::protocol_error("Expected AMI banner")),
        };
        debug!("[CONNECT] Banner: {}", banner);
        Ok(banner
            .split_once('/')
            .map(|(_, version)| version.trim().to_string())
            .unwrap_or_default())
    }

    async fn request(&mut self, action: AmiAction) -> AmiResult<AmiResponse> {
        let action_id = self
            .next_action_id
            .to_string();
        self.next_action_id += 1;

        debug!("[CONNECT] Sending {} (ActionID {})", action.name(), action_id);
        self.writer
            .write_all(
                action
                    .to_wire_format(&action_id)
                    .as_bytes(),
            )
            .await?;

        loop {
            let message = self
                .read_message()
                .await?;
            match message.message_type {
                MessageType::Response
                    if message
                        .action_id()
                        .is_some_and(|id| *id == action_id) =>
                {
                    return Ok(message.into_response());
                }
                MessageType::Event => {
                    let event = message.into_event()?;
                    trace!("[CONNECT] Queueing early event {}", event.name());
                    self.early_events
                        .push(event);
                }
                _ => debug!("[CONNECT] Skipping unrelated message: {:?}", message.headers),
            }
        }
    }

    async fn login(
        &mut self,
        username: &str,
        secret: &str,
        auth: AuthMethod,
        events: EventMask,
    ) -> AmiResult<()> {
        let login = match auth {
            AuthMethod::Plain => Login::plain(username, secret, events),
            AuthMethod::Md5 => {
                let response = self
                    .request(Challenge.into())
                    .await?;
                let challenge = match response.header(HEADER_CHALLENGE) {
                    Some(challenge) if response.is_success() => challenge.clone(),
                    _ => {
                        return Err(AmiError::auth_failed(
                            response
                                .message()
                                .cloned()
                                .unwrap_or_else(|| "Challenge rejected".to_string()),
                        ))
                    }
                };
                debug!("[CONNECT] Got MD5 challenge");
                Login::md5(username, &challenge, secret, events)
            }
        };

        let response = self
            .request(login.into())
            .await?;
        if response.is_success() {
            debug!("[CONNECT] Login accepted");
            return Ok(());
        }
        let reason = response
            .message()
            .cloned()
            .unwrap_or_else(|| format!("Response: {}", response.status()));
        warn!("[CONNECT] Login rejected: {}", reason);
        Err(AmiError::auth_failed(reason))
    }
}

/// Event receiver half of a connection.
///
/// Yields events until the connection ends, then `None`.
pub struct AmiEventStream {
    rx: mpsc::Receiver<AmiEvent>,
}

impl AmiEventStream {
    pub async fn recv(&mut self) -> Option<AmiEvent> {
        self.rx
            .recv()
            .await
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<AmiEvent> {
        self.rx
            .try_recv()
            .ok()
    }
}

impl Stream for AmiEventStream {
    type Item = AmiEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}

impl fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiEventStream")
            .finish_non_exhaustive()
    }
}

/// Stops the background tasks once the last [`AmiClient`] clone is gone.
///
/// The reader owns the read half and a strong reference to the write half, so
/// the socket stays open until it is aborted.
struct CloseOnDrop {
    shared: Weak<Shared>,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        let Some(shared) = self
            .shared
            .upgrade()
        else {
            return;
        };
        if shared.is_connected() {
            debug!("AmiClient dropped - connection will be closed");
            shared.set_disconnected(DisconnectReason::ClientRequested);
            shared.fail_pending();
        }
        for task in lock(&shared.tasks).drain(..) {
            task.abort();
        }
    }
}

/// Action sender half of a connection. Cheap to clone; all clones share one session.
///
/// Dropping the last clone closes the connection without a `Logoff`, and the
/// [`AmiEventStream`] then ends.
#[derive(Clone)]
pub struct AmiClient {
    shared: Arc<Shared>,
    _guard: Arc<CloseOnDrop>,
}

impl AmiClient {
    /// Connect and log in with default options
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> AmiResult<(Self, AmiEventStream)> {
        Self::connect_with_options(host, port, username, secret, AmiConnectOptions::default())
            .await
    }

    pub async fn connect_with_options(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
        options: AmiConnectOptions,
    ) -> AmiResult<(Self, AmiEventStream)> {
        info!("Connecting to Asterisk at {}:{}", host, port);

        let connect_ms = options
            .connect_timeout
            .as_millis() as u64;
        debug!("[CONNECT] Starting TCP connect with {}ms timeout", connect_ms);
        let stream = match timeout(options.connect_timeout, TcpStream::connect((host, port))).await
        {
            Ok(Ok(stream)) => {
                debug!("[CONNECT] TCP connection established");
                stream
            }
            Ok(Err(e)) => {
                warn!("[CONNECT] TCP connect failed: {}", e);
                return Err(AmiError::Io(e));
            }
            Err(_) => {
                warn!("[CONNECT] TCP connect timed out after {}ms", connect_ms);
                return Err(AmiError::Timeout {
                    timeout_ms: connect_ms,
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("[CONNECT] Could not set TCP_NODELAY: {}", e);
        }

        let mut handshake = Handshake::new(stream);
        let login = async {
            let version = handshake
                .read_banner()
                .await?;
            handshake
                .login(username, secret, options.auth, options.events.clone())
                .await?;
            Ok::<_, AmiError>(version)
        };
        let protocol_version = match timeout(options.connect_timeout, login).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("[CONNECT] Login timed out after {}ms", connect_ms);
                return Err(AmiError::Timeout {
                    timeout_ms: connect_ms,
                });
            }
        };

        let Handshake {
            reader,
            writer,
            parser,
            early_events,
            next_action_id,
            ..
        } = handshake;

        let (event_tx, event_rx) = mpsc::channel(options.event_queue_size.max(1));
        for event in early_events {
            deliver_event(&event_tx, event);
        }

        let shared = Arc::new(Shared::new(writer, protocol_version, next_action_id, &options));

        let reader_task = tokio::spawn(reader_loop(shared.clone(), reader, parser, event_tx));
        lock(&shared.tasks).push(reader_task.abort_handle());

        if let Some(interval) = options.keepalive_interval {
            debug!("[CONNECT] Keepalive every {}ms", interval.as_millis());
            let task = tokio::spawn(keepalive_loop(Arc::downgrade(&shared), interval));
            lock(&shared.tasks).push(task.abort_handle());
        }

        info!(
            "Connected to Asterisk (AMI {}) as {}",
            shared.protocol_version, username
        );
        let guard = Arc::new(CloseOnDrop {
            shared: Arc::downgrade(&shared),
        });
        Ok((
            Self {
                shared,
                _guard: guard,
            },
            AmiEventStream { rx: event_rx },
        ))
    }

    /// Send any action and wait for its response.
    ///
    /// The response is returned whatever its status; use
    /// [`AmiResponse::into_result`] to turn `Response: Error` into an error.
    pub async fn send_action(&self, action: impl Into<AmiAction>) -> AmiResult<AmiResponse> {
        self.shared
            .send(action.into())
            .await
    }

    /// Run a CLI command and return its output.
    pub async fn command(&self, command: &str) -> AmiResult<AmiResponse> {
        let response = self
            .send_action(Command::new(command))
            .await?;
        // Unknown commands answer Error with the CLI's complaint in Output
        if !response.is_success()
            && !response
                .output()
                .is_empty()
        {
            return Err(AmiError::CommandFailed {
                message: response.output_text(),
            });
        }
        response.into_result()
    }

    pub async fn originate(&self, originate: Originate) -> AmiResult<AmiResponse> {
        let action = originate.to_action()?;
        self.send_action(action)
            .await?
            .into_result()
    }

    pub async fn hangup(&self, channel: &str) -> AmiResult<AmiResponse> {
        self.send_action(Hangup::new(channel))
            .await?
            .into_result()
    }

    /// Read an AstDB entry. `Ok(None)` when the entry does not exist.
    pub async fn db_get(&self, family: &str, key: &str) -> AmiResult<Option<String>> {
        let response = self
            .send_action(DbGet::new(family, key))
            .await?;

        if !response.is_success() {
            let not_found = response
                .message()
                .is_some_and(|m| {
                    m.to_ascii_lowercase()
                        .contains("not found")
                });
            if not_found {
                debug!("DBGet {}/{}: no entry", family, key);
                return Ok(None);
            }
            return response
                .into_result()
                .map(|_| None);
        }

        Ok(response
            .events()
            .iter()
            .find(|e| e.is_event_type(AmiEventType::DbGetResponse))
            .and_then(|e| e.header("Val"))
            .cloned())
    }

    pub async fn db_put(&self, family: &str, key: &str, value: &str) -> AmiResult<()> {
        self.send_action(DbPut::new(family, key, value))
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn db_del(&self, family: &str, key: &str) -> AmiResult<()> {
        self.send_action(DbDel::new(family, key))
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn ping(&self) -> AmiResult<()> {
        let response = self
            .send_action(Ping)
            .await?;
        // Asterisk 1.4 answers `Response: Pong`
        match response.status() {
            ResponseStatus::Other(s) if s.eq_ignore_ascii_case("pong") => Ok(()),
            _ => response
                .into_result()
                .map(|_| ()),
        }
    }

    /// `AsteriskVersion` from `CoreSettings`, e.g. `20.5.0`
    pub async fn asterisk_version(&self) -> AmiResult<String> {
        let response = self
            .send_action(CoreSettings)
            .await?
            .into_result()?;
        response
            .header("AsteriskVersion")
            .cloned()
            .ok_or_else(|| AmiError::MissingHeader {
                header: "AsteriskVersion".to_string(),
            })
    }

    pub async fn set_event_mask(&self, mask: EventMask) -> AmiResult<()> {
        self.send_action(Events { mask })
            .await?
            .into_result()
            .map(|_| ())
    }

    /// Log off and close the connection.
    ///
    /// `Logoff` is sent best effort; the connection is closed either way.
    pub async fn disconnect(&self) -> AmiResult<()> {
        if !self.is_connected() {
            return Ok(());
        }
        info!("Disconnecting from Asterisk");

        let logoff: AmiAction = Logoff.into();
        let action_id = self
            .shared
            .next_action_id();
        {
            let mut writer = self
                .shared
                .writer
                .lock()
                .await;
            let wire = logoff.to_wire_format(&action_id);
            if let Err(e) = writer
                .write_all(wire.as_bytes())
                .await
            {
                debug!("Logoff not sent: {}", e);
            }
            let _ = writer
                .shutdown()
                .await;
        }

        self.shared
            .set_disconnected(DisconnectReason::ClientRequested);
        self.shared
            .fail_pending();
        for task in lock(&self.shared.tasks).drain(..) {
            task.abort();
        }
        Ok(())
    }

    /// Protocol version from the banner, e.g. `5.0.1`
    pub fn protocol_version(&self) -> &str {
        &self
            .shared
            .protocol_version
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared
            .status()
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .is_connected()
    }

    pub fn set_command_timeout(&self, timeout: Duration) {
        self.shared
            .command_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Disconnect when nothing arrives for `timeout`. `Duration::ZERO` disables the check.
    ///
    /// Checked every two seconds by the reader.
    pub fn set_liveness_timeout(&self, timeout: Duration) {
        self.shared
            .liveness_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }
}

impl fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiClient")
            .field("protocol_version", &self.shared.protocol_version)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
