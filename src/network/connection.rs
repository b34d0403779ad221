//! Managed outbound connection to one IRC server.
//!
//! A [`Connection`] keeps its identity, endpoint, flags and user context for
//! its whole life. The transport underneath (socket, TLS session, framing,
//! outbound queue) is owned by a driver task and is replaced wholesale on
//! every (re)connect.
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!      ^              |             |
//!      +---- error ---+---- EOF ----+   (auto_reconnect: redial after delay)
//! ```
//!
//! Transport status reaches the [`ConnectionHandler`] in a fixed order:
//! `Connected` once the link is up; on failure `Error(..)` and then `Eof`;
//! on a clean close just `Eof`. Reporting those to the log is the handler's
//! job.
//!
//! A line that is not UTF-8 is dropped and reading continues. A line over
//! the length limit ends the session like any other transport error.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use slirc_wire::{LineCodec, LineError};
use tokio::net::{TcpStream, lookup_host};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::io::InspectReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::stream::IrcStream;
use super::tls;
use crate::error::ConnectionError;

/// Process-unique connection handle.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a torn-down transport may spend flushing and saying goodbye.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Configuration and context
// ============================================================================

/// Transport flags fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionFlags {
    pub tls: bool,
    pub auto_reconnect: bool,
}

/// Registration details carried with a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub nick: String,
    pub username: String,
    pub realname: String,
    pub password: Option<String>,
    /// Joined on welcome. An entry may carry a key after a space.
    pub channels: Vec<String>,
}

impl Identity {
    /// Lines sent right after the transport comes up.
    pub fn registration(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if let Some(password) = &self.password {
            lines.push(format!("PASS {}", password));
        }
        lines.push(format!(
            "USER {} {} * :{}",
            self.username, self.username, self.realname
        ));
        lines.push(format!("NICK {}", self.nick));
        lines
    }
}

/// Timing and framing knobs.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Liveness watchdog: no inbound bytes for this long is an error.
    /// Any bytes count, including part of a line. Also bounds the connect
    /// phase.
    pub read_timeout: Duration,
    /// Wait before an automatic redial.
    pub reconnect_delay: Duration,
    pub tls_verify: bool,
    pub max_line_len: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(300),
            reconnect_delay: Duration::from_secs(5),
            tls_verify: true,
            max_line_len: slirc_wire::line::DEFAULT_MAX_LEN,
        }
    }
}

// ============================================================================
// Callbacks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Returned from [`ConnectionHandler::on_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadControl {
    /// Keep draining buffered lines.
    Continue,
    /// Give the event loop a turn before the next buffered line.
    Yield,
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected,
    Error(ConnectionError),
    Eof,
}

/// Read and status callbacks. Invoked from the connection's driver task,
/// never while internal locks are held.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// One complete line, terminator stripped.
    fn on_line(&self, conn: &Arc<Connection>, line: &str) -> ReadControl;

    fn on_event(&self, conn: &Arc<Connection>, event: &ConnectionEvent);
}

// ============================================================================
// Connection
// ============================================================================

pub struct Connection {
    id: ConnectionId,
    name: String,
    host: String,
    port: u16,
    flags: ConnectionFlags,
    identity: Identity,
    settings: ConnectionSettings,
    live_transports: Arc<AtomicUsize>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    reconnecting: bool,
    released: bool,
    attached: Option<Attachment>,
    transport: Option<Transport>,
}

/// Event loop and handler the connection was started on; reused on reconnect.
struct Attachment {
    runtime: Handle,
    handler: Arc<dyn ConnectionHandler>,
}

/// Parent-side handle on a driver task.
struct Transport {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct TransportGuard(Arc<AtomicUsize>);

impl TransportGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("flags", &self.flags)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Allocate a connection. No I/O happens until [`connect`](Self::connect).
    pub fn create(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        flags: ConnectionFlags,
        identity: Identity,
        settings: ConnectionSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            host: host.into(),
            port,
            flags,
            identity,
            settings,
            live_transports: Arc::new(AtomicUsize::new(0)),
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Server name this connection is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn flags(&self) -> ConnectionFlags {
        self.flags
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    #[cfg(test)]
    pub fn is_reconnecting(&self) -> bool {
        self.inner.lock().reconnecting
    }

    #[cfg(test)]
    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// Driver tasks currently alive for this connection.
    #[cfg(test)]
    pub fn live_transports(&self) -> usize {
        self.live_transports.load(Ordering::SeqCst)
    }

    /// Start connecting on `runtime`.
    ///
    /// Returns once the attempt is under way; the outcome arrives through
    /// `handler`. Fails synchronously only if the TLS context or server
    /// name is unusable, or the connection was released.
    pub fn connect(
        self: &Arc<Self>,
        runtime: &Handle,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock();
        if inner.released {
            return Err(ConnectionError::Closed);
        }
        inner.attached = Some(Attachment {
            runtime: runtime.clone(),
            handler,
        });
        self.start_transport(&mut inner, Duration::ZERO)
    }

    /// Replace the transport, keeping identity, endpoint, flags and context.
    ///
    /// The previous transport (if any) is torn down first. Runs on the same
    /// runtime and handler given to [`connect`](Self::connect).
    pub fn reconnect(self: &Arc<Self>) -> Result<(), ConnectionError> {
        self.reconnect_after(Duration::ZERO)
    }

    /// [`reconnect`](Self::reconnect), with the new transport waiting
    /// `delay` before it dials.
    pub fn reconnect_after(self: &Arc<Self>, delay: Duration) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock();
        if inner.released {
            return Err(ConnectionError::Closed);
        }
        inner.reconnecting = true;
        self.start_transport(&mut inner, delay)
    }

    /// Tear down the transport for good. Idempotent.
    ///
    /// Queued lines are flushed and TLS is shut down cleanly by the driver.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        if inner.released {
            return;
        }
        inner.released = true;
        inner.transport = None;
        inner.attached = None;
        inner.state = ConnectionState::Disconnected;
        inner.reconnecting = false;
        debug!(connection = self.id, "Connection released");
    }

    /// Queue one line, appending CRLF. Returns the bytes queued.
    pub fn write_line(&self, line: &str) -> Result<usize, ConnectionError> {
        let mut data = line.trim_end_matches(['\r', '\n']).to_owned();
        data.push_str("\r\n");
        let len = data.len();

        let inner = self.inner.lock();
        if inner.released {
            return Err(ConnectionError::Closed);
        }
        let transport = inner
            .transport
            .as_ref()
            .ok_or(ConnectionError::NotConnected)?;
        transport
            .outbound
            .send(data)
            .map_err(|_| ConnectionError::NotConnected)?;
        Ok(len)
    }

    /// `write_line` over preformatted arguments.
    pub fn write_formatted(&self, args: fmt::Arguments<'_>) -> Result<usize, ConnectionError> {
        self.write_line(&fmt::format(args))
    }

    fn start_transport(
        self: &Arc<Self>,
        inner: &mut Inner,
        delay: Duration,
    ) -> Result<(), ConnectionError> {
        if self.flags.tls {
            tls::client_config(self.settings.tls_verify)?;
            tls::server_name(&self.host)?;
        }
        let attached = inner
            .attached
            .as_ref()
            .ok_or(ConnectionError::NotConnected)?;

        let cancel = CancellationToken::new();
        let (outbound, rx) = mpsc::unbounded_channel();
        let guard = TransportGuard::new(&self.live_transports);
        let driver = drive(
            Arc::clone(self),
            Arc::clone(&attached.handler),
            rx,
            cancel.clone(),
            delay,
            guard,
        );
        let runtime = attached.runtime.clone();

        // Old transport goes first; its drop cancels the old driver.
        inner.transport = Some(Transport { outbound, cancel });
        inner.state = ConnectionState::Connecting;
        runtime.spawn(driver);
        Ok(())
    }

    fn mark_connected(&self, cancel: &CancellationToken) -> bool {
        let mut inner = self.inner.lock();
        if cancel.is_cancelled() {
            return false;
        }
        inner.state = ConnectionState::Connected;
        inner.reconnecting = false;
        true
    }

    /// Error and EOF handling for a transport that died on its own.
    fn transport_lost(
        self: &Arc<Self>,
        handler: &dyn ConnectionHandler,
        cancel: &CancellationToken,
        failure: Option<ConnectionError>,
    ) {
        if cancel.is_cancelled() {
            return;
        }

        // An error always continues into EOF handling.
        if let Some(err) = failure {
            handler.on_event(self, &ConnectionEvent::Error(err));
        }

        {
            let mut inner = self.inner.lock();
            if cancel.is_cancelled() {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.transport = None;
        }
        handler.on_event(self, &ConnectionEvent::Eof);

        if self.flags.auto_reconnect && self.awaiting_redial() {
            let delay = self.settings.reconnect_delay;
            info!(
                connection = self.id,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );
            if let Err(e) = self.reconnect_after(delay) {
                error!(connection = self.id, error = %e, "Reconnect failed");
            }
        }
    }

    /// No transport and not released: the EOF handler did not redial or
    /// release the connection itself.
    fn awaiting_redial(&self) -> bool {
        let inner = self.inner.lock();
        !inner.released && inner.transport.is_none()
    }
}

// ============================================================================
// Driver
// ============================================================================

enum SessionEnd {
    Cancelled,
    Eof,
    Failed(ConnectionError),
}

async fn drive(
    conn: Arc<Connection>,
    handler: Arc<dyn ConnectionHandler>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    delay: Duration,
    _guard: TransportGuard,
) {
    if !delay.is_zero() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!(
        connection = conn.id,
        host = %conn.host,
        port = conn.port,
        tls = conn.flags.tls,
        "Connecting to server"
    );
    let limit = conn.settings.read_timeout;
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        r = tokio::time::timeout(limit, open(&conn)) => {
            r.unwrap_or(Err(ConnectionError::Timeout(limit)))
        }
    };

    let failure = match opened {
        Ok(stream) => {
            if !conn.mark_connected(&cancel) {
                return;
            }
            debug!(connection = conn.id, tls = stream.is_tls(), "Transport up");
            handler.on_event(&conn, &ConnectionEvent::Connected);

            match run_session(&conn, handler.as_ref(), stream, &mut outbound, &cancel).await {
                SessionEnd::Cancelled => return,
                SessionEnd::Eof => None,
                SessionEnd::Failed(e) => Some(e),
            }
        }
        Err(e) => Some(e),
    };

    conn.transport_lost(handler.as_ref(), &cancel, failure);
}

async fn open(conn: &Connection) -> Result<IrcStream, ConnectionError> {
    let dns = |source| ConnectionError::Dns {
        host: conn.host.clone(),
        source,
    };
    let addrs: Vec<_> = lookup_host((conn.host.as_str(), conn.port))
        .await
        .map_err(dns)?
        .collect();
    if addrs.is_empty() {
        return Err(dns(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses found",
        )));
    }

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(tcp) => {
                if let Err(e) = tcp.set_nodelay(true) {
                    debug!(connection = conn.id, %addr, error = %e, "Could not disable Nagle");
                }
                if !conn.flags.tls {
                    return Ok(IrcStream::Plain(tcp));
                }
                let tls = tls::connect(tcp, &conn.host, conn.settings.tls_verify).await?;
                return Ok(IrcStream::Tls(Box::new(tls)));
            }
            Err(e) => {
                debug!(connection = conn.id, %addr, error = %e, "Address refused connection");
                last_err = Some(e);
            }
        }
    }
    Err(ConnectionError::Socket(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotConnected, "no address accepted")
    })))
}

async fn run_session(
    conn: &Arc<Connection>,
    handler: &dyn ConnectionHandler,
    stream: IrcStream,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let max_len = conn.settings.max_line_len;
    let read_timeout = conn.settings.read_timeout;
    let last_read = Mutex::new(Instant::now());

    let (read_half, write_half) = tokio::io::split(stream);
    let read_half = InspectReader::new(read_half, |bytes: &[u8]| {
        if !bytes.is_empty() {
            *last_read.lock() = Instant::now();
        }
    });
    let mut reader = FramedRead::new(read_half, LineCodec::with_max_len(max_len));
    let mut writer = FramedWrite::new(write_half, LineCodec::with_max_len(max_len));

    let watchdog = tokio::time::sleep(read_timeout);
    tokio::pin!(watchdog);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                while let Ok(line) = outbound.try_recv() {
                    if writer.feed(line).await.is_err() {
                        break;
                    }
                }
                let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, writer.close()).await;
                return SessionEnd::Cancelled;
            }

            line = reader.next() => match line {
                Some(Ok(Ok(line))) => {
                    if handler.on_line(conn, &line) == ReadControl::Yield {
                        tokio::task::yield_now().await;
                    }
                }
                Some(Ok(Err(e @ LineError::TooLong { .. }))) => {
                    return SessionEnd::Failed(ConnectionError::Line(e));
                }
                Some(Ok(Err(e))) => {
                    warn!(connection = conn.id, error = %e, code = e.error_code(), "Dropping undecodable line");
                }
                Some(Err(e)) => return SessionEnd::Failed(ConnectionError::Socket(e)),
                None => return SessionEnd::Eof,
            },

            Some(line) = outbound.recv() => {
                if let Err(e) = writer.send(line).await {
                    return SessionEnd::Failed(ConnectionError::Socket(e));
                }
            }

            () = &mut watchdog => {
                let deadline = *last_read.lock() + read_timeout;
                if deadline <= Instant::now() {
                    return SessionEnd::Failed(ConnectionError::Timeout(read_timeout));
                }
                watchdog.as_mut().reset(deadline);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl ConnectionHandler for Recorder {
        fn on_line(&self, _conn: &Arc<Connection>, line: &str) -> ReadControl {
            self.lines.lock().push(line.to_string());
            ReadControl::Continue
        }

        fn on_event(&self, _conn: &Arc<Connection>, event: &ConnectionEvent) {
            let label = match event {
                ConnectionEvent::Connected => "connected".to_string(),
                ConnectionEvent::Error(e) => format!("error:{}", e.error_code()),
                ConnectionEvent::Eof => "eof".to_string(),
            };
            self.events.lock().push(label);
        }
    }

    fn settings(read_timeout_ms: u64) -> ConnectionSettings {
        ConnectionSettings {
            read_timeout: Duration::from_millis(read_timeout_ms),
            reconnect_delay: Duration::from_millis(10),
            tls_verify: false,
            ..ConnectionSettings::default()
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    fn plain(auto_reconnect: bool) -> ConnectionFlags {
        ConnectionFlags {
            tls: false,
            auto_reconnect,
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = Connection::create("a", "h", 1, plain(false), Identity::default(), settings(1000));
        let b = Connection::create("b", "h", 1, plain(false), Identity::default(), settings(1000));
        assert!(b.id() > a.id());
        assert_eq!(a.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_registration_lines() {
        let id = Identity {
            nick: "bot".into(),
            username: "botuser".into(),
            realname: "A Bot".into(),
            password: Some("secret".into()),
            channels: vec![],
        };
        assert_eq!(
            id.registration(),
            ["PASS secret", "USER botuser botuser * :A Bot", "NICK bot"]
        );
    }

    #[tokio::test]
    async fn test_read_and_write_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());

        let conn = Connection::create("t", "127.0.0.1", port, plain(false), Identity::default(), settings(5000));
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        write.write_all(b"PING :abc\r\n:srv 001 bot :hi\r\n").await.unwrap();

        wait_until(|| recorder.lines.lock().len() == 2).await;
        assert_eq!(*recorder.lines.lock(), ["PING :abc", ":srv 001 bot :hi"]);
        assert_eq!(conn.state(), ConnectionState::Connected);

        assert_eq!(conn.write_line("PONG :abc").unwrap(), 11);
        conn.write_formatted(format_args!("PRIVMSG {} :{}", "#c", "x")).unwrap();
        let mut lines = BufReader::new(read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG :abc");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PRIVMSG #c :x");

        conn.release();
        assert!(matches!(conn.write_line("x"), Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_eof_triggers_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());

        let conn = Connection::create("t", "127.0.0.1", port, plain(true), Identity::default(), settings(5000));
        let first_id = conn.id();
        conn.connect(&Handle::current(), recorder.clone()).unwrap();

        let (socket, _) = listener.accept().await.unwrap();
        wait_until(|| recorder.events() == ["connected"]).await;
        drop(socket);

        let (_socket, _) = listener.accept().await.unwrap();
        wait_until(|| recorder.events().len() == 3).await;
        assert_eq!(recorder.events(), ["connected", "eof", "connected"]);
        assert_eq!(conn.id(), first_id);
        assert!(!conn.is_reconnecting());
        conn.release();
    }

    #[tokio::test]
    async fn test_read_timeout_falls_through_to_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());

        let conn = Connection::create("t", "127.0.0.1", port, plain(false), Identity::default(), settings(100));
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        let (_socket, _) = listener.accept().await.unwrap();

        wait_until(|| recorder.events().len() == 3).await;
        assert_eq!(recorder.events(), ["connected", "error:timeout", "eof"]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(matches!(conn.write_line("x"), Err(ConnectionError::NotConnected)));
        wait_until(|| conn.live_transports() == 0).await;
    }

    #[tokio::test]
    async fn test_repeated_reconnect_leaves_one_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());

        let conn = Connection::create("t", "127.0.0.1", port, plain(false), Identity::default(), settings(5000));
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        for _ in 0..10 {
            conn.reconnect().unwrap();
        }
        assert!(conn.is_reconnecting());

        let accept = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        wait_until(|| conn.live_transports() == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(conn.live_transports(), 1);
        assert!(matches!(
            conn.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ));

        conn.release();
        wait_until(|| conn.live_transports() == 0).await;
        accept.abort();
    }

    #[tokio::test]
    async fn test_dns_failure_is_reported() {
        let recorder = Arc::new(Recorder::default());
        let conn = Connection::create(
            "t",
            "relay-test.invalid",
            6667,
            plain(false),
            Identity::default(),
            settings(5000),
        );
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        wait_until(|| recorder.events().len() == 2).await;
        assert_eq!(recorder.events(), ["error:dns", "eof"]);
    }

    #[tokio::test]
    async fn test_synchronous_failures() {
        let recorder = Arc::new(Recorder::default());
        let tls = ConnectionFlags {
            tls: true,
            auto_reconnect: false,
        };
        let conn = Connection::create("t", "not a host", 6697, tls, Identity::default(), settings(1000));
        assert!(matches!(
            conn.connect(&Handle::current(), recorder.clone()),
            Err(ConnectionError::InvalidServerName(_))
        ));

        let conn = Connection::create("t", "127.0.0.1", 1, plain(false), Identity::default(), settings(1000));
        assert!(matches!(conn.reconnect(), Err(ConnectionError::NotConnected)));
        assert!(matches!(conn.write_line("x"), Err(ConnectionError::NotConnected)));
        conn.release();
        conn.release();
        assert!(matches!(
            conn.connect(&Handle::current(), recorder),
            Err(ConnectionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_undecodable_line_dropped_connection_kept() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());

        let conn = Connection::create("t", "127.0.0.1", port, plain(true), Identity::default(), settings(5000));
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b":a!b@c PRIVMSG #c :caf\xe9\r\nPING :after\r\n")
            .await
            .unwrap();

        wait_until(|| recorder.lines.lock().len() == 1).await;
        assert_eq!(*recorder.lines.lock(), ["PING :after"]);
        assert_eq!(recorder.events(), ["connected"]);
        assert_eq!(conn.state(), ConnectionState::Connected);
        conn.release();
    }

    #[tokio::test]
    async fn test_over_long_line_ends_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());
        let short = ConnectionSettings {
            max_line_len: 16,
            ..settings(5000)
        };

        let conn = Connection::create("t", "127.0.0.1", port, plain(false), Identity::default(), short);
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b":srv NOTICE * :this line is far too long\r\n")
            .await
            .unwrap();

        wait_until(|| recorder.events().len() == 3).await;
        assert_eq!(recorder.events(), ["connected", "error:line", "eof"]);
        assert!(recorder.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_partial_line_bytes_feed_watchdog() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());

        let conn = Connection::create("t", "127.0.0.1", port, plain(false), Identity::default(), settings(300));
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();

        // Trickle one line over roughly three timeout windows.
        socket.write_all(b"PING :").await.unwrap();
        for _ in 0..9 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            socket.write_all(b"x").await.unwrap();
        }
        socket.write_all(b"\r\n").await.unwrap();

        wait_until(|| recorder.lines.lock().len() == 1).await;
        assert_eq!(*recorder.lines.lock(), ["PING :xxxxxxxxx"]);
        assert_eq!(recorder.events(), ["connected"]);

        wait_until(|| recorder.events().len() == 3).await;
        assert_eq!(recorder.events(), ["connected", "error:timeout", "eof"]);
    }

    #[tokio::test]
    async fn test_eof_redials_through_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorder = Arc::new(Recorder::default());
        let slow = ConnectionSettings {
            reconnect_delay: Duration::from_millis(300),
            ..settings(5000)
        };

        let conn = Connection::create("t", "127.0.0.1", port, plain(true), Identity::default(), slow);
        conn.connect(&Handle::current(), recorder.clone()).unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        wait_until(|| recorder.events() == ["connected"]).await;
        drop(socket);

        wait_until(|| recorder.events() == ["connected", "eof"]).await;
        assert!(conn.is_reconnecting());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        wait_until(|| conn.live_transports() == 1).await;

        let (_socket, _) = listener.accept().await.unwrap();
        wait_until(|| recorder.events().len() == 3).await;
        assert!(!conn.is_reconnecting());
        conn.release();
    }
}
