//! The supervisor process context.
//!
//! [`Relay`] owns the configuration, the server registry and the worker
//! supervisor. Server lines flow through [`RelayHandler`] into the worker
//! pool; worker frames come back through [`Relay::route`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use nix::sys::signal::Signal;
use slirc_wire::{Address, ConnectRequest, InboundFrame, ManagementCommand};
use tokio::runtime::Handle;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

use crate::config::{Config, ServerConfig, ServerSource, validate};
use crate::dispatch::{EventDispatcher, Outcome};
use crate::error::{ConnectionError, DispatchError, RelayError};
use crate::network::{
    Connection, ConnectionEvent, ConnectionFlags, ConnectionHandler, Identity, ReadControl,
    ServerRegistry,
};
use crate::worker::{PipeChannel, Spawner, Supervisor, WorkerPool};

// ============================================================================
// Connection callbacks
// ============================================================================

/// Shared by every server connection of the supervisor.
pub struct RelayHandler {
    dispatcher: EventDispatcher<Arc<WorkerPool<PipeChannel>>>,
}

impl RelayHandler {
    pub fn new(pool: Arc<WorkerPool<PipeChannel>>) -> Self {
        Self {
            dispatcher: EventDispatcher::new(pool),
        }
    }
}

impl ConnectionHandler for RelayHandler {
    fn on_line(&self, conn: &Arc<Connection>, line: &str) -> ReadControl {
        match self.dispatcher.dispatch(line, conn.as_ref()) {
            // Give the workers a chance to drain before the next line.
            Outcome::Undelivered => ReadControl::Yield,
            _ => ReadControl::Continue,
        }
    }

    fn on_event(&self, conn: &Arc<Connection>, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                info!(
                    connection = conn.id(),
                    server = %conn.name(),
                    host = %conn.host(),
                    port = conn.port(),
                    tls = conn.flags().tls,
                    "Connected, registering"
                );
                for line in conn.identity().registration() {
                    if let Err(e) = conn.write_line(&line) {
                        warn!(connection = conn.id(), error = %e, "Registration write failed");
                        break;
                    }
                }
            }
            ConnectionEvent::Error(e) if e.is_dns() => {
                error!(
                    connection = conn.id(),
                    server = %conn.name(),
                    error = %e,
                    "DNS resolution failed"
                );
            }
            ConnectionEvent::Error(e) => {
                warn!(
                    connection = conn.id(),
                    server = %conn.name(),
                    error = %e,
                    error_code = e.error_code(),
                    "Connection error"
                );
            }
            ConnectionEvent::Eof => {
                info!(
                    connection = conn.id(),
                    server = %conn.name(),
                    reconnect = conn.flags().auto_reconnect,
                    "Disconnected"
                );
            }
        }
    }
}

// ============================================================================
// Relay context
// ============================================================================

pub struct Relay<S> {
    config_path: PathBuf,
    config: Config,
    registry: Arc<ServerRegistry>,
    supervisor: Supervisor<S>,
    handler: Arc<RelayHandler>,
    runtime: Handle,
}

impl<S: Spawner> Relay<S> {
    /// Build the context. Must be called inside the runtime that will drive it.
    pub fn new(config: Config, config_path: impl Into<PathBuf>, spawner: S) -> Self {
        let supervisor = Supervisor::new(
            spawner,
            config.workers.count,
            config.workers.channel_capacity,
        );
        let handler = Arc::new(RelayHandler::new(supervisor.pool()));
        Self {
            config_path: config_path.into(),
            config,
            registry: Arc::new(ServerRegistry::new()),
            supervisor,
            handler,
            runtime: Handle::current(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> Arc<ServerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Start the worker pool, then connect every configured server.
    ///
    /// [`run_until`](Self::run_until) calls this once its SIGHUP handler is in place.
    pub fn start(&mut self) -> Result<(), RelayError> {
        self.supervisor.start()?;

        let mut failure = None;
        self.config.each_server(&mut |server| {
            if failure.is_some() {
                return;
            }
            if let Err(source) = self.connect_server(server) {
                failure = Some(RelayError::Server {
                    name: server.name.clone(),
                    source,
                });
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        if self.registry.is_empty() {
            warn!("No servers configured, waiting for a worker to CONNECT");
        }
        Ok(())
    }

    /// Open a connection for a configured server.
    pub fn connect_server(&self, server: &ServerConfig) -> Result<Arc<Connection>, ConnectionError> {
        let identity = self.config.identity_for(server);
        self.open(&server.name, &server.host, server.port, server.flags(), identity)
    }

    /// Open a connection asked for by a worker's `CONNECT`.
    ///
    /// The host doubles as the server name; the realname comes from
    /// `[identity]`.
    pub fn connect_request(&self, request: &ConnectRequest) -> Result<Arc<Connection>, ConnectionError> {
        let identity = Identity {
            nick: request.nick.clone(),
            username: request.username.clone(),
            realname: self.config.identity.realname.clone(),
            password: None,
            channels: Vec::new(),
        };
        let flags = ConnectionFlags {
            tls: request.tls,
            auto_reconnect: true,
        };
        self.open(&request.host, &request.host, request.port, flags, identity)
    }

    fn open(
        &self,
        name: &str,
        host: &str,
        port: u16,
        flags: ConnectionFlags,
        identity: Identity,
    ) -> Result<Arc<Connection>, ConnectionError> {
        let conn = Connection::create(
            name,
            host,
            port,
            flags,
            identity,
            self.config.connection_settings(),
        );
        if !self.registry.insert(Arc::clone(&conn)) {
            warn!(connection = conn.id(), server = %name, "Server name already in use, addressable by id only");
        }
        let handler: Arc<dyn ConnectionHandler> = self.handler.clone();
        if let Err(e) = conn.connect(&self.runtime, handler) {
            self.registry.remove(conn.id());
            return Err(e);
        }
        info!(
            connection = conn.id(),
            server = %name,
            host = %host,
            port,
            tls = flags.tls,
            "Connecting"
        );
        Ok(conn)
    }

    /// Act on one frame written by worker `pid`.
    pub fn route(&self, pid: u32, frame: &str) {
        let inbound: InboundFrame = match frame.parse() {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(pid, error = %e, frame, "Dropping malformed worker frame");
                return;
            }
        };

        match inbound {
            InboundFrame::Management(ManagementCommand::Connect(request)) => {
                if let Err(e) = self.connect_request(&request) {
                    warn!(
                        pid,
                        host = %request.host,
                        port = request.port,
                        error = %e,
                        "CONNECT failed"
                    );
                }
            }
            InboundFrame::Management(ManagementCommand::Reload) => {
                let signalled = self.supervisor.broadcast(Signal::SIGHUP);
                info!(pid, workers = signalled, "Reload requested by worker");
            }
            InboundFrame::Routed { address, line } => {
                if let Err(e) = self.forward(&address, &line) {
                    match e {
                        DispatchError::UnknownConnection(_) => {
                            debug!(pid, error = %e, "Routed line dropped")
                        }
                        _ => warn!(pid, error = %e, error_code = e.error_code(), "Routed line dropped"),
                    }
                }
            }
        }
    }

    /// Write a worker's line to the connection it addresses.
    fn forward(&self, address: &Address, line: &str) -> Result<(), DispatchError> {
        let conn = self
            .registry
            .resolve(address)
            .ok_or_else(|| DispatchError::UnknownConnection(address.to_string()))?;
        conn.write_line(line)?;
        Ok(())
    }

    /// SIGHUP: reload every worker, re-read the configuration and connect
    /// servers that were added to it. Existing connections are left alone.
    pub fn rehash(&mut self) {
        let signalled = self.supervisor.broadcast(Signal::SIGHUP);
        info!(workers = signalled, "Workers signalled to reload");

        let config = match Config::load(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %self.config_path.display(), error = %e, "Rehash failed, keeping current configuration");
                return;
            }
        };
        if let Err(errors) = validate(&config) {
            for e in &errors {
                error!(error = %e, "Invalid configuration");
            }
            return;
        }

        self.config = config;
        let mut added = 0;
        self.config.each_server(&mut |server| {
            if self.registry.contains_name(&server.name) {
                return;
            }
            match self.connect_server(server) {
                Ok(_) => added += 1,
                Err(e) => warn!(server = %server.name, error = %e, "Could not connect new server"),
            }
        });
        info!(added, "Configuration reloaded");
    }

    /// Drive the relay until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), RelayError> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let stop = async move {
            tokio::select! {
                _ = interrupt.recv() => info!("SIGINT received"),
                _ = terminate.recv() => info!("SIGTERM received"),
            }
        };
        self.run_until(stop).await
    }

    /// Start, then drive the relay until `stop` completes and shut down.
    pub async fn run_until(mut self, stop: impl Future<Output = ()>) -> Result<(), RelayError> {
        let mut hangup = signal(SignalKind::hangup())?;
        if let Err(e) = self.start() {
            if let Err(shutdown) = self.shutdown().await {
                warn!(error = %shutdown, "Shutdown after failed start-up was unclean");
            }
            return Err(e);
        }
        tokio::pin!(stop);

        loop {
            tokio::select! {
                () = &mut stop => break,
                Some(()) = hangup.recv() => {
                    info!("SIGHUP received");
                    self.rehash();
                }
                Some((pid, frame)) = self.supervisor.next_frame() => self.route(pid, &frame),
            }
        }

        self.shutdown().await
    }

    /// Release every connection, then stop the workers.
    pub async fn shutdown(self) -> Result<(), RelayError> {
        info!(connections = self.registry.len(), "Shutting down");
        self.registry.release_all();
        let grace = self.config.workers.shutdown_grace();
        self.supervisor.shutdown(grace).await?;
        Ok(())
    }
}
